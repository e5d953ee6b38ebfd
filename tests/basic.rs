mod common;

use common::{list, RamDisk, BLOCK_SIZE};
use tau::{Error, FileSystem, FileType, MountKind, DENTRY_SIZE};

const DISK_SIZE: usize = 4 << 20;

fn fresh() -> FileSystem<RamDisk> {
    FileSystem::mount(RamDisk::new(DISK_SIZE)).unwrap()
}

#[test]
fn test_fresh_layout() {
    let fs = fresh();
    assert_eq!(fs.mount_kind(), MountKind::Built);
    let sb = fs.superblock();
    log!("{}", fs.dump());

    let num_blocks = (DISK_SIZE / BLOCK_SIZE) as u32;
    let inodes_per_block = (BLOCK_SIZE / tau::INODE_SIZE) as u32;
    assert_eq!(sb.block_size as usize, BLOCK_SIZE);
    assert_eq!(sb.num_blocks, num_blocks);
    assert_eq!(sb.inode_bitmap_start, 1);
    assert_eq!(sb.data_bitmap_start, 2);
    assert_eq!(sb.inode_table_start, 3);
    assert_eq!(sb.inodes_per_block, inodes_per_block);
    assert_eq!(sb.data_start, 3 + num_blocks.div_ceil(inodes_per_block));
    assert_eq!(sb.free_inodes(), sb.inode_capacity() - 1);
    assert_eq!(sb.free_blocks(), sb.block_capacity());
}

#[test]
fn test_root_attr() {
    let mut fs = fresh();
    let attr = fs.getattr("/").unwrap();
    assert_eq!(attr.ftype, FileType::Directory);
    assert_eq!(attr.size, 0);
    assert_eq!(attr.links, 2);
    assert_eq!(attr.ino, fs.superblock().root_inode);
}

#[test]
fn test_mkdir_twice() {
    let mut fs = fresh();
    fs.mkdir("/a").unwrap();
    assert!(matches!(fs.mkdir("/a"), Err(Error::AlreadyExists)));
    assert!(matches!(fs.create("/a"), Err(Error::AlreadyExists)));
    assert!(matches!(fs.mkdir("/"), Err(Error::AlreadyExists)));
    assert_eq!(list(&mut fs, "/"), vec!["a"]);
}

#[test]
fn test_write_then_read() {
    let mut fs = fresh();
    fs.create("/f").unwrap();
    assert_eq!(fs.write("/f", b"hello", 0).unwrap(), 5);
    assert_eq!(fs.read("/f", 5, 0).unwrap(), b"hello");
    assert_eq!(fs.read("/f", 10, 0).unwrap(), b"hello");
    assert_eq!(fs.read("/f", 10, 3).unwrap(), b"lo");
    assert!(fs.read("/f", 10, 5).unwrap().is_empty());
    assert!(fs.read("/f", 10, 500).unwrap().is_empty());
    assert_eq!(fs.getattr("/f").unwrap().size, 5);
}

#[test]
fn test_write_with_hole() {
    let mut fs = fresh();
    fs.create("/f").unwrap();
    fs.write("/f", b"xyz", BLOCK_SIZE + 10).unwrap();
    let data = fs.read("/f", 2 * BLOCK_SIZE, 0).unwrap();
    assert_eq!(data.len(), BLOCK_SIZE + 13);
    assert!(data[..BLOCK_SIZE + 10].iter().all(|&b| b == 0));
    assert_eq!(&data[BLOCK_SIZE + 10..], b"xyz");
}

#[test]
fn test_multi_block_write() {
    let mut fs = fresh();
    let data: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
    fs.create("/big").unwrap();
    fs.write("/big", &data, 0).unwrap();
    fs.sync().unwrap();

    let node = fs.lookup("/big").unwrap();
    let inode = fs.tree()[node].inode.as_ref().unwrap();
    let occupied = inode.direct.iter().filter(|&&ptr| ptr != 0).count();
    assert_eq!(occupied, data.len().div_ceil(BLOCK_SIZE));
    assert_eq!(fs.getattr("/big").unwrap().blocks, 3);
    // Three file blocks and one block of root entries.
    let sb = fs.superblock();
    assert_eq!(sb.free_blocks(), sb.block_capacity() - 4);

    assert_eq!(fs.read("/big", 100, 1000).unwrap(), &data[1000..1100]);

    let disk = fs.unmount().unwrap();
    let mut fs = FileSystem::mount(disk).unwrap();
    assert_eq!(fs.mount_kind(), MountKind::Loaded);
    assert_eq!(fs.read("/big", data.len(), 0).unwrap(), data);
}

#[test]
fn test_list_newest_first() {
    let mut fs = fresh();
    fs.create("/a").unwrap();
    fs.create("/b").unwrap();
    assert_eq!(list(&mut fs, "/"), vec!["b", "a"]);

    let mut first = Vec::new();
    fs.read_dir("/", 0, |entry| {
        first.push((entry.name.to_string(), entry.ftype, entry.next));
        false
    })
    .unwrap();
    assert_eq!(first, vec![("b".to_string(), FileType::Regular, 1)]);

    let mut rest = Vec::new();
    fs.read_dir("/", 1, |entry| {
        rest.push(entry.name.to_string());
        true
    })
    .unwrap();
    assert_eq!(rest, vec!["a"]);
}

#[test]
fn test_getattr_is_idempotent() {
    let mut fs = fresh();
    fs.mkdir("/d").unwrap();
    fs.create("/d/f").unwrap();
    fs.write("/d/f", b"0123456789", 0).unwrap();

    let first = fs.getattr("/d/f").unwrap();
    let second = fs.getattr("/d/f").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.size, 10);
    assert_eq!(first.links, 1);
    assert_eq!(first.ftype, FileType::Regular);
    assert_eq!(fs.getattr("/d").unwrap().size, DENTRY_SIZE as u64);
}

#[test]
fn test_dir_size_tracks_entries() {
    let mut fs = fresh();
    for name in ["/x", "/y", "/z"] {
        fs.create(name).unwrap();
    }
    assert_eq!(fs.getattr("/").unwrap().size, 3 * DENTRY_SIZE as u64);
    fs.sync().unwrap();
    assert_eq!(fs.getattr("/").unwrap().size, 3 * DENTRY_SIZE as u64);
    fs.unlink("/y").unwrap();
    assert_eq!(fs.getattr("/").unwrap().size, 2 * DENTRY_SIZE as u64);

    let mut fs = FileSystem::mount(fs.unmount().unwrap()).unwrap();
    assert_eq!(fs.getattr("/").unwrap().size, 2 * DENTRY_SIZE as u64);
    assert_eq!(list(&mut fs, "/"), vec!["z", "x"]);
}

#[test]
fn test_nested_paths() {
    let mut fs = fresh();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    fs.create("/a/b/c").unwrap();
    fs.write("/a/b/c", b"deep", 0).unwrap();
    assert_eq!(fs.read("/a/b/../b/./c", 4, 0).unwrap(), b"deep");
    assert_eq!(fs.read("a/b/c", 4, 0).unwrap(), b"deep");
    assert_eq!(list(&mut fs, "/a"), vec!["b"]);
    assert_eq!(list(&mut fs, "/a/b/"), vec!["c"]);
}

#[test]
fn test_path_errors() {
    let mut fs = fresh();
    fs.create("/f").unwrap();
    assert!(matches!(fs.getattr("/nope"), Err(Error::NotFound)));
    assert!(matches!(fs.create("/nope/x"), Err(Error::NotFound)));
    assert!(matches!(fs.create("/f/x"), Err(Error::NotDirectory)));
    assert!(matches!(fs.read("/", 1, 0), Err(Error::IsDirectory)));
    assert!(matches!(fs.write("/", b"x", 0), Err(Error::IsDirectory)));
    assert!(matches!(fs.read_dir("/f", 0, |_| true), Err(Error::NotDirectory)));
    assert!(matches!(fs.create(&format!("/{}", "n".repeat(128))), Err(Error::InvalidFileName)));
    fs.create(&format!("/{}", "n".repeat(127))).unwrap();
}

#[test]
fn test_truncate() {
    let mut fs = fresh();
    let data = vec![0xabu8; 3000];
    fs.create("/t").unwrap();
    fs.write("/t", &data, 0).unwrap();
    fs.sync().unwrap();

    fs.truncate("/t", 100).unwrap();
    assert_eq!(fs.read("/t", 3000, 0).unwrap(), &data[..100]);
    fs.truncate("/t", 2048).unwrap();
    let grown = fs.read("/t", 3000, 0).unwrap();
    assert_eq!(grown.len(), 2048);
    assert_eq!(&grown[..100], &data[..100]);
    assert!(grown[100..].iter().all(|&b| b == 0));

    fs.sync().unwrap();
    let sb = fs.superblock();
    assert_eq!(sb.free_blocks(), sb.block_capacity() - 3);
    assert!(matches!(fs.truncate("/t", 6 * BLOCK_SIZE + 1), Err(Error::FileTooLarge)));
    fs.set_times("/t").unwrap();
}

#[test]
fn test_file_too_large() {
    let mut fs = fresh();
    fs.create("/f").unwrap();
    fs.write("/f", &vec![1u8; 6 * BLOCK_SIZE], 0).unwrap();
    assert!(matches!(fs.write("/f", b"x", 6 * BLOCK_SIZE), Err(Error::FileTooLarge)));
    assert_eq!(fs.getattr("/f").unwrap().size, 6 * BLOCK_SIZE as u64);
}

#[test]
fn test_dir_blocks_count_slots() {
    let mut fs = fresh();
    for i in 0..15 {
        fs.create(&format!("/e{}", i)).unwrap();
    }
    // 15 entries at 7 per block, although 15 * 136 bytes fit in 2 blocks.
    assert_eq!(fs.getattr("/").unwrap().blocks, 3);
    fs.sync().unwrap();
    let root = fs.tree()[tau::NodeId::ROOT].inode.as_ref().unwrap();
    assert_eq!(root.direct.iter().filter(|&&ptr| ptr != 0).count(), 3);
}

#[test]
fn test_read_huge_length() {
    let mut fs = fresh();
    fs.create("/f").unwrap();
    fs.write("/f", b"hello", 0).unwrap();
    assert_eq!(fs.read("/f", usize::MAX, 1).unwrap(), b"ello");
    assert!(fs.read("/f", usize::MAX, usize::MAX).unwrap().is_empty());
    assert!(matches!(fs.write("/f", b"xy", usize::MAX), Err(Error::FileTooLarge)));
    assert_eq!(fs.getattr("/f").unwrap().size, 5);
}
