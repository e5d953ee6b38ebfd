mod common;

use common::{list, RamDisk};
use tau::{Error, FileSystem};

fn fresh() -> FileSystem<RamDisk> {
    FileSystem::mount(RamDisk::new(1 << 20)).unwrap()
}

#[test]
fn test_unlink_releases_resources() {
    let mut fs = fresh();
    let inodes = fs.superblock().free_inodes();
    let blocks = fs.superblock().free_blocks();

    fs.create("/f").unwrap();
    fs.write("/f", &vec![7u8; 3000], 0).unwrap();
    fs.sync().unwrap();
    assert_eq!(fs.superblock().free_inodes(), inodes - 1);
    assert_eq!(fs.superblock().free_blocks(), blocks - 4);

    fs.unlink("/f").unwrap();
    assert!(matches!(fs.getattr("/f"), Err(Error::NotFound)));
    fs.sync().unwrap();
    assert_eq!(fs.superblock().free_inodes(), inodes);
    assert_eq!(fs.superblock().free_blocks(), blocks);

    let mut fs = FileSystem::mount(fs.unmount().unwrap()).unwrap();
    assert!(list(&mut fs, "/").is_empty());
    assert_eq!(fs.superblock().free_inodes(), inodes);
    assert_eq!(fs.superblock().free_blocks(), blocks);
}

#[test]
fn test_unlink_reuses_inode() {
    let mut fs = fresh();
    fs.create("/a").unwrap();
    let ino = fs.getattr("/a").unwrap().ino;
    fs.unlink("/a").unwrap();
    fs.create("/b").unwrap();
    assert_eq!(fs.getattr("/b").unwrap().ino, ino);
}

#[test]
fn test_remove_kind_checks() {
    let mut fs = fresh();
    fs.mkdir("/d").unwrap();
    fs.create("/d/f").unwrap();
    assert!(matches!(fs.unlink("/d"), Err(Error::IsDirectory)));
    assert!(matches!(fs.rmdir("/d/f"), Err(Error::NotDirectory)));
    assert!(matches!(fs.rmdir("/d"), Err(Error::NotEmpty)));
    assert!(matches!(fs.rmdir("/"), Err(Error::InvalidArgument(_))));
    assert!(matches!(fs.unlink("/d/nope"), Err(Error::NotFound)));

    fs.unlink("/d/f").unwrap();
    fs.rmdir("/d").unwrap();
    assert!(list(&mut fs, "/").is_empty());
}

#[test]
fn test_rmdir_after_remount() {
    let mut fs = fresh();
    fs.mkdir("/d").unwrap();
    fs.create("/d/f").unwrap();
    let mut fs = FileSystem::mount(fs.unmount().unwrap()).unwrap();
    // "/d" is not loaded yet; the emptiness check must still see "/d/f".
    assert!(matches!(fs.rmdir("/d"), Err(Error::NotEmpty)));
}

#[test]
fn test_rename_within_dir() {
    let mut fs = fresh();
    fs.create("/a").unwrap();
    fs.write("/a", b"payload", 0).unwrap();
    fs.rename("/a", "/b").unwrap();
    assert!(matches!(fs.getattr("/a"), Err(Error::NotFound)));
    assert_eq!(fs.read("/b", 7, 0).unwrap(), b"payload");
    assert_eq!(list(&mut fs, "/"), vec!["b"]);
    fs.rename("/b", "/b").unwrap();
}

#[test]
fn test_rename_across_dirs() {
    let mut fs = fresh();
    fs.mkdir("/src").unwrap();
    fs.mkdir("/dst").unwrap();
    fs.create("/src/f").unwrap();
    fs.write("/src/f", b"moved", 0).unwrap();
    fs.rename("/src/f", "/dst/g").unwrap();
    assert!(list(&mut fs, "/src").is_empty());
    assert_eq!(list(&mut fs, "/dst"), vec!["g"]);
    assert_eq!(fs.getattr("/src").unwrap().size, 0);

    let mut fs = FileSystem::mount(fs.unmount().unwrap()).unwrap();
    assert_eq!(fs.read("/dst/g", 5, 0).unwrap(), b"moved");
    assert!(list(&mut fs, "/src").is_empty());
}

#[test]
fn test_rename_refusals() {
    let mut fs = fresh();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    fs.create("/f").unwrap();
    assert!(matches!(fs.rename("/a", "/a/b/a"), Err(Error::InvalidArgument(_))));
    assert!(matches!(fs.rename("/f", "/a/b"), Err(Error::AlreadyExists)));
    assert!(matches!(fs.rename("/nope", "/x"), Err(Error::NotFound)));
    assert!(matches!(fs.rename("/f", "/f/x"), Err(Error::NotDirectory)));
    assert!(matches!(fs.rename("/f", "/a/.."), Err(Error::InvalidFileName)));
    assert_eq!(list(&mut fs, "/"), vec!["f", "a"]);
}

#[test]
fn test_unlinked_handle_not_reused() {
    let mut fs = fresh();
    fs.create("/a").unwrap();
    let a = fs.lookup("/a").unwrap();
    let old = fs.tree().handle(a);
    fs.unlink("/a").unwrap();
    assert_eq!(fs.tree().resolve_handle(old), None);

    fs.create("/b").unwrap();
    let b = fs.lookup("/b").unwrap();
    assert_eq!(b, a);
    assert_ne!(fs.tree().handle(b), old);
    assert_eq!(fs.tree().resolve_handle(old), None);
    assert_eq!(fs.tree().resolve_handle(fs.tree().handle(b)), Some(b));
    assert_eq!(fs.tree().handle(tau::NodeId::ROOT), 1);
}
