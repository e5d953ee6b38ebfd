use std::fmt::Write;

use crate::block_io::BlockIo;
use crate::config::*;
use crate::directory::{dir_add_entry, dir_attach, dir_blocks, dir_lookup, dir_rm_entry, validate_name};
use crate::error::{FsError, Result};
use crate::file::{fread, ftruncate, fwrite};
use crate::inode::{alloc_inode, free_inode, read_inode, sync_inode, unmap_inode};
use crate::path::{extract_leaf_name, resolve, split};
use crate::superblock::{read_bitmaps, read_superblock, write_bitmaps, write_superblock};
use crate::tree::{Dentry, NodeId, Tree};
use crate::{BlockDevice, FileType, SuperBlock};

/// How the superblock came to be at mount time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// No valid superblock was found; a fresh layout was built.
    Built,
    /// An existing filesystem was read.
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    pub ino: u32,
    pub ftype: FileType,
    pub size: u64,
    pub links: u32,
    pub blocks: u64,
    pub block_size: u32,
}

/// One entry handed out by [`FileSystem::read_dir`].
#[derive(Debug, Clone, Copy)]
pub struct DirEntry<'a> {
    pub name: &'a str,
    pub ftype: FileType,
    pub node: NodeId,
    /// See [`Tree::handle`].
    pub handle: u64,
    /// Index to resume listing after this entry.
    pub next: usize,
}

/// A mounted filesystem. Everything it owns is mutated in memory and only
/// written back by [`FileSystem::sync`] or [`FileSystem::unmount`].
pub struct FileSystem<D: BlockDevice> {
    io: BlockIo<D>,
    superblock: SuperBlock,
    tree: Tree,
    kind: MountKind,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Mounts `device`, building a new filesystem on it if block 0 holds no valid superblock.
    pub fn mount(device: D) -> Result<Self> {
        let mut io = BlockIo::new(device);
        let (io_size, disk_size) = io.geometry();
        let mut root = Dentry::new("/", FileType::Directory);

        match read_superblock(&mut io)? {
            Some(mut superblock) => {
                log::info!("loading existing filesystem");
                if superblock.mounted {
                    log::warn!("filesystem was not cleanly unmounted");
                }
                read_bitmaps(&mut io, &mut superblock)?;
                root.ino = superblock.root_inode;
                let mut tree = Tree::new(root);
                read_inode(&mut io, &superblock, &mut tree, NodeId::ROOT)?;
                if !tree[NodeId::ROOT].inode.as_ref().is_some_and(|inode| inode.is_dir()) {
                    return Err(FsError::Corruption {
                        block: superblock.inode_position(superblock.root_inode).0,
                        detail: "root inode is not a directory".to_string(),
                    });
                }
                superblock.mounted = true;
                write_superblock(&mut io, &superblock)?;
                io.flush()?;
                log::debug!("root_ino {}", superblock.root_inode);
                Ok(Self {
                    io,
                    superblock,
                    tree,
                    kind: MountKind::Loaded,
                })
            }
            None => {
                log::info!("building filesystem: io size {}, disk size {}", io_size, disk_size);
                let mut superblock = SuperBlock::build(io_size, disk_size)?;
                let mut tree = Tree::new(root);
                alloc_inode(&mut superblock, &mut tree, NodeId::ROOT)?;
                superblock.root_inode = tree[NodeId::ROOT].ino;
                superblock.mounted = true;
                sync_inode(&mut io, &mut superblock, &mut tree, NodeId::ROOT)?;
                write_bitmaps(&mut io, &superblock)?;
                write_superblock(&mut io, &superblock)?;
                io.flush()?;
                log::debug!(
                    "imap_blks {}, dmap_blks {}, ino_blks {}, root_ino {}",
                    superblock.inode_bitmap_blocks,
                    superblock.data_bitmap_blocks,
                    superblock.inode_table_blocks,
                    superblock.root_inode
                );
                Ok(Self {
                    io,
                    superblock,
                    tree,
                    kind: MountKind::Built,
                })
            }
        }
    }

    /// Writes the whole tree, both bitmaps and the superblock back, and closes the device.
    pub fn unmount(mut self) -> Result<D> {
        sync_inode(&mut self.io, &mut self.superblock, &mut self.tree, NodeId::ROOT)?;
        unmap_inode(&mut self.tree, NodeId::ROOT);
        self.tree.clear();

        write_bitmaps(&mut self.io, &self.superblock)?;
        self.superblock.mounted = false;
        write_superblock(&mut self.io, &self.superblock)?;
        self.io.flush()?;
        log::info!("unmounted");
        Ok(self.io.into_inner())
    }

    /// Persists everything without unmounting.
    pub fn sync(&mut self) -> Result<()> {
        sync_inode(&mut self.io, &mut self.superblock, &mut self.tree, NodeId::ROOT)?;
        write_bitmaps(&mut self.io, &self.superblock)?;
        write_superblock(&mut self.io, &self.superblock)?;
        self.io.flush()
    }

    fn load(&mut self, node: NodeId) -> Result<()> {
        read_inode(&mut self.io, &self.superblock, &mut self.tree, node)
    }

    fn resolve_path(&mut self, path: &str, parent_mode: bool) -> Result<NodeId> {
        let Self {
            io,
            superblock,
            tree,
            ..
        } = self;
        resolve(tree, path, NodeId::ROOT, parent_mode, &mut |tree: &mut Tree, id| {
            read_inode(io, superblock, tree, id)
        })
    }

    /// Resolves `path` to a node with its inode loaded.
    pub fn lookup(&mut self, path: &str) -> Result<NodeId> {
        let node = self.resolve_path(path, false)?;
        self.load(node)?;
        Ok(node)
    }

    /// Resolves the directory that holds (or would hold) the last segment of `path`.
    fn lookup_parent<'p>(&mut self, path: &'p str) -> Result<(NodeId, &'p str)> {
        let parent = self.resolve_path(path, true)?;
        Ok((parent, extract_leaf_name(path)))
    }

    // Node-addressed operations.

    fn max_entries(&self) -> usize {
        MAX_DIRECT * self.superblock.dentries_per_block as usize
    }

    pub fn lookup_in(&mut self, dir: NodeId, name: &str) -> Result<NodeId> {
        self.load(dir)?;
        let child = dir_lookup(&self.tree, dir, name)?;
        self.load(child)?;
        Ok(child)
    }

    /// `blocks` is the number of direct slots the node occupies once synced.
    pub fn attr(&mut self, node: NodeId) -> Result<Attr> {
        self.load(node)?;
        let dentry = &self.tree[node];
        let inode = dentry.inode.as_ref().ok_or(FsError::NotFound)?;
        let block_size = self.superblock.block_size;
        Ok(Attr {
            ino: inode.ino,
            ftype: dentry.ftype,
            size: inode.size as u64,
            links: if node == NodeId::ROOT { 2 } else { inode.link },
            blocks: match dentry.ftype {
                FileType::Directory => {
                    dir_blocks(inode.size as usize / DENTRY_SIZE, self.superblock.dentries_per_block) as u64
                }
                FileType::Regular => (inode.size as u64).div_ceil(block_size as u64),
            },
            block_size,
        })
    }

    /// Creates `name` in directory `dir` with a freshly allocated inode.
    pub fn create_in(&mut self, dir: NodeId, name: &str, ftype: FileType) -> Result<NodeId> {
        self.load(dir)?;
        if !self.tree[dir].is_dir() {
            return Err(FsError::NotDirectory);
        }
        if name.is_empty() {
            return Err(FsError::AlreadyExists);
        }
        if self.tree.children(dir).len() >= self.max_entries() {
            return Err(FsError::OutOfSpace);
        }

        let child = dir_add_entry(&mut self.tree, dir, Dentry::new(name, ftype))?;
        if let Err(e) = alloc_inode(&mut self.superblock, &mut self.tree, child) {
            dir_rm_entry(&mut self.tree, dir, child)?;
            self.tree.remove(child);
            return Err(e);
        }
        log::debug!("create {} using inode {}", name, self.tree[child].ino);
        Ok(child)
    }

    pub fn read_dir_node<F>(&mut self, dir: NodeId, start: usize, mut emit: F) -> Result<()>
    where
        F: FnMut(DirEntry<'_>) -> bool,
    {
        self.load(dir)?;
        if !self.tree[dir].is_dir() {
            return Err(FsError::NotDirectory);
        }
        for (i, &child) in self.tree.children(dir).iter().enumerate().skip(start) {
            let dentry = &self.tree[child];
            let entry = DirEntry {
                name: &dentry.name,
                ftype: dentry.ftype,
                node: child,
                handle: self.tree.handle(child),
                next: i + 1,
            };
            if !emit(entry) {
                break;
            }
        }
        Ok(())
    }

    pub fn read_node(&mut self, node: NodeId, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.load(node)?;
        fread(&mut self.io, &mut self.tree, node, offset, len)
    }

    pub fn write_node(&mut self, node: NodeId, offset: usize, data: &[u8]) -> Result<usize> {
        self.load(node)?;
        fwrite(&mut self.io, &mut self.tree, node, offset, data)
    }

    pub fn truncate_node(&mut self, node: NodeId, size: usize) -> Result<()> {
        self.load(node)?;
        ftruncate(&mut self.io, &mut self.tree, node, size)
    }

    /// Removes `name` from `dir`, returning its inode and blocks to the bitmaps.
    /// `expect` selects unlink (regular) or rmdir (directory, must be empty) semantics.
    pub fn remove_in(&mut self, dir: NodeId, name: &str, expect: FileType) -> Result<()> {
        let child = self.lookup_in(dir, name)?;
        match (expect, self.tree[child].ftype) {
            (FileType::Regular, FileType::Directory) => return Err(FsError::IsDirectory),
            (FileType::Directory, FileType::Regular) => return Err(FsError::NotDirectory),
            _ => {}
        }
        if !self.tree.children(child).is_empty() {
            return Err(FsError::NotEmpty);
        }

        dir_rm_entry(&mut self.tree, dir, child)?;
        if let Some(inode) = self.tree[child].inode.as_ref() {
            free_inode(&mut self.superblock, inode)?;
        }
        unmap_inode(&mut self.tree, child);
        self.tree.remove(child);
        log::debug!("removed {} from inode {}", name, self.tree[dir].ino);
        Ok(())
    }

    /// Moves `name` in `dir` to `new_name` in `new_dir`. An existing target is refused.
    pub fn rename_in(&mut self, dir: NodeId, name: &str, new_dir: NodeId, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let child = self.lookup_in(dir, name)?;
        self.load(new_dir)?;
        if !self.tree[new_dir].is_dir() {
            return Err(FsError::NotDirectory);
        }
        if self.tree.is_descendant(new_dir, child) {
            return Err(FsError::InvalidArgument("cannot move a directory below itself"));
        }
        match dir_lookup(&self.tree, new_dir, new_name) {
            Ok(existing) if existing == child => return Ok(()),
            Ok(_) => return Err(FsError::AlreadyExists),
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e),
        }
        if new_dir != dir && self.tree.children(new_dir).len() >= self.max_entries() {
            return Err(FsError::OutOfSpace);
        }

        dir_rm_entry(&mut self.tree, dir, child)?;
        self.tree[child].name = new_name.to_string();
        dir_attach(&mut self.tree, new_dir, child)
    }

    // Path-addressed operations.

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.lookup_parent(path)?;
        self.create_in(parent, name, FileType::Directory).map(|_| ())
    }

    /// Creates an empty regular file.
    pub fn create(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.lookup_parent(path)?;
        self.create_in(parent, name, FileType::Regular).map(|_| ())
    }

    pub fn getattr(&mut self, path: &str) -> Result<Attr> {
        let node = self.lookup(path)?;
        self.attr(node)
    }

    /// Lists the entries of a directory starting at index `start`, newest first.
    /// Stops early when `emit` returns false.
    pub fn read_dir<F>(&mut self, path: &str, start: usize, emit: F) -> Result<()>
    where
        F: FnMut(DirEntry<'_>) -> bool,
    {
        let node = self.lookup(path)?;
        self.read_dir_node(node, start, emit)
    }

    pub fn write(&mut self, path: &str, data: &[u8], offset: usize) -> Result<usize> {
        let node = self.lookup(path)?;
        self.write_node(node, offset, data)
    }

    pub fn read(&mut self, path: &str, len: usize, offset: usize) -> Result<Vec<u8>> {
        let node = self.lookup(path)?;
        self.read_node(node, offset, len)
    }

    /// Timestamps are not kept; only checks that `path` exists.
    pub fn set_times(&mut self, path: &str) -> Result<()> {
        self.lookup(path).map(|_| ())
    }

    pub fn truncate(&mut self, path: &str, size: usize) -> Result<()> {
        let node = self.lookup(path)?;
        self.truncate_node(node, size)
    }

    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.lookup_parent(path)?;
        if name.is_empty() {
            return Err(FsError::IsDirectory);
        }
        self.remove_in(parent, name, FileType::Regular)
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.lookup_parent(path)?;
        if name.is_empty() {
            return Err(FsError::InvalidArgument("cannot remove the root directory"));
        }
        self.remove_in(parent, name, FileType::Directory)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let (from_parent, from_name) = split(from);
        let (to_parent, to_name) = split(to);
        if from_name.is_empty() || to_name.is_empty() {
            return Err(FsError::InvalidArgument("cannot rename the root directory"));
        }
        let dir = self.lookup(&from_parent)?;
        let new_dir = self.lookup(&to_parent)?;
        self.rename_in(dir, &from_name, new_dir, &to_name)
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn mount_kind(&self) -> MountKind {
        self.kind
    }

    pub fn block_size(&self) -> usize {
        self.io.block_size()
    }

    /// Layout summary followed by the loaded part of the tree.
    pub fn dump(&self) -> String {
        let sb = &self.superblock;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "blocks {} x {}B (io {}B x {}), imap @{}, dmap @{}, inodes @{}+{} ({} per block), data @{}+{}",
            sb.num_blocks,
            sb.block_size,
            sb.io_size,
            self.io.io_per_block(),
            sb.inode_bitmap_start,
            sb.data_bitmap_start,
            sb.inode_table_start,
            sb.inode_table_blocks,
            sb.inodes_per_block,
            sb.data_start,
            sb.data_blocks,
        );
        let _ = writeln!(
            out,
            "free inodes {}/{}, free blocks {}/{}",
            sb.free_inodes(),
            sb.inode_capacity(),
            sb.free_blocks(),
            sb.block_capacity(),
        );
        self.dump_node(&mut out, NodeId::ROOT, 0);
        out
    }

    fn dump_node(&self, out: &mut String, node: NodeId, depth: usize) {
        let dentry = &self.tree[node];
        let detail = match dentry.inode.as_ref() {
            Some(inode) => format!("size {} direct {:?}", inode.size, inode.direct),
            None => "not loaded".to_string(),
        };
        let _ = writeln!(
            out,
            "{:indent$}{} [ino {}, {:?}] {}",
            "",
            dentry.name,
            dentry.ino,
            dentry.ftype,
            detail,
            indent = depth * 2
        );
        for &child in self.tree.children(node) {
            self.dump_node(out, child, depth + 1);
        }
    }
}
