//! Child-list maintenance of loaded directory inodes.
//! A directory's size always tracks its entry count: `entries * DENTRY_SIZE`.

use crate::config::*;
use crate::error::{FsError, Result};
use crate::tree::{Dentry, NodeId, Tree};

pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= MAX_NAME_LEN || name.contains('/') || name.contains('\0') {
        return Err(FsError::InvalidFileName);
    }
    if name == DOT_NAME || name == DOTDOT_NAME {
        return Err(FsError::InvalidFileName);
    }
    Ok(())
}

/// Finds a child of a loaded directory by name.
pub fn dir_lookup(tree: &Tree, dir: NodeId, name: &str) -> Result<NodeId> {
    if !tree[dir].is_dir() {
        return Err(FsError::NotDirectory);
    }
    let inode = tree[dir].inode.as_ref().ok_or(FsError::NotFound)?;
    inode
        .children
        .iter()
        .copied()
        .find(|&child| tree[child].name == name)
        .ok_or(FsError::NotFound)
}

/// Attaches `dentry` as the first child of a loaded directory.
/// Fails with `AlreadyExists` if a sibling has the same name.
pub fn dir_add_entry(tree: &mut Tree, dir: NodeId, mut dentry: Dentry) -> Result<NodeId> {
    validate_name(&dentry.name)?;
    match dir_lookup(tree, dir, &dentry.name) {
        Ok(_) => return Err(FsError::AlreadyExists),
        Err(FsError::NotFound) => {}
        Err(e) => return Err(e),
    }
    if tree[dir].inode.is_none() {
        return Err(FsError::NotFound);
    }

    dentry.parent = None;
    let child = tree.insert(dentry);
    dir_attach(tree, dir, child)?;
    Ok(child)
}

/// Links an existing, detached node in as the first child of a loaded directory.
pub fn dir_attach(tree: &mut Tree, dir: NodeId, child: NodeId) -> Result<()> {
    let inode = tree[dir].inode.as_mut().ok_or(FsError::NotFound)?;
    inode.children.insert(0, child);
    inode.size += DENTRY_SIZE as u32;
    tree[child].parent = Some(dir);
    Ok(())
}

/// Detaches `child` from its parent's child list; the node itself stays in the arena.
pub fn dir_rm_entry(tree: &mut Tree, dir: NodeId, child: NodeId) -> Result<()> {
    let inode = tree[dir].inode.as_mut().ok_or(FsError::NotFound)?;
    let pos = inode
        .children
        .iter()
        .position(|&c| c == child)
        .ok_or(FsError::NotFound)?;
    inode.children.remove(pos);
    inode.size -= DENTRY_SIZE as u32;
    tree[child].parent = None;
    Ok(())
}

/// Number of directory blocks needed for `entries` entries.
pub fn dir_blocks(entries: usize, dentries_per_block: u32) -> usize {
    entries.div_ceil(dentries_per_block as usize)
}
