//! Loading, write-back and release of in-memory inodes.
//!
//! Mutations never touch the device directly: an inode only reaches disk through
//! [`sync_inode`], which reallocates its direct blocks to match the current size,
//! serializes the content and finally writes the fixed-size inode record.

use crate::bitmap::*;
use crate::block_io::BlockIo;
use crate::config::*;
use crate::directory::dir_blocks;
use crate::error::{FsError, Result};
use crate::structs::{DiskDentry, DiskInode, FileType};
use crate::tree::{Dentry, Inode, NodeId, Page, Tree};
use crate::{BlockDevice, SuperBlock};

/// Allocates an inode number for `node` and binds a zeroed inode of the node's type to it.
pub fn alloc_inode(superblock: &mut SuperBlock, tree: &mut Tree, node: NodeId) -> Result<()> {
    let ino = alloc_inode_id(superblock)?;
    let dentry = &mut tree[node];
    dentry.ino = ino;
    dentry.inode = Some(Inode::new(ino, dentry.ftype));
    Ok(())
}

/// Loads the inode of `node` from the inode table if it is not loaded yet.
/// Directories get their child list decoded; file data is paged in on first access.
pub fn read_inode<D: BlockDevice>(
    io: &mut BlockIo<D>,
    superblock: &SuperBlock,
    tree: &mut Tree,
    node: NodeId,
) -> Result<()> {
    if tree[node].inode.is_some() {
        return Ok(());
    }
    let ino = tree[node].ino;
    if ino as usize >= superblock.inode_capacity() {
        return Err(FsError::OutOfBounds);
    }

    let (block_id, offset) = superblock.inode_position(ino);
    let mut buf = [0u8; INODE_SIZE];
    io.read_range(block_id, &mut buf, offset, offset + INODE_SIZE)?;
    let mut inode = Inode::from_disk(DiskInode::decode(&buf, block_id)?);
    inode.ino = ino;

    match inode.ftype {
        FileType::Directory => {
            let children = load_dentries(io, superblock, &inode, block_id)?;
            tree[node].inode = Some(inode);
            for mut dentry in children {
                dentry.parent = Some(node);
                let child = tree.insert(dentry);
                if let Some(dir) = tree[node].inode.as_mut() {
                    dir.children.push(child);
                }
            }
        }
        FileType::Regular => {
            let count = (inode.size as usize).div_ceil(superblock.block_size as usize);
            check_occupied(&inode, count, block_id)?;
            for page in inode.pages.iter_mut().take(count) {
                *page = Page::OnDisk;
            }
            tree[node].inode = Some(inode);
        }
    }
    log::trace!("loaded inode {} for {:?}", ino, tree[node].name);
    Ok(())
}

fn check_occupied(inode: &Inode, count: usize, block_id: u32) -> Result<()> {
    if count > MAX_DIRECT || inode.direct[..count].iter().any(|&ptr| ptr == 0) {
        return Err(FsError::Corruption {
            block: block_id,
            detail: format!(
                "inode {} of size {} lacks blocks for {} slots",
                inode.ino, inode.size, count
            ),
        });
    }
    Ok(())
}

/// Decodes the child entries of a directory inode in on-disk order.
fn load_dentries<D: BlockDevice>(
    io: &mut BlockIo<D>,
    superblock: &SuperBlock,
    inode: &Inode,
    inode_block: u32,
) -> Result<Vec<Dentry>> {
    let per_block = superblock.dentries_per_block as usize;
    let count = inode.size as usize / DENTRY_SIZE;
    let blocks = dir_blocks(count, superblock.dentries_per_block);
    check_occupied(inode, blocks, inode_block)?;

    let mut dentries = Vec::with_capacity(count);
    let mut buf = vec![0u8; io.block_size()];
    for i in 0..blocks {
        let block_id = inode.direct[i];
        io.read_block(block_id, &mut buf)?;
        for j in 0..per_block.min(count - i * per_block) {
            let d = DiskDentry::decode(&buf[j * DENTRY_SIZE..(j + 1) * DENTRY_SIZE], block_id)?;
            if d.ino == 0 {
                return Err(FsError::Corruption {
                    block: block_id,
                    detail: format!("entry {} of inode {} has no inode number", j, inode.ino),
                });
            }
            let mut dentry = Dentry::new(&d.name(), d.ftype);
            dentry.ino = d.ino;
            dentries.push(dentry);
        }
    }
    Ok(dentries)
}

/// Returns the bytes of slot `slot`, paging them in from disk if necessary.
/// `None` means the slot holds no data.
pub fn page_in<'a, D: BlockDevice>(
    io: &mut BlockIo<D>,
    inode: &'a mut Inode,
    slot: usize,
) -> Result<Option<&'a mut Page>> {
    if let Page::OnDisk = inode.pages[slot] {
        let mut buf = vec![0u8; io.block_size()].into_boxed_slice();
        io.read_block(inode.direct[slot], &mut buf)?;
        inode.pages[slot] = Page::Cached { buf, dirty: false };
    }
    if matches!(inode.pages[slot], Page::Absent) {
        return Ok(None);
    }
    Ok(Some(&mut inode.pages[slot]))
}

/// Writes `node` and every loaded node below it back to disk, children first.
pub fn sync_inode<D: BlockDevice>(
    io: &mut BlockIo<D>,
    superblock: &mut SuperBlock,
    tree: &mut Tree,
    node: NodeId,
) -> Result<()> {
    let children = tree.children(node).to_vec();
    for child in children.iter().copied() {
        if tree[child].inode.is_some() {
            sync_inode(io, superblock, tree, child)?;
        }
    }

    // Directory entries are serialized from the dentries, which are always resident.
    let entries = children
        .iter()
        .map(|&c| DiskDentry::new(tree[c].ino, &tree[c].name, tree[c].ftype))
        .collect::<Result<Vec<_>>>()?;

    let Some(inode) = tree[node].inode.as_mut() else {
        return Ok(());
    };
    let need = match inode.ftype {
        FileType::Directory => {
            inode.size = (entries.len() * DENTRY_SIZE) as u32;
            dir_blocks(entries.len(), superblock.dentries_per_block)
        }
        FileType::Regular => (inode.size as usize).div_ceil(superblock.block_size as usize),
    };
    if need > MAX_DIRECT {
        return Err(FsError::FileTooLarge);
    }

    for slot in 0..MAX_DIRECT {
        if slot < need && inode.direct[slot] == 0 {
            inode.direct[slot] = alloc_data_block(superblock)?;
        } else if slot >= need && inode.direct[slot] != 0 {
            free_data_block(superblock, inode.direct[slot])?;
            inode.direct[slot] = 0;
        }
    }

    match inode.ftype {
        FileType::Directory => {
            let per_block = superblock.dentries_per_block as usize;
            let mut buf = vec![0u8; io.block_size()];
            for (i, chunk) in entries.chunks(per_block).enumerate() {
                buf.fill(0);
                for (j, entry) in chunk.iter().enumerate() {
                    entry.encode_into(&mut buf[j * DENTRY_SIZE..(j + 1) * DENTRY_SIZE]);
                }
                io.write_block(inode.direct[i], &buf)?;
            }
        }
        FileType::Regular => {
            for slot in 0..need {
                if let Page::Cached { buf, dirty } = &mut inode.pages[slot] {
                    if *dirty {
                        io.write_block(inode.direct[slot], buf)?;
                        *dirty = false;
                    }
                }
            }
        }
    }

    let (block_id, offset) = superblock.inode_position(inode.ino);
    io.write_range(block_id, &inode.to_disk().encode(), offset, offset + INODE_SIZE)?;
    Ok(())
}

/// Releases the inode of `node` and every node below it from memory. No disk effect.
pub fn unmap_inode(tree: &mut Tree, node: NodeId) {
    let Some(inode) = tree[node].inode.take() else {
        return;
    };
    for child in inode.children {
        unmap_inode(tree, child);
        tree.remove(child);
    }
}

/// Returns the inode number and every data block of a loaded inode to the bitmaps.
pub fn free_inode(superblock: &mut SuperBlock, inode: &Inode) -> Result<()> {
    for &ptr in inode.direct.iter().filter(|&&ptr| ptr != 0) {
        free_data_block(superblock, ptr)?;
    }
    free_inode_id(superblock, inode.ino)
}
