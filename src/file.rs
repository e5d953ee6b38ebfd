//! Byte-range access to regular files through their direct slots.
//! Slot `i` covers bytes `[i * block_size, (i + 1) * block_size)` of the file.

use crate::block_io::BlockIo;
use crate::config::MAX_DIRECT;
use crate::error::{FsError, Result};
use crate::inode::page_in;
use crate::tree::{Inode, NodeId, Page, Tree};
use crate::BlockDevice;

fn file_inode(tree: &mut Tree, node: NodeId) -> Result<&mut Inode> {
    let dentry = &mut tree[node];
    if dentry.is_dir() {
        return Err(FsError::IsDirectory);
    }
    dentry.inode.as_mut().ok_or(FsError::NotFound)
}

/// Intersection of `[begin, end)` with each slot, as (slot, start in slot, len).
fn spans(block_size: usize, begin: usize, end: usize) -> impl Iterator<Item = (usize, usize, usize)> {
    (0..MAX_DIRECT).filter_map(move |slot| {
        let p1 = slot * block_size;
        let p2 = p1 + block_size;
        let lo = begin.max(p1);
        let hi = end.min(p2);
        (lo < hi).then(|| (slot, lo - p1, hi - lo))
    })
}

/// Reads up to `len` bytes at `offset`. Reads at or past the end return nothing.
/// The inode must already be loaded.
pub fn fread<D: BlockDevice>(
    io: &mut BlockIo<D>,
    tree: &mut Tree,
    node: NodeId,
    offset: usize,
    len: usize,
) -> Result<Vec<u8>> {
    let block_size = io.block_size();
    let inode = file_inode(tree, node)?;
    let size = inode.size as usize;
    if offset >= size {
        return Ok(Vec::new());
    }
    let end = size.min(offset.saturating_add(len));

    let mut out = Vec::with_capacity(end - offset);
    let ino = inode.ino;
    for (slot, start, n) in spans(block_size, offset, end) {
        match page_in(io, inode, slot)? {
            Some(Page::Cached { buf, .. }) => out.extend_from_slice(&buf[start..start + n]),
            _ => {
                log::warn!("read of empty slot {} of inode {}", slot, ino);
                out.resize(out.len() + n, 0);
            }
        }
    }
    Ok(out)
}

/// Writes `data` at `offset`, growing the file first if needed. Memory only.
pub fn fwrite<D: BlockDevice>(
    io: &mut BlockIo<D>,
    tree: &mut Tree,
    node: NodeId,
    offset: usize,
    data: &[u8],
) -> Result<usize> {
    if data.is_empty() {
        return Ok(0);
    }
    let block_size = io.block_size();
    let end = offset.checked_add(data.len()).ok_or(FsError::FileTooLarge)?;
    let size = file_inode(tree, node)?.size as usize;
    if end > size {
        ftruncate(io, tree, node, end)?;
    }

    let inode = file_inode(tree, node)?;
    let mut written = 0;
    let ino = inode.ino;
    for (slot, start, n) in spans(block_size, offset, end) {
        match page_in(io, inode, slot)? {
            Some(Page::Cached { buf, dirty }) => {
                buf[start..start + n].copy_from_slice(&data[written..written + n]);
                *dirty = true;
            }
            _ => {
                return Err(FsError::Corruption {
                    block: 0,
                    detail: format!("slot {} of inode {} missing inside file size", slot, ino),
                });
            }
        }
        log::trace!("write inode {} slot {} [{}, {})", ino, slot, start, start + n);
        written += n;
    }
    Ok(written)
}

/// Sets the size of a loaded file. Slots past the new end are dropped from memory;
/// newly covered slots get fresh zeroed pages. Disk blocks are reconciled at sync.
/// Bytes past the new end of a kept slot are zeroed so a later grow reads zeros.
pub fn ftruncate<D: BlockDevice>(io: &mut BlockIo<D>, tree: &mut Tree, node: NodeId, new_size: usize) -> Result<()> {
    let block_size = io.block_size();
    let inode = file_inode(tree, node)?;
    let new_count = new_size.div_ceil(block_size);
    if new_count > MAX_DIRECT || u32::try_from(new_size).is_err() {
        return Err(FsError::FileTooLarge);
    }
    let count = (inode.size as usize).div_ceil(block_size);

    for page in inode.pages.iter_mut().take(count).skip(new_count) {
        *page = Page::Absent;
    }
    let tail = new_size % block_size;
    if new_size < inode.size as usize && tail != 0 {
        if let Some(Page::Cached { buf, dirty }) = page_in(io, inode, new_count - 1)? {
            buf[tail..].fill(0);
            *dirty = true;
        }
    }
    for page in inode.pages.iter_mut().take(new_count).skip(count) {
        *page = Page::Cached {
            buf: vec![0u8; block_size].into_boxed_slice(),
            dirty: true,
        };
    }
    log::debug!("truncate inode {} from {} to {}", inode.ino, inode.size, new_size);
    inode.size = new_size as u32;
    Ok(())
}
