//! Management of data bitmap and inode bitmap.
//! Both bitmaps are held in memory for the lifetime of a mount and written back at sync.
//! A set bit means the inode number (or data block, relative to the data region) is in use.

use crate::error::{FsError, Result};
use crate::SuperBlock;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    bits: Vec<u8>,
}

impl Bitmap {
    /// A zeroed bitmap of `bytes` bytes.
    pub fn new(bytes: usize) -> Self {
        Self { bits: vec![0; bytes] }
    }

    pub fn from_bytes(bits: Vec<u8>) -> Self {
        Self { bits }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Number of bits the bitmap can track.
    pub fn capacity(&self) -> usize {
        self.bits.len() * 8
    }

    pub fn test(&self, bit: usize) -> bool {
        self.bits[bit / 8] >> (bit & 0x7) & 1 != 0
    }

    pub fn set(&mut self, bit: usize) {
        self.bits[bit / 8] |= 1 << (bit & 0x7);
    }

    pub fn clear(&mut self, bit: usize) {
        self.bits[bit / 8] &= !(1 << (bit & 0x7));
    }

    /// Sets the first clear bit below `limit` and returns its index.
    pub fn set_first_clear(&mut self, limit: usize) -> Option<usize> {
        let limit = limit.min(self.capacity());
        let bit = (0..limit).find(|&bit| !self.test(bit))?;
        self.set(bit);
        Some(bit)
    }

    /// Number of set bits below `limit`.
    pub fn count_set(&self, limit: usize) -> usize {
        (0..limit.min(self.capacity())).filter(|&bit| self.test(bit)).count()
    }
}

impl SuperBlock {
    /// Inode numbers the inode bitmap can hand out.
    pub fn inode_capacity(&self) -> usize {
        (self.num_inodes as usize).min(self.inode_bitmap.capacity())
    }

    /// Data blocks the data bitmap can hand out.
    pub fn block_capacity(&self) -> usize {
        (self.data_blocks as usize).min(self.data_bitmap.capacity())
    }

    pub fn free_inodes(&self) -> usize {
        self.inode_capacity() - self.inode_bitmap.count_set(self.inode_capacity())
    }

    pub fn free_blocks(&self) -> usize {
        self.block_capacity() - self.data_bitmap.count_set(self.block_capacity())
    }
}

// Public API for managing data bitmap and inode bitmap.

/// Allocates a new inode number, setting its bit in the inode bitmap.
pub fn alloc_inode_id(superblock: &mut SuperBlock) -> Result<u32> {
    let limit = superblock.inode_capacity();
    superblock
        .inode_bitmap
        .set_first_clear(limit)
        .map(|ino| ino as u32)
        .ok_or(FsError::OutOfInodes)
}

/// Frees an inode number, clearing its bit in the inode bitmap.
pub fn free_inode_id(superblock: &mut SuperBlock, ino: u32) -> Result<()> {
    if ino as usize >= superblock.inode_capacity() {
        return Err(FsError::OutOfBounds);
    }
    superblock.inode_bitmap.clear(ino as usize);
    Ok(())
}

/// Allocates a new data block, setting its bit in the data bitmap.
/// Returns the absolute block ID; the bitmap index is `result - data_start`.
pub fn alloc_data_block(superblock: &mut SuperBlock) -> Result<u32> {
    let limit = superblock.block_capacity();
    let relative = superblock
        .data_bitmap
        .set_first_clear(limit)
        .ok_or(FsError::OutOfSpace)?;
    Ok(superblock.data_start + relative as u32)
}

/// Frees an absolute data block, clearing its bit in the data bitmap.
pub fn free_data_block(superblock: &mut SuperBlock, block_id: u32) -> Result<()> {
    if block_id < superblock.data_start {
        return Err(FsError::InvalidBlockId(block_id));
    }
    let relative = (block_id - superblock.data_start) as usize;
    if relative >= superblock.block_capacity() {
        return Err(FsError::InvalidBlockId(block_id));
    }
    superblock.data_bitmap.clear(relative);
    Ok(())
}
