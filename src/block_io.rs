//! Logical block access on top of a raw IO-unit device.
//! A logical block is `io_per_block` consecutive IO units.

use crate::config::IO_PER_BLOCK;
use crate::error::{FsError, Result};
use crate::BlockDevice;

pub struct BlockIo<D: BlockDevice> {
    device: D,
    io_size: usize,
    io_per_block: usize,
}

impl<D: BlockDevice> BlockIo<D> {
    pub fn new(device: D) -> Self {
        let io_size = device.io_size();
        Self {
            device,
            io_size,
            io_per_block: IO_PER_BLOCK,
        }
    }

    /// Returns `(io_size, disk_size)` of the underlying device.
    pub fn geometry(&self) -> (usize, u64) {
        (self.io_size, self.device.disk_size())
    }

    pub fn block_size(&self) -> usize {
        self.io_size * self.io_per_block
    }

    pub fn io_per_block(&self) -> usize {
        self.io_per_block
    }

    /// Reads logical block `block_id` into `buf`.
    /// buf.len() must be equal to block_size().
    pub fn read_block(&mut self, block_id: u32, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.block_size() {
            return Err(FsError::OutOfBounds);
        }
        for (i, unit) in buf.chunks_mut(self.io_size).enumerate() {
            self.seek_unit(block_id, i)?;
            let n = self.device.read(unit)?;
            if n != self.io_size {
                return Err(FsError::ShortTransfer {
                    block: block_id,
                    expected: self.io_size,
                    actual: n,
                });
            }
        }
        Ok(())
    }

    /// Writes `buf` to logical block `block_id`.
    /// buf.len() must be equal to block_size().
    pub fn write_block(&mut self, block_id: u32, buf: &[u8]) -> Result<()> {
        if buf.len() != self.block_size() {
            return Err(FsError::OutOfBounds);
        }
        for (i, unit) in buf.chunks(self.io_size).enumerate() {
            self.seek_unit(block_id, i)?;
            let n = self.device.write(unit)?;
            if n != self.io_size {
                return Err(FsError::ShortTransfer {
                    block: block_id,
                    expected: self.io_size,
                    actual: n,
                });
            }
        }
        Ok(())
    }

    /// Copies bytes `[begin, end)` of block `block_id` into `dest`.
    pub fn read_range(&mut self, block_id: u32, dest: &mut [u8], begin: usize, end: usize) -> Result<()> {
        self.check_range(dest.len(), begin, end)?;
        let mut buf = vec![0u8; self.block_size()];
        self.read_block(block_id, &mut buf)?;
        dest.copy_from_slice(&buf[begin..end]);
        Ok(())
    }

    /// Splices `src` into bytes `[begin, end)` of block `block_id`.
    pub fn write_range(&mut self, block_id: u32, src: &[u8], begin: usize, end: usize) -> Result<()> {
        self.check_range(src.len(), begin, end)?;
        let mut buf = vec![0u8; self.block_size()];
        self.read_block(block_id, &mut buf)?;
        buf[begin..end].copy_from_slice(src);
        self.write_block(block_id, &buf)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.device.flush()
    }

    /// Closes the adapter and hands the device back.
    pub fn into_inner(self) -> D {
        self.device
    }

    fn check_range(&self, len: usize, begin: usize, end: usize) -> Result<()> {
        if begin > end || end > self.block_size() || end - begin != len {
            return Err(FsError::OutOfBounds);
        }
        Ok(())
    }

    fn seek_unit(&mut self, block_id: u32, unit: usize) -> Result<()> {
        let offset = ((block_id as usize * self.io_per_block + unit) * self.io_size) as u64;
        let pos = self.device.seek(offset)?;
        if pos != offset {
            return Err(FsError::ShortTransfer {
                block: block_id,
                expected: offset as usize,
                actual: pos as usize,
            });
        }
        Ok(())
    }
}
