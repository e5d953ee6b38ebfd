use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::config::DEFAULT_IO_SIZE;
use crate::error::Result;

/// A raw device addressed in bytes and transferred in IO units.
/// Closing the device is dropping it.
pub trait BlockDevice {
    /// Size of one IO unit in bytes.
    fn io_size(&self) -> usize;

    /// Total size of the device in bytes.
    fn disk_size(&self) -> u64;

    /// Moves the cursor to an absolute byte offset, returning the new position.
    fn seek(&mut self, offset: u64) -> Result<u64>;

    /// Reads into `buf` from the cursor, returning the number of bytes transferred.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes `buf` at the cursor, returning the number of bytes transferred.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flushes any cached data to the device.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Disk image backed by a regular file.
#[derive(Debug)]
pub struct FileDisk {
    file: File,
    io_size: usize,
    disk_size: u64,
}

impl FileDisk {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let disk_size = file.metadata()?.len();
        Ok(Self {
            file,
            io_size: DEFAULT_IO_SIZE,
            disk_size,
        })
    }

    /// Creates (or resizes) an image of `disk_size` bytes.
    pub fn create(path: impl AsRef<Path>, disk_size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(disk_size)?;
        Ok(Self {
            file,
            io_size: DEFAULT_IO_SIZE,
            disk_size,
        })
    }

    pub fn with_io_size(mut self, io_size: usize) -> Self {
        self.io_size = io_size;
        self
    }
}

impl BlockDevice for FileDisk {
    fn io_size(&self) -> usize {
        self.io_size
    }

    fn disk_size(&self) -> u64 {
        self.disk_size
    }

    fn seek(&mut self, offset: u64) -> Result<u64> {
        Ok(self.file.seek(SeekFrom::Start(offset))?)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            match self.file.read(&mut buf[done..])? {
                0 => break,
                n => done += n,
            }
        }
        Ok(done)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            match self.file.write(&buf[done..])? {
                0 => break,
                n => done += n,
            }
        }
        Ok(done)
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}
