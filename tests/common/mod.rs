//! Common utilities for tests

#![allow(unused)]

use std::sync::{Arc, Mutex, MutexGuard};

use tau::{BlockDevice, Error, Result};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

pub const IO_SIZE: usize = 512;
pub const BLOCK_SIZE: usize = IO_SIZE * tau::IO_PER_BLOCK;

/// Memory-backed device. Clones of [`RamDisk::handle`] see the same bytes,
/// so a test can inspect or damage the image while it is mounted.
pub struct RamDisk {
    data: Arc<Mutex<Vec<u8>>>,
    pos: u64,
    io_size: usize,
}

impl RamDisk {
    pub fn new(disk_size: usize) -> Self {
        Self::with_io_size(disk_size, IO_SIZE)
    }

    pub fn with_io_size(disk_size: usize, io_size: usize) -> Self {
        Self {
            data: Arc::new(Mutex::new(vec![0u8; disk_size])),
            pos: 0,
            io_size,
        }
    }

    /// Another device over the same bytes, as if the image were reopened.
    pub fn from_handle(data: Arc<Mutex<Vec<u8>>>) -> Self {
        Self {
            data,
            pos: 0,
            io_size: IO_SIZE,
        }
    }

    pub fn handle(&self) -> Arc<Mutex<Vec<u8>>> {
        self.data.clone()
    }

    pub fn bytes(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock().unwrap()
    }
}

impl BlockDevice for RamDisk {
    fn io_size(&self) -> usize {
        self.io_size
    }

    fn disk_size(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
    }

    fn seek(&mut self, offset: u64) -> Result<u64> {
        if offset > self.disk_size() {
            return Err(Error::OutOfBounds);
        }
        self.pos = offset;
        Ok(offset)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let data = self.data.lock().unwrap();
        let start = self.pos as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        drop(data);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut data = self.data.lock().unwrap();
        let start = self.pos as usize;
        let n = buf.len().min(data.len() - start);
        data[start..start + n].copy_from_slice(&buf[..n]);
        drop(data);
        self.pos += n as u64;
        Ok(n)
    }
}

/// Names of a directory in listing order.
pub fn list<D: BlockDevice>(fs: &mut tau::FileSystem<D>, path: &str) -> Vec<String> {
    let mut names = Vec::new();
    fs.read_dir(path, 0, |entry| {
        names.push(entry.name.to_string());
        true
    })
    .unwrap();
    names
}
