//! Tau is a small block file system kept on a raw disk image.
//! No permissions, timestamps or indirect blocks; every inode owns at most 6 direct blocks.
//!
//! Tau's linear layout (one logical block = 2 device IO units):
//! - Superblock
//! - Inode Bitmap
//! - Data Bitmap
//! - Inode Table
//! - Data Blocks
//!
//! Tau's layers (from bottom to top):
//! 1. Block Device: byte-addressed device moved in IO units.    | User implemented (FileDisk provided)
//! 2. Block IO: logical blocks and sub-block ranges.            | Fs implemented
//! 3. Bitmap/Superblock: layout and allocation state.           | Fs implemented
//! 4. Inode/Tree: lazily loaded dentries and inodes in memory.  | Fs implemented
//! 5. Directory/Path/File: names, resolution and byte ranges.   | Fs implemented
//! 6. FileSystem: the mounted context, path and node operations.| Host adapters (FUSE, CLI)
//!
//! Everything above layer 3 works on memory only; state reaches the disk on
//! [`FileSystem::sync`] and [`FileSystem::unmount`].

mod config;
mod block_dev;
mod block_io;
mod structs;
mod bitmap;
mod superblock;
mod tree;
mod inode;
mod directory;
mod path;
mod file;
mod fs;
mod error;

#[cfg(feature = "fuse")]
pub mod fuse;

pub use block_dev::{BlockDevice, FileDisk};
pub use block_io::BlockIo;
pub use config::*;
pub use structs::{DiskDentry, DiskInode, FileType, SuperBlock};
pub use tree::{Dentry, NodeId, Tree};
pub use fs::*;
pub use error::FsError as Error;
pub use error::Result;
