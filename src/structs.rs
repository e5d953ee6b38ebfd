//! On-disk records and their little-endian encoding.

use crate::bitmap::Bitmap;
use crate::config::*;
use crate::error::{FsError, Result};

#[derive(Debug, Clone)]
pub struct SuperBlock {
    pub magic: u32,               // Magic number to identify the filesystem
    pub io_size: u32,             // Size of one device IO unit
    pub disk_size: u64,           // Size of the device in bytes
    pub block_size: u32,          // io_size * IO_PER_BLOCK
    pub num_blocks: u32,          // Total number of logical blocks

    pub inode_bitmap_start: u32,  // Block number of the inode bitmap
    pub inode_bitmap_blocks: u32, // Size of the inode bitmap in blocks
    pub data_bitmap_start: u32,   // Block number of the data bitmap
    pub data_bitmap_blocks: u32,  // Size of the data bitmap in blocks
    pub inode_table_start: u32,   // Block number where the inode table starts
    pub inodes_per_block: u32,
    pub dentries_per_block: u32,
    pub inode_table_blocks: u32,  // Size of the inode table in blocks
    pub num_inodes: u32,
    pub data_start: u32,          // Block number where data blocks start
    pub data_blocks: u32,         // Size of the data region in blocks

    pub root_inode: u32,          // Inode number of the root directory
    pub mounted: bool,

    // only available in memory:
    pub inode_bitmap: Bitmap,
    pub data_bitmap: Bitmap,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular = 0,
    Directory = 1,
}

impl FileType {
    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Regular),
            1 => Some(Self::Directory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskInode {
    pub ino: u32,
    pub size: u32,
    pub link: u32,
    pub ftype: FileType,
    pub direct: [u32; MAX_DIRECT], // Data block numbers, 0 when unallocated
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskDentry {
    pub ino: u32,
    pub name: [u8; MAX_NAME_LEN],
    pub ftype: FileType,
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(raw)
}

fn put_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

impl SuperBlock {
    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        put_u32(&mut buf, 0, self.magic);
        put_u32(&mut buf, 4, self.io_size);
        buf[8..16].copy_from_slice(&self.disk_size.to_le_bytes());
        let rest = [
            self.block_size,
            self.num_blocks,
            self.inode_bitmap_start,
            self.inode_bitmap_blocks,
            self.data_bitmap_start,
            self.data_bitmap_blocks,
            self.inode_table_start,
            self.inodes_per_block,
            self.dentries_per_block,
            self.inode_table_blocks,
            self.num_inodes,
            self.data_start,
            self.data_blocks,
            self.root_inode,
            self.mounted as u32,
        ];
        for (i, value) in rest.iter().enumerate() {
            put_u32(&mut buf, 16 + i * 4, *value);
        }
        buf
    }

    /// Decodes a record; bitmaps are left empty for the caller to read.
    pub fn decode(buf: &[u8]) -> Self {
        let mut disk_size = [0u8; 8];
        disk_size.copy_from_slice(&buf[8..16]);
        let field = |i: usize| get_u32(buf, 16 + i * 4);
        Self {
            magic: get_u32(buf, 0),
            io_size: get_u32(buf, 4),
            disk_size: u64::from_le_bytes(disk_size),
            block_size: field(0),
            num_blocks: field(1),
            inode_bitmap_start: field(2),
            inode_bitmap_blocks: field(3),
            data_bitmap_start: field(4),
            data_bitmap_blocks: field(5),
            inode_table_start: field(6),
            inodes_per_block: field(7),
            dentries_per_block: field(8),
            inode_table_blocks: field(9),
            num_inodes: field(10),
            data_start: field(11),
            data_blocks: field(12),
            root_inode: field(13),
            mounted: field(14) != 0,
            inode_bitmap: Bitmap::default(),
            data_bitmap: Bitmap::default(),
        }
    }
}

impl DiskInode {
    pub fn new(ino: u32, ftype: FileType) -> Self {
        Self {
            ino,
            size: 0,
            link: 1,
            ftype,
            direct: [0; MAX_DIRECT],
        }
    }

    pub fn encode(&self) -> [u8; INODE_SIZE] {
        let mut buf = [0u8; INODE_SIZE];
        put_u32(&mut buf, 0, self.ino);
        put_u32(&mut buf, 4, self.size);
        put_u32(&mut buf, 8, self.link);
        put_u32(&mut buf, 12, self.ftype as u32);
        for (i, ptr) in self.direct.iter().enumerate() {
            put_u32(&mut buf, 16 + i * 4, *ptr);
        }
        buf
    }

    /// `block` only feeds the corruption report.
    pub fn decode(buf: &[u8], block: u32) -> Result<Self> {
        let ftype = FileType::from_raw(get_u32(buf, 12)).ok_or_else(|| FsError::Corruption {
            block,
            detail: format!("bad inode type {}", get_u32(buf, 12)),
        })?;
        let mut direct = [0u32; MAX_DIRECT];
        for (i, ptr) in direct.iter_mut().enumerate() {
            *ptr = get_u32(buf, 16 + i * 4);
        }
        Ok(Self {
            ino: get_u32(buf, 0),
            size: get_u32(buf, 4),
            link: get_u32(buf, 8),
            ftype,
            direct,
        })
    }
}

impl DiskDentry {
    pub fn new(ino: u32, name: &str, ftype: FileType) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() >= MAX_NAME_LEN {
            return Err(FsError::InvalidFileName);
        }
        let mut arr = [0u8; MAX_NAME_LEN];
        arr[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { ino, name: arr, ftype })
    }

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&c| c == 0).unwrap_or(MAX_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn encode_into(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.ino);
        buf[4..4 + MAX_NAME_LEN].copy_from_slice(&self.name);
        put_u32(buf, 4 + MAX_NAME_LEN, self.ftype as u32);
    }

    pub fn decode(buf: &[u8], block: u32) -> Result<Self> {
        let raw_type = get_u32(buf, 4 + MAX_NAME_LEN);
        let ftype = FileType::from_raw(raw_type).ok_or_else(|| FsError::Corruption {
            block,
            detail: format!("bad dentry type {}", raw_type),
        })?;
        let mut name = [0u8; MAX_NAME_LEN];
        name.copy_from_slice(&buf[4..4 + MAX_NAME_LEN]);
        name[MAX_NAME_LEN - 1] = 0;
        Ok(Self {
            ino: get_u32(buf, 0),
            name,
            ftype,
        })
    }
}
