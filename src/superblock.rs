use crate::bitmap::Bitmap;
use crate::block_io::BlockIo;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::{BlockDevice, SuperBlock};

impl SuperBlock {
    /// Computes a fresh layout for a device of the given geometry.
    /// Bitmaps come back zeroed; the root inode is not allocated yet.
    pub fn build(io_size: usize, disk_size: u64) -> Result<Self> {
        let block_size = io_size * IO_PER_BLOCK;
        if block_size < SUPERBLOCK_SIZE.max(DENTRY_SIZE) {
            return Err(FsError::InvalidGeometry(format!(
                "block size {} too small",
                block_size
            )));
        }
        let num_blocks = u32::try_from(disk_size / block_size as u64)
            .map_err(|_| FsError::InvalidGeometry(format!("disk of {} bytes too large", disk_size)))?;

        let inode_bitmap_start = SUPERBLOCK_ID + 1;
        let inode_bitmap_blocks = 1;
        let data_bitmap_start = inode_bitmap_start + inode_bitmap_blocks;
        let data_bitmap_blocks = 1;

        let inode_table_start = data_bitmap_start + data_bitmap_blocks;
        let inodes_per_block = (block_size / INODE_SIZE) as u32;
        let inode_table_blocks = num_blocks.div_ceil(inodes_per_block);
        let dentries_per_block = (block_size / DENTRY_SIZE) as u32;
        let num_inodes = inodes_per_block * inode_table_blocks;

        let data_start = inode_table_start + inode_table_blocks;
        if data_start >= num_blocks {
            return Err(FsError::InvalidGeometry(format!(
                "{} blocks leave no data region",
                num_blocks
            )));
        }

        Ok(Self {
            magic: MAGIC,
            io_size: io_size as u32,
            disk_size,
            block_size: block_size as u32,
            num_blocks,
            inode_bitmap_start,
            inode_bitmap_blocks,
            data_bitmap_start,
            data_bitmap_blocks,
            inode_table_start,
            inodes_per_block,
            dentries_per_block,
            inode_table_blocks,
            num_inodes,
            data_start,
            data_blocks: num_blocks - data_start,
            root_inode: 0,
            mounted: false,
            inode_bitmap: Bitmap::new(block_size),
            data_bitmap: Bitmap::new(block_size),
        })
    }

    /// Block holding the record of inode `ino`, and the record's byte offset in it.
    pub fn inode_position(&self, ino: u32) -> (u32, usize) {
        let block_id = self.inode_table_start + ino / self.inodes_per_block;
        let offset = (ino % self.inodes_per_block) as usize * INODE_SIZE;
        (block_id, offset)
    }
}

/// Reads block 0 as a candidate superblock. Returns `None` if the magic does not match.
pub fn read_superblock<D: BlockDevice>(io: &mut BlockIo<D>) -> Result<Option<SuperBlock>> {
    let mut buf = [0u8; SUPERBLOCK_SIZE];
    io.read_range(SUPERBLOCK_ID, &mut buf, 0, SUPERBLOCK_SIZE)?;
    let superblock = SuperBlock::decode(&buf);

    if superblock.magic != MAGIC {
        return Ok(None);
    }
    check_layout(&superblock, io.geometry())?;
    Ok(Some(superblock))
}

/// Rejects a recorded layout that differs from the one `build` derives for the
/// same device, so no later offset arithmetic can leave the device.
fn check_layout(superblock: &SuperBlock, (io_size, disk_size): (usize, u64)) -> Result<()> {
    let corrupt = |detail: String| FsError::Corruption {
        block: SUPERBLOCK_ID,
        detail,
    };
    if superblock.io_size as usize != io_size {
        return Err(corrupt(format!(
            "io size {} does not match device io size {}",
            superblock.io_size, io_size
        )));
    }
    if superblock.disk_size > disk_size {
        return Err(corrupt(format!(
            "recorded disk size {} exceeds device size {}",
            superblock.disk_size, disk_size
        )));
    }
    let expected = SuperBlock::build(io_size, superblock.disk_size)
        .map_err(|e| corrupt(format!("recorded geometry is unusable: {}", e)))?;

    let fields = [
        ("block_size", superblock.block_size, expected.block_size),
        ("num_blocks", superblock.num_blocks, expected.num_blocks),
        ("inode_bitmap_start", superblock.inode_bitmap_start, expected.inode_bitmap_start),
        ("inode_bitmap_blocks", superblock.inode_bitmap_blocks, expected.inode_bitmap_blocks),
        ("data_bitmap_start", superblock.data_bitmap_start, expected.data_bitmap_start),
        ("data_bitmap_blocks", superblock.data_bitmap_blocks, expected.data_bitmap_blocks),
        ("inode_table_start", superblock.inode_table_start, expected.inode_table_start),
        ("inodes_per_block", superblock.inodes_per_block, expected.inodes_per_block),
        ("dentries_per_block", superblock.dentries_per_block, expected.dentries_per_block),
        ("inode_table_blocks", superblock.inode_table_blocks, expected.inode_table_blocks),
        ("num_inodes", superblock.num_inodes, expected.num_inodes),
        ("data_start", superblock.data_start, expected.data_start),
        ("data_blocks", superblock.data_blocks, expected.data_blocks),
    ];
    if let Some((name, found, want)) = fields.iter().find(|(_, found, want)| found != want) {
        return Err(corrupt(format!("{} is {}, expected {}", name, found, want)));
    }
    if superblock.root_inode >= superblock.num_inodes {
        return Err(corrupt(format!("root inode {} out of range", superblock.root_inode)));
    }
    Ok(())
}

pub fn write_superblock<D: BlockDevice>(io: &mut BlockIo<D>, superblock: &SuperBlock) -> Result<()> {
    io.write_range(SUPERBLOCK_ID, &superblock.encode(), 0, SUPERBLOCK_SIZE)
}

/// Loads both bitmaps from their recorded offsets.
pub fn read_bitmaps<D: BlockDevice>(io: &mut BlockIo<D>, superblock: &mut SuperBlock) -> Result<()> {
    let mut imap = vec![0u8; io.block_size()];
    io.read_block(superblock.inode_bitmap_start, &mut imap)?;
    let mut dmap = vec![0u8; io.block_size()];
    io.read_block(superblock.data_bitmap_start, &mut dmap)?;
    superblock.inode_bitmap = Bitmap::from_bytes(imap);
    superblock.data_bitmap = Bitmap::from_bytes(dmap);
    Ok(())
}

pub fn write_bitmaps<D: BlockDevice>(io: &mut BlockIo<D>, superblock: &SuperBlock) -> Result<()> {
    io.write_block(superblock.inode_bitmap_start, superblock.inode_bitmap.as_bytes())?;
    io.write_block(superblock.data_bitmap_start, superblock.data_bitmap.as_bytes())?;
    Ok(())
}
