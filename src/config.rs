pub const MAGIC: u32 = 0x11451419;

pub const IO_PER_BLOCK: usize = 2; // IO units per logical block
pub const DEFAULT_IO_SIZE: usize = 512; // IO unit size of a plain file image
pub const SUPERBLOCK_ID: u32 = 0; // Block ID for the superblock

pub const MAX_NAME_LEN: usize = 128; // Name field of a dentry record, NUL included
pub const MAX_DIRECT: usize = 6; // Number of direct pointers in an inode

pub const SUPERBLOCK_SIZE: usize = 76; // Encoded superblock record
pub const INODE_SIZE: usize = 40; // ino + size + link + ftype + direct pointers
pub const DENTRY_SIZE: usize = 4 + MAX_NAME_LEN + 4; // ino + name + ftype

pub const DEFAULT_PERM: u16 = 0o777;
pub const DOT_NAME: &str = ".";
pub const DOTDOT_NAME: &str = "..";
