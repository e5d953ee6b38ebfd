use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A seek or transfer on the raw device moved fewer bytes than asked.
    #[error("short transfer on block {block}: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        block: u32,
        expected: usize,
        actual: usize,
    },

    #[error("invalid device geometry: {0}")]
    InvalidGeometry(String),

    #[error("out of bounds")]
    OutOfBounds,

    #[error("invalid block id {0}")]
    InvalidBlockId(u32),

    #[error("corrupt metadata at block {block}: {detail}")]
    Corruption { block: u32, detail: String },

    #[error("not found")]
    NotFound,

    #[error("not a directory")]
    NotDirectory,

    #[error("is a directory")]
    IsDirectory,

    #[error("already exists")]
    AlreadyExists,

    #[error("directory not empty")]
    NotEmpty,

    #[error("invalid file name")]
    InvalidFileName,

    #[error("invalid path")]
    InvalidPath,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("no free inodes")]
    OutOfInodes,

    #[error("no free data blocks")]
    OutOfSpace,

    #[error("file too large")]
    FileTooLarge,
}

pub type Result<T> = core::result::Result<T, FsError>;

impl FsError {
    /// Device failures and corruption; the host layer must not keep serving after these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ShortTransfer { .. } | Self::Corruption { .. }
        )
    }

    pub fn to_errno(&self) -> i32 {
        match self {
            Self::Io(_) | Self::ShortTransfer { .. } | Self::Corruption { .. } => 5, // EIO
            Self::InvalidGeometry(_) => 22,                                          // EINVAL
            Self::OutOfBounds | Self::InvalidBlockId(_) => 22,
            Self::NotFound => 2,   // ENOENT
            Self::NotDirectory => 20, // ENOTDIR
            Self::IsDirectory => 21,  // EISDIR
            Self::AlreadyExists => 17, // EEXIST
            Self::NotEmpty => 39,     // ENOTEMPTY
            Self::InvalidFileName => 36, // ENAMETOOLONG
            Self::InvalidPath | Self::InvalidArgument(_) => 22,
            Self::OutOfInodes | Self::OutOfSpace => 28, // ENOSPC
            Self::FileTooLarge => 27,                   // EFBIG
        }
    }
}
