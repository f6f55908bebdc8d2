//! Engine errors and their host return codes.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, self::Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The path does not resolve to a live inode.
    #[error("no such file or directory")]
    NotFound,

    /// A path component or operand that must be a directory is not one.
    #[error("not a directory")]
    NotADirectory,

    /// A file operation was applied to a directory.
    #[error("is a directory")]
    IsADirectory,

    /// The final path component exceeds the 15-byte name limit.
    #[error("name too long")]
    NameTooLong,

    /// The destination name is already present in the directory.
    #[error("file exists")]
    AlreadyExists,

    /// The inode table, the block pool, or a directory table is full.
    #[error("no space left on image")]
    NoSpace,

    /// The image references a block it does not map.
    #[error("filesystem is corrupt")]
    Corrupt,

    #[error("image i/o: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Integer code for a host adapter: `-2` (the ENOENT class) for a
    /// path that does not exist, `-1` for everything else.
    ///
    /// `find` and the mutating operations conventionally flatten every
    /// failure to `-1`; `read`, `write` and `stat` forward this code.
    pub fn code(&self) -> i32 {
        match self {
            Error::NotFound => -2,
            _ => -1,
        }
    }
}
