//! File metadata.

/// Metadata reported by `stat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stat {
    /// Inode number.
    pub ino: u32,
    /// Mode bits, stored verbatim at creation or `chmod` time.
    pub mode: u32,
    /// File size in bytes.
    pub size: u32,
}
