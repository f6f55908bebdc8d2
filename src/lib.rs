//! A tiny user-space filesystem over a single fixed-size disk image.
//!
//! Five layers, lowest first:
//!   + Image: fixed-size blocks over one 1 MiB file.
//!   + Bitmaps: allocation state for blocks and inodes.
//!   + Inodes: one direct and one indirect block per file.
//!   + Directories: an inode whose block is a table of entries.
//!   + Paths: absolute names resolved component by component.
//!
//! The facade over all of it is [`Storage`], which exposes the
//! POSIX-flavoured operations a host binding forwards: `find`, `stat`,
//! `read`, `write`, `mknod`, `unlink`, `rename`, `chmod`, `truncate`
//! and `list`. The engine is single-threaded, one operation in flight
//! at a time; mutations reach the image file on [`Storage::sync`] or
//! at teardown.

#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

mod bitmap;
mod dir;
mod error;
mod image;
mod inode;
mod layout;
mod path;
mod stat;
mod storage;

pub use crate::error::{Error, Result};
pub use crate::inode::S_IFDIR;
pub use crate::stat::Stat;
pub use crate::storage::Storage;
