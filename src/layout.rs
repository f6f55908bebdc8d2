//! Disk layout:
//! [ block bitmap | inode bitmap | inode table | data blocks ]
//!
//! There is no superblock: the geometry is fixed at build time and an
//! image is always exactly `NBLOCKS * BSIZE` bytes. Block 0 holds the
//! block-allocation bitmap, block 1 the inode bitmap, and the inode
//! table starts at block 2; everything after the table is the data
//! pool.

use std::mem;

use static_assertions::const_assert;

use crate::inode::Dinode;

/// Block size in bytes.
pub const BSIZE: usize = 4096;

/// Size of the image in blocks.
pub const NBLOCKS: usize = 256;

/// Number of inodes in the inode table. Inode 0 is reserved.
pub const NINODES: usize = 256;

/// Size of the image file in bytes.
pub const IMAGE_SIZE: u64 = (NBLOCKS * BSIZE) as u64;

/// root i-number
pub const ROOTINO: u32 = 1;

/// Block holding the block-allocation bitmap.
pub const BMAP_BLOCK: usize = 0;

/// Block holding the inode bitmap.
pub const IMAP_BLOCK: usize = 1;

/// First block of the inode table.
pub const INODE_START: usize = 2;

/// Inodes per inode-table block.
pub const IPB: usize = BSIZE / mem::size_of::<Dinode>();

/// Blocks occupied by the inode table.
pub const NIBLOCKS: usize = (NINODES + IPB - 1) / IPB;

/// First data block; every block below this is reserved metadata.
pub const DATA_START: usize = INODE_START + NIBLOCKS;

/// Block numbers an indirect block can hold.
pub const NINDIRECT: usize = BSIZE / mem::size_of::<u32>();

/// Maximum file size in blocks: the primary block plus one fully
/// populated indirect block.
pub const MAXFILE: usize = 1 + NINDIRECT;

// Each bitmap must address its whole range from a single block, and
// the byte-granular bitmap views require whole bytes.
const_assert!(NBLOCKS <= BSIZE * 8);
const_assert!(NINODES <= BSIZE * 8);
const_assert!(NBLOCKS % 8 == 0);
const_assert!(NINODES % 8 == 0);
const_assert!(DATA_START < NBLOCKS);

/// Block of the inode table containing inode `i`.
pub const fn iblock(i: u32) -> usize {
    INODE_START + i as usize / IPB
}

/// Byte offset of inode `i` within its table block.
pub const fn ioffset(i: u32) -> usize {
    i as usize % IPB * mem::size_of::<Dinode>()
}
