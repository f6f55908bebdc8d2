//! Inodes.
//!
//! An inode describes a single unnamed file or directory: its mode,
//! its length, a primary data block, and at most one indirect block of
//! further data-block numbers. Inodes live densely in the table blocks
//! and are addressed by number; inode 0 is reserved as "unused".

use std::cmp;
use std::mem;

use log::trace;
use zerocopy::{AsBytes, FromBytes, LayoutVerified};

use crate::dir;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::layout::{iblock, ioffset, BSIZE, MAXFILE, NINDIRECT, NINODES};

/// Directory bit of the mode field (`S_IFDIR`).
pub const S_IFDIR: u32 = 0o040000;

/// On-disk inode record.
#[repr(C)]
#[derive(Clone, Copy, Default, AsBytes, FromBytes)]
pub struct Dinode {
    /// Type and permission bits; only the directory bit is interpreted.
    pub mode: u32,
    /// File length in bytes. Directories keep 0.
    pub size: u32,
    /// Primary data block; always allocated for a live inode.
    pub block: u32,
    /// Indirect block, or 0 while the file fits its primary block.
    pub iblock: u32,
}

impl Dinode {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFDIR != 0
    }
}

/// Read inode `inum` from the table.
pub fn get(img: &Image, inum: u32) -> Dinode {
    assert!((inum as usize) < NINODES, "inode out of range");
    let off = ioffset(inum);
    let bytes = &img.block(iblock(inum))[off..off + mem::size_of::<Dinode>()];
    *LayoutVerified::<_, Dinode>::new(bytes).expect("inode table alignment")
}

/// Write inode `inum` back to the table.
pub fn put(img: &mut Image, inum: u32, node: &Dinode) {
    assert!((inum as usize) < NINODES, "inode out of range");
    let off = ioffset(inum);
    img.block_mut(iblock(inum))[off..off + mem::size_of::<Dinode>()]
        .copy_from_slice(node.as_bytes());
}

/// Allocate an inode: the lowest clear bit of the inode bitmap. Inode
/// 0 is never handed out.
pub fn alloc(img: &mut Image) -> Result<u32> {
    let inum = img.inode_bitmap().first_clear(1).ok_or(Error::NoSpace)?;
    img.inode_bitmap_mut().set(inum);
    trace!("alloc_inode: {}", inum);
    Ok(inum as u32)
}

/// Free inode `inum` and every block reachable from it: for a
/// directory, the live children first, recursively; then the primary
/// block, the populated indirect slots, and the indirect block itself.
/// The record is zeroed and the bitmap bit cleared.
pub fn free(img: &mut Image, inum: u32) {
    let node = get(img, inum);
    if node.is_dir() {
        // Collect the children before recursing; freeing them rewrites
        // the image under the directory block.
        for child in dir::live_inums(img, &node) {
            free(img, child);
        }
        img.block_mut(node.block as usize).fill(0);
    }
    img.free_block(node.block);
    if node.iblock != 0 {
        for slot in indirect(img, node.iblock).to_vec() {
            if slot != 0 {
                img.free_block(slot);
            }
        }
        img.free_block(node.iblock);
    }
    put(img, inum, &Dinode::default());
    img.inode_bitmap_mut().clear(inum as usize);
    trace!("free_inode: {}", inum);
}

/// Ensure `node` maps enough data blocks for a `new_size`-byte file.
/// The primary block always exists, so the mapped count never drops
/// below 1; growth fills the first empty indirect slots with freshly
/// allocated blocks. Never shrinks.
///
/// The caller owns writing the modified record back to the table.
pub fn grow(img: &mut Image, node: &mut Dinode, new_size: u32) -> Result<()> {
    let mut have = blocks_for(node.size);
    let want = blocks_for(new_size);
    if want > MAXFILE {
        return Err(Error::NoSpace);
    }
    while have < want {
        if node.iblock == 0 {
            node.iblock = img.alloc_block()?;
        }
        let slot = indirect(img, node.iblock)
            .iter()
            .position(|&a| a == 0)
            .ok_or(Error::NoSpace)?;
        let fresh = img.alloc_block()?;
        indirect_mut(img, node.iblock)[slot] = fresh;
        have += 1;
    }
    Ok(())
}

/// Release every non-primary block of `node`: free the populated
/// indirect slots, zero them, then free the indirect block itself.
/// `size` is left for the caller to adjust, or not.
pub fn trunc(img: &mut Image, node: &mut Dinode) {
    if node.iblock == 0 {
        return;
    }
    for slot in indirect(img, node.iblock).to_vec() {
        if slot != 0 {
            img.free_block(slot);
        }
    }
    img.block_mut(node.iblock as usize).fill(0);
    img.free_block(node.iblock);
    node.iblock = 0;
}

/// Data block holding file block `bn` of `node`: the primary block for
/// index 0, otherwise indirect slot `bn - 1`.
pub fn bmap(img: &Image, node: &Dinode, bn: usize) -> Result<u32> {
    if bn == 0 {
        return Ok(node.block);
    }
    if bn > NINDIRECT || node.iblock == 0 {
        return Err(Error::Corrupt);
    }
    match indirect(img, node.iblock)[bn - 1] {
        0 => Err(Error::Corrupt),
        bnum => Ok(bnum),
    }
}

/// Blocks needed to hold a `size`-byte file; at least the primary.
fn blocks_for(size: u32) -> usize {
    cmp::max(1, (size as usize + BSIZE - 1) / BSIZE)
}

fn indirect(img: &Image, iblock: u32) -> &[u32] {
    LayoutVerified::<_, [u32]>::new_slice(&img.block(iblock as usize)[..])
        .expect("indirect block alignment")
        .into_slice()
}

fn indirect_mut(img: &mut Image, iblock: u32) -> &mut [u32] {
    LayoutVerified::<_, [u32]>::new_slice(&mut img.block_mut(iblock as usize)[..])
        .expect("indirect block alignment")
        .into_mut_slice()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DATA_START;

    fn open_temp() -> (tempfile::NamedTempFile, Image) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let img = Image::open(file.path()).unwrap();
        (file, img)
    }

    fn blocks_in_use(img: &Image) -> usize {
        (0..crate::layout::NBLOCKS)
            .filter(|&b| img.block_bitmap().get(b))
            .count()
    }

    #[test]
    fn alloc_is_lowest_free_and_skips_zero() {
        let (_file, mut img) = open_temp();
        assert_eq!(alloc(&mut img).unwrap(), 1);
        assert_eq!(alloc(&mut img).unwrap(), 2);
        img.inode_bitmap_mut().clear(1);
        assert_eq!(alloc(&mut img).unwrap(), 1);
    }

    #[test]
    fn records_round_trip_through_the_table() {
        let (_file, mut img) = open_temp();
        let node = Dinode {
            mode: 0o100644,
            size: 17,
            block: DATA_START as u32,
            iblock: 0,
        };
        put(&mut img, 7, &node);
        let back = get(&img, 7);
        assert_eq!(back.mode, 0o100644);
        assert_eq!(back.size, 17);
        assert_eq!(back.block, DATA_START as u32);
        assert_eq!(back.iblock, 0);
    }

    #[test]
    fn grow_within_primary_block_allocates_nothing() {
        let (_file, mut img) = open_temp();
        let mut node = Dinode {
            mode: 0o100644,
            size: 0,
            block: img.alloc_block().unwrap(),
            iblock: 0,
        };
        let before = blocks_in_use(&img);
        grow(&mut img, &mut node, BSIZE as u32).unwrap();
        assert_eq!(node.iblock, 0);
        assert_eq!(blocks_in_use(&img), before);
    }

    #[test]
    fn grow_past_primary_block_goes_indirect() {
        let (_file, mut img) = open_temp();
        let mut node = Dinode {
            mode: 0o100644,
            size: 0,
            block: img.alloc_block().unwrap(),
            iblock: 0,
        };
        let before = blocks_in_use(&img);
        grow(&mut img, &mut node, BSIZE as u32 + 1).unwrap();
        assert_ne!(node.iblock, 0);
        // One indirect block plus one indirect data block.
        assert_eq!(blocks_in_use(&img), before + 2);
        assert_eq!(bmap(&img, &node, 1).unwrap(), indirect(&img, node.iblock)[0]);
    }

    #[test]
    fn trunc_releases_everything_but_the_primary() {
        let (_file, mut img) = open_temp();
        let mut node = Dinode {
            mode: 0o100644,
            size: 0,
            block: img.alloc_block().unwrap(),
            iblock: 0,
        };
        let before = blocks_in_use(&img);
        grow(&mut img, &mut node, 3 * BSIZE as u32).unwrap();
        node.size = 3 * BSIZE as u32;
        trunc(&mut img, &mut node);
        assert_eq!(node.iblock, 0);
        assert_eq!(blocks_in_use(&img), before);
        assert!(matches!(bmap(&img, &node, 1), Err(Error::Corrupt)));
    }

    #[test]
    fn bmap_maps_the_primary_block() {
        let (_file, mut img) = open_temp();
        let node = Dinode {
            mode: 0o100644,
            size: 0,
            block: img.alloc_block().unwrap(),
            iblock: 0,
        };
        assert_eq!(bmap(&img, &node, 0).unwrap(), node.block);
    }
}
