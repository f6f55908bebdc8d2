//! The image store: fixed-size blocks over a single file.
//!
//! The whole image is held in memory for the lifetime of the engine.
//! Interface:
//! * To access a block, call `block` / `block_mut`.
//! * Data blocks come from `alloc_block` and go back via `free_block`.
//! * Mutations reach the file on `sync`; teardown syncs best-effort.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, error, trace};

use crate::bitmap::Bitmap;
use crate::error::{Error, Result};
use crate::layout::{BMAP_BLOCK, BSIZE, DATA_START, IMAGE_SIZE, IMAP_BLOCK, NBLOCKS, NINODES};

/// One disk block. The alignment makes it sound to view block contents
/// as `u32` block numbers or 4-byte-aligned records.
#[repr(C, align(4))]
#[derive(Clone, Copy)]
struct Block {
    bytes: [u8; BSIZE],
}

impl Block {
    const fn zeroed() -> Self {
        Self { bytes: [0; BSIZE] }
    }
}

pub struct Image {
    file: File,
    blocks: Box<[Block]>,
}

impl Image {
    /// Open the image at `path`, creating it zero-filled at the fixed
    /// size if missing, and reserve the metadata blocks in the block
    /// bitmap.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        if file.metadata()?.len() != IMAGE_SIZE {
            file.set_len(IMAGE_SIZE)?;
        }
        file.seek(SeekFrom::Start(0))?;

        let mut blocks = vec![Block::zeroed(); NBLOCKS].into_boxed_slice();
        for block in blocks.iter_mut() {
            file.read_exact(&mut block.bytes)?;
        }

        let mut img = Self { file, blocks };
        // The bitmaps and the inode table are never handed out by the
        // allocator.
        for b in 0..DATA_START {
            img.block_bitmap_mut().set(b);
        }
        debug!("opened image {:?}: {} blocks of {} bytes", path, NBLOCKS, BSIZE);
        Ok(img)
    }

    pub fn block(&self, n: usize) -> &[u8; BSIZE] {
        &self.blocks[n].bytes
    }

    pub fn block_mut(&mut self, n: usize) -> &mut [u8; BSIZE] {
        &mut self.blocks[n].bytes
    }

    /// The block-allocation bitmap, one bit per image block.
    pub fn block_bitmap(&self) -> &Bitmap {
        Bitmap::from_bytes(&self.block(BMAP_BLOCK)[..NBLOCKS / 8])
    }

    fn block_bitmap_mut(&mut self) -> &mut Bitmap {
        Bitmap::from_bytes_mut(&mut self.block_mut(BMAP_BLOCK)[..NBLOCKS / 8])
    }

    /// The inode bitmap, one bit per inode-table slot.
    pub fn inode_bitmap(&self) -> &Bitmap {
        Bitmap::from_bytes(&self.block(IMAP_BLOCK)[..NINODES / 8])
    }

    pub fn inode_bitmap_mut(&mut self) -> &mut Bitmap {
        Bitmap::from_bytes_mut(&mut self.block_mut(IMAP_BLOCK)[..NINODES / 8])
    }

    /// Allocate a zeroed data block: the first clear bit of the block
    /// bitmap at or after the start of the data pool.
    pub fn alloc_block(&mut self) -> Result<u32> {
        let b = self
            .block_bitmap()
            .first_clear(DATA_START)
            .ok_or(Error::NoSpace)?;
        self.block_bitmap_mut().set(b);
        self.block_mut(b).fill(0);
        trace!("alloc_block: {}", b);
        Ok(b as u32)
    }

    /// Free data block `n`. Contents are left as-is; a later
    /// `alloc_block` zeroes them.
    pub fn free_block(&mut self, n: u32) {
        let n = n as usize;
        assert!(n >= DATA_START, "free_block: reserved block");
        assert!(self.block_bitmap().get(n), "free_block: freeing free block");
        self.block_bitmap_mut().clear(n);
        trace!("free_block: {}", n);
    }

    /// Write the in-memory image back to the file.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        for block in self.blocks.iter() {
            self.file.write_all(&block.bytes)?;
        }
        self.file.flush()
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        if let Err(err) = self.sync() {
            error!("image sync on teardown failed: {}", err);
        }
    }
}
