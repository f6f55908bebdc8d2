//! The storage facade: path-addressed operations over one open image.

use std::cmp;

use crate::dir;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::inode::{self, Dinode};
use crate::layout::{BSIZE, MAXFILE};
use crate::path::{FileName, Path};
use crate::stat::Stat;

/// The engine handle: one open image, one operation in flight at a
/// time. Successive calls resolve their paths independently; there is
/// no per-open-file state.
pub struct Storage {
    img: Image,
}

impl Storage {
    /// Open the image at `path`, creating it zero-filled if missing,
    /// and ensure the root directory exists.
    pub fn init<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let mut img = Image::open(path.as_ref())?;
        dir::init_root(&mut img)?;
        Ok(Self { img })
    }

    /// Succeeds iff `path` resolves to a live inode.
    pub fn find(&self, path: &str) -> Result<()> {
        dir::resolve(&self.img, Path::new(path)).map(|_| ())
    }

    pub fn stat(&self, path: &str) -> Result<Stat> {
        let inum = dir::resolve(&self.img, Path::new(path))?;
        let node = inode::get(&self.img, inum);
        Ok(Stat {
            ino: inum,
            mode: node.mode,
            size: node.size,
        })
    }

    /// Read up to `buf.len()` bytes at `offset`, clamped at end of
    /// file. Returns the number of bytes read.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let inum = dir::resolve(&self.img, Path::new(path))?;
        let node = inode::get(&self.img, inum);
        if node.is_dir() {
            return Err(Error::IsADirectory);
        }
        if offset >= node.size as u64 {
            return Ok(0);
        }
        let n = cmp::min(buf.len() as u64, node.size as u64 - offset) as usize;
        let mut off = offset as usize;
        let mut tot = 0;
        while tot < n {
            let bnum = inode::bmap(&self.img, &node, off / BSIZE)?;
            let begin = off % BSIZE;
            let m = cmp::min(n - tot, BSIZE - begin);
            buf[tot..tot + m].copy_from_slice(&self.img.block(bnum as usize)[begin..begin + m]);
            tot += m;
            off += m;
        }
        Ok(tot)
    }

    /// Write `buf` at `offset`, growing the file as needed. The size
    /// becomes `max(old_size, offset + buf.len())`; a gap below
    /// `offset` reads back as zeroes.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize> {
        let inum = dir::resolve(&self.img, Path::new(path))?;
        let mut node = inode::get(&self.img, inum);
        if node.is_dir() {
            return Err(Error::IsADirectory);
        }
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= (MAXFILE * BSIZE) as u64)
            .ok_or(Error::NoSpace)?;
        if let Err(err) = inode::grow(&mut self.img, &mut node, end as u32) {
            // Keep whatever the partial growth mapped reachable.
            inode::put(&mut self.img, inum, &node);
            return Err(err);
        }
        let mut off = offset as usize;
        let mut tot = 0;
        while tot < buf.len() {
            let bnum = inode::bmap(&self.img, &node, off / BSIZE)?;
            let begin = off % BSIZE;
            let m = cmp::min(buf.len() - tot, BSIZE - begin);
            self.img.block_mut(bnum as usize)[begin..begin + m]
                .copy_from_slice(&buf[tot..tot + m]);
            tot += m;
            off += m;
        }
        node.size = cmp::max(node.size, end as u32);
        // Write the inode back even when the size is unchanged: growth
        // may have set the indirect block.
        inode::put(&mut self.img, inum, &node);
        Ok(tot)
    }

    /// Create a file or directory node at `path`. `mode` is stored
    /// verbatim; the directory bit decides what the node is.
    pub fn mknod(&mut self, path: &str, mode: u32) -> Result<()> {
        let path = Path::new(path);
        let (dinum, name) = dir::resolve_parent(&self.img, path)?;
        check_name(name)?;
        let parent = inode::get(&self.img, dinum);

        let block = self.img.alloc_block()?;
        let inum = match inode::alloc(&mut self.img) {
            Ok(inum) => inum,
            Err(err) => {
                self.img.free_block(block);
                return Err(err);
            }
        };
        let node = Dinode {
            mode,
            size: 0,
            block,
            iblock: 0,
        };
        inode::put(&mut self.img, inum, &node);
        if let Err(err) = dir::put(&mut self.img, &parent, name, inum) {
            inode::free(&mut self.img, inum);
            return Err(err);
        }
        Ok(())
    }

    /// Remove `path` from its parent directory and free its inode,
    /// recursively for directories.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let path = Path::new(path);
        let (dinum, name) = dir::resolve_parent(&self.img, path)?;
        let parent = inode::get(&self.img, dinum);
        dir::delete(&mut self.img, &parent, name)
    }

    /// Move the entry for `from` to `to`, keeping its inode number and
    /// content. Fails if `to` already exists.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let from = Path::new(from);
        let to = Path::new(to);
        let inum = dir::resolve(&self.img, from)?;
        let (from_dinum, from_name) = dir::resolve_parent(&self.img, from)?;
        let (to_dinum, to_name) = dir::resolve_parent(&self.img, to)?;
        check_name(to_name)?;
        let to_parent = inode::get(&self.img, to_dinum);
        match dir::lookup(&self.img, &to_parent, to_name) {
            Ok(_) => return Err(Error::AlreadyExists),
            Err(Error::NotFound) => {}
            Err(err) => return Err(err),
        }

        // Unlink before relinking; the inode itself is untouched, so
        // the content survives the move.
        let from_parent = inode::get(&self.img, from_dinum);
        dir::unlink(&mut self.img, &from_parent, inum)?;
        if let Err(err) = dir::put(&mut self.img, &to_parent, to_name, inum) {
            // The source slot is still free; put the entry back.
            let _ = dir::put(&mut self.img, &from_parent, from_name, inum);
            return Err(err);
        }
        Ok(())
    }

    /// Replace the mode field verbatim.
    pub fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let inum = dir::resolve(&self.img, Path::new(path))?;
        let mut node = inode::get(&self.img, inum);
        node.mode = mode;
        inode::put(&mut self.img, inum, &node);
        Ok(())
    }

    /// Release every block of `path` except its primary one. The size
    /// field is left as it was.
    pub fn truncate(&mut self, path: &str) -> Result<()> {
        let inum = dir::resolve(&self.img, Path::new(path))?;
        let mut node = inode::get(&self.img, inum);
        if node.is_dir() {
            return Err(Error::IsADirectory);
        }
        inode::trunc(&mut self.img, &mut node);
        inode::put(&mut self.img, inum, &node);
        Ok(())
    }

    /// Names in the directory at `path`, in slot order.
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        let inum = dir::resolve(&self.img, Path::new(path))?;
        let node = inode::get(&self.img, inum);
        dir::list(&self.img, &node)
    }

    /// Flush the in-memory image to the backing file. Teardown also
    /// syncs, best-effort.
    pub fn sync(&mut self) -> Result<()> {
        self.img.sync()?;
        Ok(())
    }
}

fn check_name(name: &FileName) -> Result<()> {
    if name.len() > dir::DIRSIZ {
        return Err(Error::NameTooLong);
    }
    Ok(())
}
