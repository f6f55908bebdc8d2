//! Directories.
//!
//! A directory is an inode whose single data block holds a fixed-size
//! table of entries; directories are never grown. The path resolver
//! lives here too: it walks entry tables from the root, one component
//! at a time.

use std::mem;

use log::debug;
use static_assertions::const_assert;
use zerocopy::{AsBytes, FromBytes, LayoutVerified};

use crate::error::{Error, Result};
use crate::image::Image;
use crate::inode::{self, Dinode, S_IFDIR};
use crate::layout::{BSIZE, ROOTINO};
use crate::path::{FileName, Path};

/// Longest entry name, in bytes.
pub const DIRSIZ: usize = 15;

/// Entries per directory block.
pub const DIRENT_COUNT: usize = BSIZE / mem::size_of::<Dirent>();

/// One directory entry: a NUL-terminated name and an inode number. A
/// free slot has an empty name.
#[repr(C)]
#[derive(Clone, Copy, Default, AsBytes, FromBytes)]
pub struct Dirent {
    name: [u8; DIRSIZ + 1],
    inum: u32,
    _pad: [u8; 12],
}

const_assert!(mem::size_of::<Dirent>() == 32);
const_assert!(DIRENT_COUNT * mem::size_of::<Dirent>() == BSIZE);

impl Dirent {
    fn is_free(&self) -> bool {
        self.name[0] == 0
    }

    /// Fill in name. Shorter names get NUL padding appended.
    ///
    /// `name` must be at most `DIRSIZ` bytes.
    fn set_name(&mut self, name: &FileName) {
        let name = name.as_bytes();
        debug_assert!(name.len() <= DIRSIZ);
        self.name = [0; DIRSIZ + 1];
        self.name[..name.len()].copy_from_slice(name);
    }

    /// Slice exactly containing the stored name.
    fn name(&self) -> &FileName {
        let len = self
            .name
            .iter()
            .position(|ch| *ch == 0)
            .unwrap_or(self.name.len());
        FileName::new(&self.name[..len])
    }
}

fn entries<'a>(img: &'a Image, dir: &Dinode) -> &'a [Dirent] {
    LayoutVerified::<_, [Dirent]>::new_slice(&img.block(dir.block as usize)[..])
        .expect("directory block alignment")
        .into_slice()
}

fn entries_mut<'a>(img: &'a mut Image, dir: &Dinode) -> &'a mut [Dirent] {
    LayoutVerified::<_, [Dirent]>::new_slice(&mut img.block_mut(dir.block as usize)[..])
        .expect("directory block alignment")
        .into_mut_slice()
}

/// Create the root directory on a fresh image: inode 1, holding a
/// single `"."` entry that points back at itself.
pub fn init_root(img: &mut Image) -> Result<()> {
    if img.inode_bitmap().get(ROOTINO as usize) {
        return Ok(());
    }
    let inum = inode::alloc(img)?;
    assert_eq!(inum, ROOTINO, "root must be the first inode");
    let root = Dinode {
        mode: S_IFDIR | 0o755,
        size: 0,
        block: img.alloc_block()?,
        iblock: 0,
    };
    inode::put(img, inum, &root);
    put(img, &root, FileName::new(b"."), inum)?;
    debug!("initialized root directory");
    Ok(())
}

/// Look a name up in a directory, returning the entry's inode number.
pub fn lookup(img: &Image, dir: &Dinode, name: &FileName) -> Result<u32> {
    if !dir.is_dir() {
        return Err(Error::NotADirectory);
    }
    entries(img, dir)
        .iter()
        .find(|e| e.inum != 0 && e.name() == name)
        .map(|e| e.inum)
        .ok_or(Error::NotFound)
}

/// Link `name` to `inum` in the first free slot of the directory.
/// Rejects a name already present.
pub fn put(img: &mut Image, dir: &Dinode, name: &FileName, inum: u32) -> Result<()> {
    match lookup(img, dir, name) {
        Ok(_) => return Err(Error::AlreadyExists),
        Err(Error::NotFound) => {}
        Err(err) => return Err(err),
    }
    let slot = entries_mut(img, dir)
        .iter_mut()
        .find(|e| e.is_free())
        .ok_or(Error::NoSpace)?;
    slot.inum = inum;
    slot.set_name(name);
    Ok(())
}

/// Zero the first entry referring to `inum`. The inode itself is left
/// alone.
pub fn unlink(img: &mut Image, dir: &Dinode, inum: u32) -> Result<()> {
    let slot = entries_mut(img, dir)
        .iter_mut()
        .find(|e| e.inum == inum)
        .ok_or(Error::NotFound)?;
    *slot = Dirent::default();
    Ok(())
}

/// Remove `name` from the directory and free its inode, recursively
/// for directories.
pub fn delete(img: &mut Image, dir: &Dinode, name: &FileName) -> Result<()> {
    let inum = lookup(img, dir, name)?;
    inode::free(img, inum);
    unlink(img, dir, inum)
}

/// Names of the live entries, in slot order.
pub fn list(img: &Image, dir: &Dinode) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(Error::NotADirectory);
    }
    Ok(entries(img, dir)
        .iter()
        .filter(|e| !e.is_free())
        .map(|e| String::from_utf8_lossy(e.name().as_bytes()).into_owned())
        .collect())
}

/// Inode numbers of the live entries, in slot order.
pub fn live_inums(img: &Image, dir: &Dinode) -> Vec<u32> {
    entries(img, dir)
        .iter()
        .filter(|e| !e.is_free())
        .map(|e| e.inum)
        .collect()
}

/// Resolve an absolute path to an inode number.
pub fn resolve(img: &Image, path: &Path) -> Result<u32> {
    namex(img, path, false).map(|(inum, _)| inum)
}

/// Resolve the parent directory of `path`, returning its inode number
/// and the final name component. The parent of a root-level name is
/// the root itself; `"/"` has no parent.
pub fn resolve_parent<'p>(img: &Image, path: &'p Path) -> Result<(u32, &'p FileName)> {
    let (inum, name) = namex(img, path, true)?;
    Ok((inum, name.expect("parent resolution yields a name")))
}

fn namex<'p>(img: &Image, mut path: &'p Path, parent: bool) -> Result<(u32, Option<&'p FileName>)> {
    if !path.is_absolute() {
        return Err(Error::NotFound);
    }
    let mut inum = ROOTINO;
    while let Some((rest, name)) = path.skipelem() {
        path = rest;
        let node = inode::get(img, inum);
        if !node.is_dir() {
            return Err(Error::NotADirectory);
        }
        if parent && path.is_empty() {
            // Stop one level early.
            return Ok((inum, Some(name)));
        }
        inum = lookup(img, &node, name)?;
    }
    if parent {
        return Err(Error::NotFound);
    }
    Ok((inum, None))
}
