//! # File System Module
//!
//! File system modules handle interactions with directories and files.
//!
//! The FAT file system is represented by `fat::Disk`, which takes ownership of a
//! `SectorStore` and uses it as storage.  The VFAT long name codec lives in `vfat`;
//! it is a pure transformation with no access to the image.
//!
//! Paths are always absolute and use forward slashes, e.g. `/SUBDIR/My Long Name.txt`.
//! Any path component may be given as either the long name or the short name, without
//! regard to case.

pub mod vfat;
pub mod fat;

pub use fat::Disk;
