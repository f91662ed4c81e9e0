//! # BIOS module
//!
//! This module is a place for the structures that sit between the `fs` and `img` modules.
//! It is named in analogy with the CP/M concept of a BIOS as being (in part) a layer between
//! the BDOS and the physical disk.
//!
//! The boot sector (BPB) and the file allocation table are kept in this module.

pub mod bpb;
pub mod fat;

/// Enumerates errors in the volume structures.  The `Display` trait will print the long message.
#[derive(thiserror::Error,Debug,PartialEq)]
pub enum Error {
    #[error("boot sector is not a valid FAT12 BPB")]
    InvalidBootSector,
    #[error("insufficient disk space")]
    DiskFull,
    #[error("cluster chain is broken or loops")]
    CorruptChain,
    #[error("cluster out of range")]
    ClusterRange
}
