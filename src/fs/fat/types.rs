use std::fmt;
use std::str::FromStr;

/// Enumerates FAT file system errors.  The `Display` trait will print the long message.
/// Errors in the volume structures (disk full, corrupt chains) are in `crate::bios::Error`.
#[derive(thiserror::Error,Debug,PartialEq)]
pub enum Error {
    #[error("no room in root directory, use a subdirectory")]
    RootDirectoryFull,
    #[error("all short name variants are taken")]
    NameCollision,
    #[error("file not found")]
    FileNotFound,
    #[error("duplicate file name")]
    DuplicateFile,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("syntax")]
    Syntax,
    #[error("cannot move directory into itself")]
    InvalidMove
}

/// Pointer to a slot in a directory, keeps slot indices apart from cluster numbers.
#[derive(PartialEq,Eq,Copy,Clone,Debug,PartialOrd,Ord)]
pub enum Ptr {
    /// Index ordering a slot's appearance in the directory
    Entry(usize)
}

impl Ptr {
    /// These pointers are just counts, extract the integer.
    pub fn unwrap(&self) -> usize {
        match self {
            Self::Entry(i) => *i
        }
    }
}

bitflags::bitflags! {
    /// Attribute byte of a short directory entry
    #[derive(Clone,Copy,Debug,PartialEq,Eq)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
    }
}

/// All four low bits set marks a long name record
pub const LONG_NAME: u8 = 0x0f;

/// How short names are derived when a name does not fit 8.3 as is
#[derive(Clone,Copy,Debug,PartialEq,Eq,Default)]
pub enum TailPolicy {
    /// 6 characters followed by `~N`, widening the tail as N grows
    #[default]
    Windows,
    /// truncate to 8 characters, use a tail only if truncation collides
    Plain
}

impl fmt::Display for TailPolicy {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f,"windows"),
            Self::Plain => write!(f,"plain")
        }
    }
}

impl FromStr for TailPolicy {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" | "numeric" | "tail" => Ok(Self::Windows),
            "plain" | "truncate" | "none" => Ok(Self::Plain),
            _ => Err(Error::Syntax)
        }
    }
}
