//! # Disk Image module
//!
//! A FAT12 floppy image is a plain sequential dump of the logical sectors,
//! starting with the boot sector.  There is no container or header.
//! The `store` module owns the bytes, this module supplies the image level
//! errors and the table of supported capacities.

pub mod store;

use std::fmt;
use std::str::FromStr;

/// Enumerates image errors.  The `Display` trait will print equivalent long message.
#[derive(thiserror::Error,Debug,PartialEq)]
pub enum Error {
    #[error("offset or length out of range")]
    OutOfRange,
    #[error("image size did not match the request")]
    ImageSizeMismatch,
    #[error("unknown disk capacity")]
    UnknownPreset
}

/// Standard floppy capacities.  Each one maps to a literal BPB table in `crate::bios::bpb`.
#[derive(Clone,Copy,PartialEq,Eq,Debug,Hash)]
pub enum Preset {
    /// 5.25 inch double density
    D525_360,
    /// 3.5 inch double density
    D35_720,
    /// 5.25 inch high density
    D525_1200,
    /// 3.5 inch high density
    D35_1440,
    /// 3.5 inch Microsoft distribution media format
    D35_1680,
    /// 3.5 inch extra high density
    D35_2880
}

impl Preset {
    pub fn all() -> [Preset;6] {
        [Self::D525_360,Self::D35_720,Self::D525_1200,Self::D35_1440,Self::D35_1680,Self::D35_2880]
    }
    /// Size of the image in bytes
    pub fn byte_capacity(&self) -> usize {
        match self {
            Self::D525_360 => 720*512,
            Self::D35_720 => 1440*512,
            Self::D525_1200 => 2400*512,
            Self::D35_1440 => 2880*512,
            Self::D35_1680 => 3360*512,
            Self::D35_2880 => 5760*512
        }
    }
    /// Name used on the command line
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::D525_360 => "5.25in-360k",
            Self::D35_720 => "3.5in-720k",
            Self::D525_1200 => "5.25in-1200k",
            Self::D35_1440 => "3.5in-1440k",
            Self::D35_1680 => "3.5in-1680k-dmf",
            Self::D35_2880 => "3.5in-2880k"
        }
    }
    pub fn description(&self) -> &'static str {
        match self {
            Self::D525_360 => "5.25\" Double Density (360 KB)",
            Self::D35_720 => "3.5\" Double Density (720 KB)",
            Self::D525_1200 => "5.25\" High Density (1.2 MB)",
            Self::D35_1440 => "3.5\" High Density (1.44 MB)",
            Self::D35_1680 => "3.5\" DMF (1.68 MB)",
            Self::D35_2880 => "3.5\" Extra High Density (2.88 MB)"
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::D525_360 => write!(f,"360K"),
            Self::D35_720 => write!(f,"720K"),
            Self::D525_1200 => write!(f,"1.2M"),
            Self::D35_1440 => write!(f,"1.44M"),
            Self::D35_1680 => write!(f,"1.68M"),
            Self::D35_2880 => write!(f,"2.88M")
        }
    }
}

impl FromStr for Preset {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.trim_end_matches('b') {
            "5.25in-360k" | "360k" => Ok(Self::D525_360),
            "3.5in-720k" | "720k" => Ok(Self::D35_720),
            "5.25in-1200k" | "1200k" | "1.2m" => Ok(Self::D525_1200),
            "3.5in-1440k" | "1440k" | "1.44m" => Ok(Self::D35_1440),
            "3.5in-1680k-dmf" | "1680k" | "1.68m" | "dmf" => Ok(Self::D35_1680),
            "3.5in-2880k" | "2880k" | "2.88m" => Ok(Self::D35_2880),
            _ => Err(Error::UnknownPreset)
        }
    }
}

#[test]
fn test_preset_names() {
    for p in Preset::all() {
        assert_eq!(Preset::from_str(p.cli_name()),Ok(p));
        assert_eq!(Preset::from_str(&p.to_string()),Ok(p));
    }
    assert_eq!(Preset::from_str("1.44MB"),Ok(Preset::D35_1440));
    assert_eq!(Preset::from_str("DMF"),Ok(Preset::D35_1680));
    assert_eq!(Preset::from_str("1.3M"),Err(Error::UnknownPreset));
}
