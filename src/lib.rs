//! # `fat12kit` main library
//!
//! This library manipulates FAT12 floppy disk images byte for byte, without mounting them.
//! The images are raw sector dumps such as those used by floppy emulators (Gotek/FlashFloppy)
//! and by the vintage instruments and computers that read them.
//!
//! ## Architecture
//!
//! The layers are arranged leaf first:
//! * `img::store::SectorStore` owns the image buffer and bounds checks every access
//! * `bios::bpb` parses and builds the boot sector, and derives the volume geometry
//! * `bios::fat` holds the 12-bit packed allocation table and the cluster chain algorithms
//! * `fs::vfat` encodes and decodes VFAT long file names
//! * `fs::fat` manages directories and performs the user level operations
//!
//! When a `fs::fat::Disk` is created it takes ownership of a `SectorStore`.
//! Any changes are not permanent until the image is saved to the host file system.
//!
//! ## Capacities
//!
//! Images can be created with any of the standard floppy capacities, see `img::Preset`:
//! * 5.25 inch 360K and 1.2M
//! * 3.5 inch 720K, 1.44M, 1.68M (DMF), and 2.88M

pub mod img;
pub mod bios;
pub mod fs;
pub mod settings;
pub mod commands;

use std::io::Write;
use log::{debug,info};

type DYNERR = Box<dyn std::error::Error>;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Load an image file and impose the FAT12 file system on it.
pub fn open_img(img_path: &str) -> Result<fs::fat::Disk,DYNERR> {
    debug!("opening {}",img_path);
    let data = std::fs::read(img_path)?;
    fs::fat::Disk::from_bytes(&data)
}

/// Create a freshly formatted image in memory.
pub fn create_img(preset: img::Preset) -> Result<fs::fat::Disk,DYNERR> {
    fs::fat::Disk::create(preset)
}

/// Save the image file (make changes permanent).
/// The file handle is scoped to this function, it is closed even if writing fails.
/// If writing fails the disk in memory is untouched and still marked dirty.
pub fn save_img(disk: &mut fs::fat::Disk,img_path: &str) -> STDRESULT {
    {
        let mut file = std::fs::File::create(img_path)?;
        file.write_all(disk.store().as_bytes())?;
        file.flush()?;
        file.sync_all()?;
    }
    disk.mark_clean();
    info!("saved {}",img_path);
    Ok(())
}

/// This takes any bytes and makes an ascii friendly string
/// by using hex escapes, e.g., `\xFF`.
/// if `escape_cc` is true, ascii control characters are also escaped.
/// This is intended for directory strings.
pub fn escaped_ascii_from_bytes(bytes: &[u8],escape_cc: bool) -> String {
    let mut result = String::new();
    let (lb,ub) = match escape_cc {
        true => (0x20,0x7e),
        false => (0x00,0x7f)
    };
    for b in bytes {
        if *b>=lb && *b<=ub {
            result.push(*b as char);
        } else {
            result += &format!("\\x{:02X}",b);
        }
    }
    return result;
}

#[test]
fn test_escapes() {
    assert_eq!(escaped_ascii_from_bytes(b"HELLO   ",true),"HELLO   ");
    assert_eq!(escaped_ascii_from_bytes(&[0x41,0xe5,0x01],true),"A\\xE5\\x01");
    assert_eq!(escaped_ascii_from_bytes(&[0x41,0x01],false),"A\x01");
}
