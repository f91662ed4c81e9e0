//! ### FAT Packing Module
//!
//! Functions to help pack or unpack dates and short file names.

use chrono::{Timelike,Datelike};
use log::warn;

pub const DOT: [u8;11] = *b".          ";
pub const DOTDOT: [u8;11] = *b"..         ";
/// first name byte of a deleted slot
pub const DELETED: u8 = 0xe5;
/// stands in for a leading 0xe5 that is really part of the name
pub const E5_ESCAPE: u8 = 0x05;

fn resolve(time: Option<chrono::NaiveDateTime>) -> chrono::NaiveDateTime {
    match time {
        Some(t) => t,
        None => chrono::Local::now().naive_local()
    }
}

/// pack the date into the FAT format, if the year is not between 1980
/// and 2107 it will be pegged to the nearest representable date.
pub fn pack_date(time: Option<chrono::NaiveDateTime>) -> u16 {
    let now = resolve(time);
    let year = match now.year() {
        y if y < 1980 => {
            warn!("date prior to reference date, pegging to reference date");
            1980
        },
        y if y > 2107 => {
            warn!("date is pegged to maximum of 2107");
            2107
        },
        y => y
    };
    now.day() as u16 + ((now.month() as u16) << 5) + ((year as u16 - 1980) << 9)
}

/// pack the time into the FAT format, with 2 second resolution
pub fn pack_time(time: Option<chrono::NaiveDateTime>) -> u16 {
    let now = resolve(time);
    (now.second() as u16) / 2 + ((now.minute() as u16) << 5) + ((now.hour() as u16) << 11)
}

/// the part of the creation time that `pack_time` cannot hold, in units of 10 ms
pub fn pack_tenths(time: Option<chrono::NaiveDateTime>) -> u8 {
    let now = resolve(time);
    (now.and_utc().timestamp_subsec_millis() / 10) as u8 + 100*(now.second() % 2) as u8
}

pub fn unpack_date(fat_date: u16) -> Option<chrono::NaiveDate> {
    if fat_date==0 {
        return None;
    }
    let year = 1980 + (fat_date >> 9) as i32;
    let month = ((fat_date & 0b0000_0001_1110_0000) >> 5) as u32;
    let day = (fat_date & 0b1_1111) as u32;
    chrono::NaiveDate::from_ymd_opt(year, month, day)
}

pub fn unpack_time(fat_time: u16,tenths: u8) -> Option<chrono::NaiveTime> {
    let hour = (fat_time >> 11) as u32;
    let min = ((fat_time & 0b0000_0111_1110_0000) >> 5) as u32;
    let sec2 = (fat_time & 0b1_1111) as u32;
    chrono::NaiveTime::from_hms_opt(hour, min, sec2*2 + tenths as u32/100)
}

/// Convert label bytes to an ASCII string.
/// Will not panic, will escape the string if necessary.
pub fn label_to_string(label: [u8;11]) -> String {
    crate::escaped_ascii_from_bytes(&label,true).trim_end().to_string()
}

/// Convert raw name bytes to a string, e.g. `README.TXT`.
/// Dot and DotDot are specially handled, a leading 0x05 is shown as the 0xe5 it stands for.
/// Will not panic, will escape the string if necessary.
pub fn file_name_to_string(name: &[u8;11]) -> String {
    match *name {
        DOT => ".".to_string(),
        DOTDOT => "..".to_string(),
        _ => {
            let mut raw = *name;
            if raw[0]==E5_ESCAPE {
                raw[0] = DELETED;
            }
            crate::fs::vfat::short_name_to_string(&raw)
        }
    }
}

/// Convert string to the 11 raw name bytes for the directory.
/// Dot and DotDot are specially handled.
/// Assumes string contains a valid 8.3 name (case is raised here).
pub fn string_to_file_name(s: &str) -> [u8;11] {
    if s=="." {
        return DOT;
    }
    if s==".." {
        return DOTDOT;
    }
    let upper = s.to_uppercase();
    let (base,ext) = match upper.rfind('.') {
        Some(idx) => (&upper[0..idx],&upper[idx+1..]),
        None => (upper.as_str(),"")
    };
    pad_short_name(base,ext)
}

/// Space-pad (and truncate) base and extension into 11 raw bytes
pub fn pad_short_name(base: &str,ext: &str) -> [u8;11] {
    let mut ans = [0x20;11];
    for (i,b) in base.bytes().take(8).enumerate() {
        ans[i] = b;
    }
    for (i,b) in ext.bytes().take(3).enumerate() {
        ans[8+i] = b;
    }
    if ans[0]==DELETED {
        ans[0] = E5_ESCAPE;
    }
    ans
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn date_time() {
        let t = NaiveDate::from_ymd_opt(2023,10,25).and_then(|d| d.and_hms_opt(10,30,11)).expect("bad date");
        assert_eq!(pack_date(Some(t)),((2023-1980) << 9) | (10 << 5) | 25);
        assert_eq!(pack_time(Some(t)),(10 << 11) | (30 << 5) | 5);
        assert_eq!(pack_tenths(Some(t)),100);
        assert_eq!(unpack_date(pack_date(Some(t))),NaiveDate::from_ymd_opt(2023,10,25));
        assert_eq!(unpack_time(pack_time(Some(t)),100),chrono::NaiveTime::from_hms_opt(10,30,11));
        assert_eq!(unpack_date(0),None);
        let early = NaiveDate::from_ymd_opt(1970,1,1).and_then(|d| d.and_hms_opt(0,0,0)).expect("bad date");
        assert_eq!(pack_date(Some(early)) >> 9,0);
    }

    #[test]
    fn names() {
        assert_eq!(string_to_file_name("readme.txt"),*b"README  TXT");
        assert_eq!(string_to_file_name("subdir"),*b"SUBDIR     ");
        assert_eq!(string_to_file_name(".."),DOTDOT);
        assert_eq!(file_name_to_string(b"README  TXT"),"README.TXT");
        assert_eq!(file_name_to_string(&DOT),".");
        assert_eq!(file_name_to_string(b"\x05BC     TXT"),"\\xE5BC.TXT");
        assert_eq!(label_to_string(*b"MY DISK    "),"MY DISK");
    }
}
