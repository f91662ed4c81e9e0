//! ## VFAT long file names
//!
//! A long file name is stored as a run of 32-byte records that immediately precede the
//! short (8.3) entry they belong to.  Each record carries 13 UTF-16 code units, a sequence
//! number, and a checksum of the short name.  The record with the highest sequence number
//! comes first on disk and has bit 6 of its sequence byte set.
//!
//! Functions here are pure transformations, nothing touches the disk image.

use std::io::Cursor;
use binrw::{BinRead,BinWrite};
use log::{debug,trace};
use crate::DYNERR;

/// attribute byte that identifies a long name record
pub const LFN_ATTR: u8 = 0x0f;
/// sequence flag marking the record that appears first on disk
pub const LAST_LFN_FLAG: u8 = 0x40;
/// code units carried by one record
pub const UNITS_PER_ENTRY: usize = 13;
/// maximum length of a long name in code units
pub const MAX_LONG_NAME: usize = 255;
const SEQ_MASK: u8 = 0x1f;
const TERMINATOR: u16 = 0x0000;
const FILL: u16 = 0xffff;
/// characters allowed in a short name besides ASCII letters and digits
const SHORT_NAME_SPECIALS: &str = "!#$%&'()-@^_`{}~";
/// characters forbidden in a long name, control characters are also forbidden
const LONG_NAME_INVALID: &str = "\"*/:<>?\\|";

#[derive(thiserror::Error,Debug,PartialEq)]
pub enum Error {
    #[error("long name checksum mismatch")]
    ChecksumMismatch,
    #[error("long name sequence is malformed")]
    MalformedSequence,
    #[error("invalid long name")]
    InvalidLongName
}

/// One 32-byte long name record
#[derive(BinRead,BinWrite,Clone,Debug,PartialEq)]
#[brw(little)]
pub struct LfnEntry {
    pub ord: u8,
    pub name1: [u16;5],
    /// always 0x0f
    pub attr: u8,
    /// always 0
    pub typ: u8,
    pub checksum: u8,
    pub name2: [u16;6],
    /// always 0
    pub cluster: u16,
    pub name3: [u16;2]
}

impl LfnEntry {
    fn create(ord: u8,checksum: u8,units: &[u16]) -> Self {
        let mut ans = Self {
            ord,
            name1: [0;5],
            attr: LFN_ATTR,
            typ: 0,
            checksum,
            name2: [0;6],
            cluster: 0,
            name3: [0;2]
        };
        ans.name1.copy_from_slice(&units[0..5]);
        ans.name2.copy_from_slice(&units[5..11]);
        ans.name3.copy_from_slice(&units[11..13]);
        ans
    }
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        Ok(Self::read(&mut Cursor::new(buf))?)
    }
    pub fn to_bytes(&self) -> Result<[u8;32],DYNERR> {
        let mut curs = Cursor::new(Vec::new());
        self.write(&mut curs)?;
        let mut ans = [0;32];
        ans.copy_from_slice(&curs.into_inner());
        Ok(ans)
    }
    /// 1-based sequence number with the flag removed
    pub fn seq(&self) -> usize {
        (self.ord & SEQ_MASK) as usize
    }
    pub fn is_last(&self) -> bool {
        self.ord & LAST_LFN_FLAG > 0
    }
    /// all 13 code units, including any terminator and fill
    pub fn units(&self) -> Vec<u16> {
        [self.name1.to_vec(),self.name2.to_vec(),self.name3.to_vec()].concat()
    }
    /// text carried by this record alone, stopping at the terminator
    pub fn text(&self) -> String {
        let units: Vec<u16> = self.units().into_iter().take_while(|u| *u!=TERMINATOR && *u!=FILL).collect();
        String::from_utf16_lossy(&units)
    }
}

/// Checksum of the 11-byte short name, stamped into every record of the long name.
pub fn checksum(short: &[u8;11]) -> u8 {
    let mut sum: u8 = 0;
    for b in short {
        sum = ((sum >> 1) | (sum << 7)).wrapping_add(*b);
    }
    sum
}

/// How many records are needed to hold `name`.
pub fn entries_needed(name: &str) -> usize {
    let len = name.encode_utf16().count();
    (len + UNITS_PER_ENTRY - 1) / UNITS_PER_ENTRY
}

pub fn is_long_name_valid(name: &str) -> bool {
    let len = name.encode_utf16().count();
    if len==0 || len > MAX_LONG_NAME {
        debug!("long name length {} out of range",len);
        return false;
    }
    if name.trim_end_matches(&[' ','.'][..]).is_empty() {
        debug!("long name is only dots and spaces");
        return false;
    }
    if name.chars().any(|c| c.is_control() || LONG_NAME_INVALID.contains(c)) {
        debug!("bad character in long name {}",name);
        return false;
    }
    true
}

/// Encode a long name as records in disk order, i.e., highest sequence first.
/// The checksum is computed from `short`, which must be the final short name.
pub fn encode_long_name(name: &str,short: &[u8;11]) -> Result<Vec<LfnEntry>,Error> {
    if !is_long_name_valid(name) {
        return Err(Error::InvalidLongName);
    }
    let mut units: Vec<u16> = name.encode_utf16().collect();
    let count = entries_needed(name);
    if units.len() < count*UNITS_PER_ENTRY {
        units.push(TERMINATOR);
        units.resize(count*UNITS_PER_ENTRY,FILL);
    }
    let sum = checksum(short);
    let mut ans = Vec::new();
    for i in (0..count).rev() {
        let mut ord = (i+1) as u8;
        if i+1==count {
            ord |= LAST_LFN_FLAG;
        }
        ans.push(LfnEntry::create(ord,sum,&units[i*UNITS_PER_ENTRY..(i+1)*UNITS_PER_ENTRY]));
    }
    trace!("encoded {} in {} records, checksum {:02X}",name,count,sum);
    Ok(ans)
}

/// Decode records given in disk order.  The sequence numbers must count down to 1
/// starting from a record that is flagged last, and every checksum must match `short`.
pub fn decode_long_name(records: &[LfnEntry],short: &[u8;11]) -> Result<String,Error> {
    let first = match records.first() {
        Some(r) => r,
        None => return Err(Error::MalformedSequence)
    };
    if !first.is_last() || first.seq()!=records.len() {
        debug!("long name run has {} records, first sequence byte {:02X}",records.len(),first.ord);
        return Err(Error::MalformedSequence);
    }
    for (i,rec) in records.iter().enumerate() {
        if rec.seq()!=records.len()-i || rec.attr!=LFN_ATTR || (i>0 && rec.is_last()) {
            debug!("sequence break at record {}",i);
            return Err(Error::MalformedSequence);
        }
    }
    let sum = checksum(short);
    if records.iter().any(|r| r.checksum!=sum) {
        debug!("long name checksum {:02X} expected {:02X}",first.checksum,sum);
        return Err(Error::ChecksumMismatch);
    }
    let units: Vec<u16> = records.iter().rev()
        .flat_map(|r| r.units())
        .take_while(|u| *u!=TERMINATOR)
        .collect();
    match String::from_utf16(&units) {
        Ok(s) if s.len()>0 => Ok(s),
        _ => Err(Error::InvalidLongName)
    }
}

fn is_short_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SHORT_NAME_SPECIALS.contains(c)
}

/// Reduce a name to (base,extension) using only characters allowed in a short name.
/// The extension follows the last dot, unless that dot leads the name.
/// Neither part is truncated here.
pub fn sanitize(name: &str) -> (String,String) {
    let (base,ext) = match name.rfind('.') {
        Some(idx) if idx>0 => (&name[0..idx],&name[idx+1..]),
        _ => (name,"")
    };
    let clean = |s: &str| -> String {
        s.to_uppercase().chars().filter(|c| is_short_char(*c)).collect()
    };
    (clean(base),clean(ext))
}

/// Test whether `name` fits in 8.3 without losing anything but case.
pub fn is_valid_83(name: &str) -> bool {
    let (base,ext) = match name.rfind('.') {
        Some(idx) if idx>0 => (&name[0..idx],&name[idx+1..]),
        _ => (name,"")
    };
    base.len()>=1 && base.len()<=8 && ext.len()<=3 &&
        base.chars().all(is_short_char) && ext.chars().all(is_short_char)
}

/// Display form of an 11-byte short name, such as `README.TXT` or `DIR`.
pub fn short_name_to_string(short: &[u8;11]) -> String {
    let base = crate::escaped_ascii_from_bytes(&short[0..8],true);
    let ext = crate::escaped_ascii_from_bytes(&short[8..11],true);
    let base = base.trim_end();
    let ext = ext.trim_end();
    match ext.len() {
        0 => base.to_string(),
        _ => [base,".",ext].concat()
    }
}

/// A long name is needed whenever the short name does not reproduce `name` exactly.
pub fn needs_long_name(name: &str,short: &[u8;11]) -> bool {
    name!=short_name_to_string(short)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn checksum_known() {
        assert_eq!(checksum(b"MY_FAV~1MID"),0x54);
        assert_eq!(checksum(b"README  TXT"),0x73);
    }

    #[test]
    fn padding() {
        let recs = encode_long_name("My_Favorite_Song.mid",b"MY_FAV~1MID").expect("encode failed");
        assert_eq!(recs.len(),2);
        assert_eq!(recs[0].ord,0x42);
        assert_eq!(recs[1].ord,0x01);
        let tail = recs[0].units();
        // 20 units: 7 in the second record, then terminator and fill
        assert_eq!(tail[7],0x0000);
        assert!(tail[8..].iter().all(|u| *u==0xffff));
        // exact multiple of 13 has no terminator
        let recs = encode_long_name("abcdefghijklm",b"ABCDEF~1   ").expect("encode failed");
        assert_eq!(recs.len(),1);
        assert_eq!(recs[0].units()[12],'m' as u16);
    }

    #[test]
    fn binary_layout() {
        let recs = encode_long_name("a.b",b"A       B  ").expect("encode failed");
        let buf = recs[0].to_bytes().expect("serialize failed");
        assert_eq!(buf[0],0x41);
        assert_eq!(buf[1..3],[b'a',0]);
        assert_eq!(buf[11],0x0f);
        assert_eq!(buf[12],0);
        assert_eq!(buf[13],checksum(b"A       B  "));
        assert_eq!(buf[26..28],[0,0]);
        assert_eq!(LfnEntry::from_bytes(&buf).expect("parse failed"),recs[0]);
    }

    #[test]
    fn decode_errors() {
        let short = *b"LONGNA~1TXT";
        let recs = encode_long_name("a long name that needs three.txt",&short).expect("encode failed");
        assert_eq!(recs.len(),3);
        assert_eq!(decode_long_name(&recs,&short),Ok("a long name that needs three.txt".to_string()));
        assert_eq!(decode_long_name(&recs,b"LONGNA~2TXT"),Err(Error::ChecksumMismatch));
        assert_eq!(decode_long_name(&recs[1..],&short),Err(Error::MalformedSequence));
        let gap = vec![recs[0].clone(),recs[2].clone()];
        assert_eq!(decode_long_name(&gap,&short),Err(Error::MalformedSequence));
        assert_eq!(decode_long_name(&[],&short),Err(Error::MalformedSequence));
    }

    #[test]
    fn sanitizing() {
        assert_eq!(sanitize("My_Favorite_Song.mid"),("MY_FAVORITE_SONG".to_string(),"MID".to_string()));
        assert_eq!(sanitize(".profile"),("PROFILE".to_string(),"".to_string()));
        assert_eq!(sanitize("a b+c.tar.gz"),("ABCTAR".to_string(),"GZ".to_string()));
        assert!(is_valid_83("readme.txt"));
        assert!(is_valid_83("A"));
        assert!(!is_valid_83("a b.txt"));
        assert!(!is_valid_83("toolongname.txt"));
        assert!(!is_valid_83("x.html"));
        assert!(!is_valid_83(".x"));
        assert!(!is_long_name_valid("a:b"));
        assert!(!is_long_name_valid(""));
        assert!(!is_long_name_valid(" . "));
        assert!(is_long_name_valid("résumé 2024.doc"));
    }

    #[test]
    fn display_short() {
        assert_eq!(short_name_to_string(b"README  TXT"),"README.TXT");
        assert_eq!(short_name_to_string(b"SUBDIR     "),"SUBDIR");
        assert!(needs_long_name("readme.txt",b"README  TXT"));
        assert!(!needs_long_name("README.TXT",b"README  TXT"));
    }
}
