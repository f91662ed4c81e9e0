//! ### FAT directory structures
//!
//! This module encapsulates the FAT directory.  The FAT itself is implemented in
//! `crate::bios::fat`.  The BPB is in `crate::bios::bpb`.
//! Long name records are encoded and decoded by `crate::fs::vfat`, here we only
//! decide where they go.

use std::io::Cursor;
use binrw::{BinRead,BinWrite};
use chrono::{NaiveDate,NaiveTime};
use log::{debug,warn,trace};
use super::types::*;
use super::pack;
use crate::fs::vfat;
use crate::{STDRESULT,DYNERR};

/// Size of the directory entry in bytes, always 32
pub const DIR_ENTRY_SIZE: usize = 32;
/// first name byte for a free entry, also indicating no more entries to follow.
const FREE_AND_NO_MORE: u8 = 0x00;

/// Convenient collection of information about a file or subdirectory.
/// This is an element of the list produced by `Directory::build_files`.
#[derive(Clone,Debug)]
pub struct FileInfo {
    /// slot of the short entry
    pub idx: usize,
    /// first slot of the long name records that precede the short entry
    pub lfn_idx: Option<usize>,
    pub short_name: [u8;11],
    /// long name if there is a valid one, otherwise the short name
    pub name: String,
    pub long_name: Option<String>,
    pub attributes: Attributes,
    pub create_date: Option<NaiveDate>,
    pub create_time: Option<NaiveTime>,
    pub write_date: Option<NaiveDate>,
    pub write_time: Option<NaiveTime>,
    pub access_date: Option<NaiveDate>,
    pub eof: usize,
    pub cluster1: usize
}

#[derive(PartialEq,Debug)]
pub enum EntryType {
    Free,
    FreeAndNoMore,
    File,
    Directory,
    VolumeLabel,
    LongName
}

/// Classification of a raw slot for the directory viewer
#[derive(Clone,Debug,PartialEq)]
pub enum RawSlot {
    End,
    Deleted,
    LongName { seq: usize, last: bool, checksum: u8, text: String },
    Short { name: String, attributes: Attributes, cluster: usize, size: usize }
}

#[derive(BinRead,BinWrite,Clone,Debug,PartialEq)]
#[brw(little)]
pub struct Entry {
    name: [u8;11],
    /// RO=1,hidden=2,sys=4,vol=8,dir=16,archive=32,long_name=15.
    /// If this is the volume label, cluster1=0.
    /// If this is a directory, file_size=0.
    attr: u8,
    nt_res: u8,
    /// units of 10 ms, 0-199
    creation_tenth: u8,
    /// to the nearest 2 secs
    creation_time: u16,
    creation_date: u16,
    access_date: u16,
    /// always 0 for FAT12
    cluster1_high: u16,
    /// set at creation time also
    write_time: u16,
    /// set at creation date also
    write_date: u16,
    cluster1_low: u16,
    file_size: u32
}

/// Directory is merely a packed sequence of entries.
pub struct Directory {
    entries: Vec<[u8;DIR_ENTRY_SIZE]>
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }
    pub fn is_dot(&self) -> bool {
        self.short_name==pack::DOT || self.short_name==pack::DOTDOT
    }
    pub fn short_string(&self) -> String {
        pack::file_name_to_string(&self.short_name)
    }
    /// all slots belonging to this file, long name records first
    pub fn slots(&self) -> std::ops::RangeInclusive<usize> {
        self.lfn_idx.unwrap_or(self.idx)..=self.idx
    }
    /// match either the long or short name, ignoring case
    pub fn matches(&self,name: &str) -> bool {
        let upper = name.to_uppercase();
        if self.short_string().to_uppercase()==upper {
            return true;
        }
        match &self.long_name {
            Some(long) => long.to_uppercase()==upper,
            None => false
        }
    }
}

impl Entry {
    /// Create an entry with given raw name, attributes, and timestamp (time==None means use current time).
    pub fn create(name: [u8;11],attributes: Attributes,time: Option<chrono::NaiveDateTime>) -> Self {
        let now = match time {
            Some(t) => t,
            None => chrono::Local::now().naive_local()
        };
        let tenths = pack::pack_tenths(Some(now));
        let time = pack::pack_time(Some(now));
        let date = pack::pack_date(Some(now));
        Self {
            name,
            attr: attributes.bits(),
            nt_res: 0,
            creation_tenth: tenths,
            creation_time: time,
            creation_date: date,
            access_date: date,
            cluster1_high: 0,
            write_time: time,
            write_date: date,
            cluster1_low: 0,
            file_size: 0
        }
    }
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        Ok(Self::read(&mut Cursor::new(buf))?)
    }
    pub fn to_bytes(&self) -> Result<[u8;DIR_ENTRY_SIZE],DYNERR> {
        let mut curs = Cursor::new(Vec::new());
        self.write(&mut curs)?;
        let mut ans = [0;DIR_ENTRY_SIZE];
        ans.copy_from_slice(&curs.into_inner());
        Ok(ans)
    }
    /// Build the `.` and `..` entries of a new subdirectory, `parent` is 0 if the parent is root.
    pub fn create_dots(new_cluster: usize,parent: usize,time: Option<chrono::NaiveDateTime>) -> (Self,Self) {
        let mut dot = Entry::create(pack::DOT,Attributes::DIRECTORY,time);
        let mut dotdot = Entry::create(pack::DOTDOT,Attributes::DIRECTORY,time);
        dot.set_cluster(new_cluster);
        dotdot.set_cluster(parent);
        (dot,dotdot)
    }
    pub fn raw_name(&self) -> [u8;11] {
        self.name
    }
    pub fn set_raw_name(&mut self,name: [u8;11]) {
        self.name = name;
    }
    pub fn name(&self) -> String {
        match self.attributes().contains(Attributes::VOLUME_ID) {
            true => pack::label_to_string(self.name),
            false => pack::file_name_to_string(&self.name)
        }
    }
    pub fn cluster1(&self) -> usize {
        self.cluster1_low as usize + ((self.cluster1_high as usize) << 16)
    }
    pub fn set_cluster(&mut self,cluster: usize) {
        self.cluster1_low = (cluster & 0xffff) as u16;
        self.cluster1_high = (cluster >> 16) as u16;
    }
    pub fn eof(&self) -> usize {
        self.file_size as usize
    }
    pub fn set_eof(&mut self,eof: usize) {
        self.file_size = eof as u32;
    }
    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits_truncate(self.attr)
    }
    pub fn set_attributes(&mut self,attributes: Attributes) {
        self.attr = attributes.bits();
    }
    /// update write and access stamps
    pub fn stamp(&mut self,time: Option<chrono::NaiveDateTime>) {
        self.write_date = pack::pack_date(time);
        self.write_time = pack::pack_time(time);
        self.access_date = self.write_date;
    }
    fn file_info(&self,idx: usize) -> FileInfo {
        FileInfo {
            idx,
            lfn_idx: None,
            short_name: self.name,
            name: self.name(),
            long_name: None,
            attributes: self.attributes(),
            create_date: pack::unpack_date(self.creation_date),
            create_time: pack::unpack_time(self.creation_time,self.creation_tenth),
            write_date: pack::unpack_date(self.write_date),
            write_time: pack::unpack_time(self.write_time,0),
            access_date: pack::unpack_date(self.access_date),
            eof: self.eof(),
            cluster1: self.cluster1()
        }
    }
}

impl Directory {
    pub fn new() -> Self {
        Self {
            entries: Vec::new()
        }
    }
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.len()%DIR_ENTRY_SIZE!=0 {
            warn!("directory buffer wrong size");
        }
        let mut entries = Vec::new();
        for chunk in bytes.chunks_exact(DIR_ENTRY_SIZE) {
            let mut slot = [0;DIR_ENTRY_SIZE];
            slot.copy_from_slice(chunk);
            entries.push(slot);
        }
        Self {
            entries
        }
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        self.entries.concat()
    }
    /// number of entries (used or not) in the directory
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }
    pub fn expand(&mut self,count: usize) {
        for _i in 0..count {
            self.entries.push([0;DIR_ENTRY_SIZE]);
        }
    }
    pub fn get_type(&self,ptr: &Ptr) -> EntryType {
        let idx = ptr.unwrap();
        let (nm0,attr) = (self.entries[idx][0],self.entries[idx][11]);
        match (nm0,attr) {
            (pack::DELETED,_) => EntryType::Free,
            (FREE_AND_NO_MORE,_) => EntryType::FreeAndNoMore,
            (_,a) if a & LONG_NAME == LONG_NAME => EntryType::LongName,
            (_,a) if a & Attributes::VOLUME_ID.bits() > 0 => EntryType::VolumeLabel,
            (_,a) if a & Attributes::DIRECTORY.bits() > 0 => EntryType::Directory,
            _ => EntryType::File
        }
    }
    pub fn get_raw(&self,ptr: &Ptr) -> [u8;DIR_ENTRY_SIZE] {
        self.entries[ptr.unwrap()]
    }
    pub fn set_raw(&mut self,ptr: &Ptr,raw: [u8;DIR_ENTRY_SIZE]) {
        self.entries[ptr.unwrap()] = raw;
    }
    pub fn get_entry(&self,ptr: &Ptr) -> Result<Entry,DYNERR> {
        Entry::from_bytes(&self.entries[ptr.unwrap()])
    }
    pub fn set_entry(&mut self,ptr: &Ptr,entry: &Entry) -> STDRESULT {
        self.entries[ptr.unwrap()] = entry.to_bytes()?;
        Ok(())
    }
    /// Mark a slot deleted, leaving the rest of it intact
    pub fn mark_deleted(&mut self,ptr: &Ptr) {
        self.entries[ptr.unwrap()][0] = pack::DELETED;
    }
    /// slot index where the in-use area ends, i.e., the first 0x00 marker or the length
    fn end_idx(&self) -> usize {
        (0..self.num_entries())
            .find(|i| self.get_type(&Ptr::Entry(*i))==EntryType::FreeAndNoMore)
            .unwrap_or(self.num_entries())
    }
    fn is_slot_free(&self,idx: usize,end: usize) -> bool {
        idx >= end || self.get_type(&Ptr::Entry(idx))==EntryType::Free
    }
    /// Find the first run of `count` reusable slots, deleted slots and
    /// everything past the end marker count as reusable.
    pub fn free_run(&self,count: usize) -> Option<usize> {
        let end = self.end_idx();
        let mut run = 0;
        for i in 0..self.num_entries() {
            match self.is_slot_free(i,end) {
                true => run += 1,
                false => run = 0
            }
            if run==count {
                return Some(i+1-count);
            }
        }
        None
    }
    /// number of reusable slots at the very end of the directory
    pub fn trailing_free(&self) -> usize {
        let end = self.end_idx();
        (0..self.num_entries()).rev().take_while(|i| self.is_slot_free(*i,end)).count()
    }
    /// If this is the root directory there may be a disk label entry
    pub fn find_label(&self) -> Option<Entry> {
        let end = self.end_idx();
        for i in 0..end {
            let ptr = Ptr::Entry(i);
            if self.get_type(&ptr)==EntryType::VolumeLabel {
                return self.get_entry(&ptr).ok();
            }
        }
        None
    }
    /// raw short names of every short entry in use, including the label
    pub fn short_names(&self) -> Vec<[u8;11]> {
        let mut ans = Vec::new();
        for i in 0..self.end_idx() {
            match self.get_type(&Ptr::Entry(i)) {
                EntryType::File | EntryType::Directory | EntryType::VolumeLabel => {
                    let mut name = [0;11];
                    name.copy_from_slice(&self.entries[i][0..11]);
                    ans.push(name);
                },
                _ => {}
            }
        }
        ans
    }
    /// Build the list of files and subdirectories in order of appearance, including the
    /// dot entries but excluding the volume label.  Long names are reassembled from the
    /// records immediately preceding each short entry.  If the records are damaged or
    /// belong to another short name, the long name is dropped and only the short name is reported.
    pub fn build_files(&self) -> Result<Vec<FileInfo>,DYNERR> {
        let mut ans = Vec::new();
        let mut pending: Vec<(usize,vfat::LfnEntry)> = Vec::new();
        for i in 0..self.num_entries() {
            let ptr = Ptr::Entry(i);
            match self.get_type(&ptr) {
                EntryType::FreeAndNoMore => break,
                EntryType::Free | EntryType::VolumeLabel => pending.clear(),
                EntryType::LongName => {
                    let rec = vfat::LfnEntry::from_bytes(&self.entries[i])?;
                    if rec.is_last() {
                        pending.clear();
                    }
                    pending.push((i,rec));
                },
                EntryType::File | EntryType::Directory => {
                    let entry = self.get_entry(&ptr)?;
                    let mut finfo = entry.file_info(i);
                    if pending.len() > 0 {
                        finfo.lfn_idx = Some(pending[0].0);
                        let recs: Vec<vfat::LfnEntry> = pending.iter().map(|(_,r)| r.clone()).collect();
                        match vfat::decode_long_name(&recs,&entry.raw_name()) {
                            Ok(long) => {
                                finfo.name = long.clone();
                                finfo.long_name = Some(long);
                            },
                            Err(e) => warn!("{} at slot {}, using short name {}",e,i,finfo.name)
                        }
                    }
                    pending.clear();
                    trace!("entry in use: {}",finfo.name);
                    ans.push(finfo);
                }
            }
        }
        Ok(ans)
    }
    /// Classify every slot for display
    pub fn raw_slots(&self) -> Result<Vec<RawSlot>,DYNERR> {
        let mut ans = Vec::new();
        for i in 0..self.num_entries() {
            let ptr = Ptr::Entry(i);
            let slot = match self.get_type(&ptr) {
                EntryType::FreeAndNoMore => RawSlot::End,
                EntryType::Free => RawSlot::Deleted,
                EntryType::LongName => {
                    let rec = vfat::LfnEntry::from_bytes(&self.entries[i])?;
                    RawSlot::LongName { seq: rec.seq(), last: rec.is_last(), checksum: rec.checksum, text: rec.text() }
                },
                _ => {
                    let entry = self.get_entry(&ptr)?;
                    RawSlot::Short { name: entry.name(), attributes: entry.attributes(), cluster: entry.cluster1(), size: entry.eof() }
                }
            };
            ans.push(slot);
        }
        Ok(ans)
    }
}

/// Search for a file in the list produced by `Directory::build_files`,
/// matching long or short name without regard to case.
pub fn get_file<'a>(name: &str,files: &'a [FileInfo]) -> Option<&'a FileInfo> {
    files.iter().find(|f| f.matches(name))
}

/// Choose an 11-byte short name for `name` that is not among `existing`.
/// A name that is already valid 8.3 is used as is (case raised) when it is unique.
/// Otherwise the policy decides between a numeric tail and plain truncation;
/// plain truncation falls back to a numeric tail if it collides.
pub fn generate_short_name(name: &str,existing: &[[u8;11]],policy: TailPolicy) -> Result<[u8;11],Error> {
    if vfat::is_valid_83(name) {
        let candidate = pack::string_to_file_name(name);
        if !existing.contains(&candidate) {
            return Ok(candidate);
        }
    }
    let (base,ext) = vfat::sanitize(name);
    let ext: String = ext.chars().take(3).collect();
    if policy==TailPolicy::Plain && base.len()>0 {
        let candidate = pack::pad_short_name(&base,&ext);
        if !existing.contains(&candidate) {
            return Ok(candidate);
        }
        debug!("truncated name collides, falling back to numeric tail");
    }
    for n in 1..=9999 {
        let tail = format!("~{}",n);
        let keep: String = base.chars().take(8-tail.len()).collect();
        let candidate = pack::pad_short_name(&[keep,tail].concat(),&ext);
        if !existing.contains(&candidate) {
            return Ok(candidate);
        }
    }
    debug!("numeric tails exhausted for {}",name);
    Err(Error::NameCollision)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn entry_layout() {
        let t = NaiveDate::from_ymd_opt(2024,2,29).and_then(|d| d.and_hms_opt(13,14,16)).expect("bad date");
        let mut entry = Entry::create(*b"README  TXT",Attributes::ARCHIVE,Some(t));
        entry.set_cluster(0x123);
        entry.set_eof(19);
        let buf = entry.to_bytes().expect("serialize failed");
        assert_eq!(&buf[0..11],b"README  TXT");
        assert_eq!(buf[11],0x20);
        assert_eq!(buf[26..28],[0x23,0x01]);
        assert_eq!(buf[28..32],[19,0,0,0]);
        assert_eq!(u16::from_le_bytes([buf[24],buf[25]]),pack::pack_date(Some(t)));
        assert_eq!(Entry::from_bytes(&buf).expect("parse failed"),entry);
    }

    #[test]
    fn short_names() {
        let none: Vec<[u8;11]> = Vec::new();
        assert_eq!(&generate_short_name("My_Favorite_Song.mid",&none,TailPolicy::Windows).expect("no name"),b"MY_FAV~1MID");
        assert_eq!(&generate_short_name("My_Favorite_Song.mid",&none,TailPolicy::Plain).expect("no name"),b"MY_FAVORMID");
        assert_eq!(&generate_short_name("readme.txt",&none,TailPolicy::Windows).expect("no name"),b"README  TXT");
        let taken = vec![*b"MY_FAVORMID"];
        assert_eq!(&generate_short_name("My_Favorite_Song.mid",&taken,TailPolicy::Plain).expect("no name"),b"MY_FAV~1MID");
        let taken = vec![*b"README  TXT"];
        assert_eq!(&generate_short_name("readme.txt",&taken,TailPolicy::Windows).expect("no name"),b"README~1TXT");
        assert_eq!(&generate_short_name("ThisIsALongFileName.txt",&none,TailPolicy::Plain).expect("no name"),b"THISISALTXT");
        assert_eq!(&generate_short_name("+++.txt",&none,TailPolicy::Windows).expect("no name"),b"~1      TXT");
    }

    #[test]
    fn wide_tails() {
        let mut taken: Vec<[u8;11]> = Vec::new();
        for _i in 0..120 {
            let name = generate_short_name("Long Document Name.doc",&taken,TailPolicy::Windows).expect("no name");
            assert!(!taken.contains(&name));
            taken.push(name);
        }
        assert_eq!(&taken[0],b"LONGDO~1DOC");
        assert_eq!(&taken[9],b"LONGD~10DOC");
        assert_eq!(&taken[99],b"LONG~100DOC");
    }

    #[test]
    fn slot_runs() {
        let mut dir = Directory::new();
        dir.expand(8);
        let used = Entry::create(*b"A          ",Attributes::ARCHIVE,None);
        for i in 0..4 {
            dir.set_entry(&Ptr::Entry(i),&used).expect("set failed");
        }
        dir.mark_deleted(&Ptr::Entry(1));
        assert_eq!(dir.free_run(1),Some(1));
        assert_eq!(dir.free_run(2),Some(4));
        assert_eq!(dir.free_run(5),None);
        assert_eq!(dir.trailing_free(),4);
        dir.mark_deleted(&Ptr::Entry(3));
        assert_eq!(dir.free_run(5),Some(3));
        assert_eq!(dir.trailing_free(),5);
    }

    #[test]
    fn long_names_in_listing() {
        let short = *b"MY_FAV~1MID";
        let recs = vfat::encode_long_name("My_Favorite_Song.mid",&short).expect("encode failed");
        let mut dir = Directory::new();
        dir.expand(6);
        for (i,rec) in recs.iter().enumerate() {
            dir.set_raw(&Ptr::Entry(i),rec.to_bytes().expect("serialize failed"));
        }
        dir.set_entry(&Ptr::Entry(2),&Entry::create(short,Attributes::ARCHIVE,None)).expect("set failed");
        // orphan with a wrong checksum
        let bad = vfat::encode_long_name("Another long name",b"ANOTHE~1   ").expect("encode failed");
        dir.set_raw(&Ptr::Entry(3),bad[0].to_bytes().expect("serialize failed"));
        dir.set_entry(&Ptr::Entry(4),&Entry::create(*b"OTHER~1    ",Attributes::ARCHIVE,None)).expect("set failed");
        let files = dir.build_files().expect("listing failed");
        assert_eq!(files.len(),2);
        assert_eq!(files[0].name,"My_Favorite_Song.mid");
        assert_eq!(files[0].slots(),0..=2);
        assert_eq!(files[1].name,"OTHER~1");
        assert_eq!(files[1].long_name,None);
        assert!(get_file("my_favorite_song.MID",&files).is_some());
        assert!(get_file("my_fav~1.mid",&files).is_some());
        let raw = dir.raw_slots().expect("raw failed");
        assert_eq!(raw[5],RawSlot::End);
    }
}
