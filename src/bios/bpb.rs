//! ## BIOS Parameter Block Module
//!
//! This contains the BIOS parameter block (BPB) used with FAT12 volumes.
//! Implementation is based on Microsoft Hardware White Paper,
//! "FAT: General Overview of On-Disk Format," Dec. 6, 2000.
//!
//! New volumes are always built from the literal tables at the bottom of this module.
//! Floppy emulators and the instruments that use them are intolerant of BPB values
//! that differ from what DOS itself would write, so nothing here is computed heuristically.

use std::io::Cursor;
use binrw::{BinRead,BinWrite};
use log::{debug,error};
use super::Error;
use crate::img::Preset;
use crate::DYNERR;

const JMP_BOOT: [u8;3] = [0xeb,0x3c,0x90];
const OEM_NAME: [u8;8] = *b"MSDOS5.0";
const BOOT_SIGNATURE: [u8;2] = [0x55,0xaa]; // goes in boot[510..512]
const EXT_BOOT_SIG: u8 = 0x29;
const NO_NAME: [u8;11] = *b"NO NAME    ";
const FAT12_TYPE: [u8;8] = *b"FAT12   ";
/// FAT12 volumes must have fewer clusters than this
pub const MAX_CLUSTERS_FAT12: usize = 4085;

/// Appears starting at byte 11 of the boot sector, following `JMP_BOOT` and `OEM_NAME`.
/// The last field `tot_sec_32` was introduced with MS-DOS 3.0.
#[derive(BinRead,BinWrite,Clone,Debug,PartialEq)]
#[brw(little)]
pub struct BPBFoundation {
    /// 512, 1024, 2048, or 4096
    pub bytes_per_sec: u16,
    /// 1, 2, 4, 8, 16, 32, 64, or 128.
    pub sec_per_clus: u8,
    /// always 1 for the floppies we create
    pub reserved_sectors: u16,
    /// usually 2
    pub num_fats: u8,
    /// Directory entries in the root directory.
    /// The root directory should take up an integral number of sectors.
    pub root_ent_cnt: u16,
    /// 16-bit sector count, superceded by tot_sec_32 if 0.
    pub tot_sec_16: u16,
    /// 0xf0,0xf8,0xf9,0xfa,0xfb,0xfc,0xfd,0xfe,0xff.
    /// Value should also be put in FAT[0] in the low 8 bits.
    pub media: u8,
    /// count of sectors occupied by one FAT
    pub fat_size_16: u16,
    /// sectors per track for interrupt 0x13
    pub sec_per_trk: u16,
    /// number of heads for interrupt 0x13
    pub num_heads: u16,
    /// hidden sectors preceding this volume, 0 for non-partitioned media.
    pub hidd_sec: u32,
    /// 32-bit sector count, if 0 use tot_sec_16.
    pub tot_sec_32: u32,
}

/// This follows the FAT12/16 BPB, appears starting at byte 36 of the boot sector.
#[derive(BinRead,BinWrite,Clone,Debug,PartialEq)]
#[brw(little)]
pub struct BPBTail {
    /// interrupt 0x13 drive number (0x00 for floppy)
    pub drv_num: u8,
    /// set to 0
    pub reserved1: u8,
    /// signature (0x29) indicating following 3 fields are present
    pub boot_sig: u8,
    /// volume serial number, can generate using a timestamp
    pub vol_id: [u8;4],
    /// volume label, matches root directory label if it exists, otherwise "NO NAME    "
    pub vol_lab: [u8;11],
    /// file system type only for display, should not be used to determine the FAT type.
    pub fil_sys_type: [u8;8]
}

/// Constants derived from the BPB that every other component works from.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Geometry {
    pub bytes_per_sector: usize,
    pub sectors_per_cluster: usize,
    pub reserved_sectors: usize,
    pub fat_count: usize,
    pub sectors_per_fat: usize,
    pub root_entry_count: usize,
    pub total_sectors: usize,
    pub media_descriptor: u8
}

impl Geometry {
    /// sectors used by the root directory, rounding up
    pub fn root_dir_sectors(&self) -> usize {
        (self.root_entry_count*32 + self.bytes_per_sector - 1) / self.bytes_per_sector
    }
    pub fn root_dir_start_sector(&self) -> usize {
        self.reserved_sectors + self.fat_count*self.sectors_per_fat
    }
    pub fn data_start_sector(&self) -> usize {
        self.root_dir_start_sector() + self.root_dir_sectors()
    }
    pub fn cluster_bytes(&self) -> usize {
        self.sectors_per_cluster*self.bytes_per_sector
    }
    /// total clusters in the data region, rounding down (a partial cluster is not used)
    pub fn cluster_count(&self) -> usize {
        match self.total_sectors.checked_sub(self.data_start_sector()) {
            Some(secs) => secs/self.sectors_per_cluster,
            None => 0
        }
    }
    /// byte offset of FAT copy `n`
    pub fn fat_offset(&self,n: usize) -> usize {
        (self.reserved_sectors + n*self.sectors_per_fat)*self.bytes_per_sector
    }
    pub fn fat_bytes(&self) -> usize {
        self.sectors_per_fat*self.bytes_per_sector
    }
    pub fn root_dir_offset(&self) -> usize {
        self.root_dir_start_sector()*self.bytes_per_sector
    }
    pub fn root_dir_bytes(&self) -> usize {
        self.root_entry_count*32
    }
    pub fn data_offset(&self) -> usize {
        self.data_start_sector()*self.bytes_per_sector
    }
    /// byte offset of data cluster `n`, cluster 2 is the first data cluster
    pub fn cluster_offset(&self,n: usize) -> usize {
        self.data_offset() + (n-2)*self.cluster_bytes()
    }
    pub fn total_bytes(&self) -> usize {
        self.total_sectors*self.bytes_per_sector
    }
}

impl BPBFoundation {
    pub fn verify(&self) -> bool {
        let mut ans = true;
        let bytes = self.bytes_per_sec as u64;
        if ![512,1024,2048,4096].contains(&bytes) {
            debug!("invalid bytes per sector {}",bytes);
            ans = false;
        }
        if ![1,2,4,8,16,32,64,128].contains(&self.sec_per_clus) {
            debug!("invalid sectors per cluster {}",self.sec_per_clus);
            ans = false;
        }
        if self.reserved_sectors==0 {
            debug!("invalid count of reserved sectors 0");
            ans = false;
        }
        if self.num_fats==0 {
            debug!("invalid count of FATs 0");
            ans = false;
        }
        if self.media!=0xf0 && self.media<0xf8 {
            debug!("invalid media byte {:02X}",self.media);
            ans = false;
        }
        if self.root_ent_cnt==0 {
            debug!("FAT12 root directory cannot be empty");
            ans = false;
        }
        if self.fat_size_16==0 {
            debug!("invalid count of FAT sectors 0");
            ans = false;
        }
        if self.tot_sec()==0 {
            debug!("invalid sector count 0");
            ans = false;
        }
        ans
    }
    pub fn tot_sec(&self) -> u64 {
        match self.tot_sec_16 {
            0 => self.tot_sec_32 as u64,
            _ => self.tot_sec_16 as u64
        }
    }
}

/// This represents and manages the data in the boot sector,
/// which includes the BPB, along with some other information.
#[derive(Clone,Debug)]
pub struct BootSector {
    jmp: [u8;3],
    oem: [u8;8],
    foundation: BPBFoundation,
    tail: BPBTail,
    /// Whatever follows, including the signature.
    remainder: Vec<u8>
}

impl BootSector {
    /// Build a canonical boot sector for the given capacity.
    pub fn create(preset: Preset,vol_id: u32) -> Self {
        let foundation = foundation_for(preset);
        let tail = BPBTail {
            drv_num: 0x00,
            reserved1: 0,
            boot_sig: EXT_BOOT_SIG,
            vol_id: u32::to_le_bytes(vol_id),
            vol_lab: NO_NAME,
            fil_sys_type: FAT12_TYPE
        };
        let sec_size = foundation.bytes_per_sec as usize;
        let used = 62;
        let mut remainder: Vec<u8> = vec![0;sec_size - used];
        remainder[510-used] = BOOT_SIGNATURE[0];
        remainder[511-used] = BOOT_SIGNATURE[1];
        Self {
            jmp: JMP_BOOT,
            oem: OEM_NAME,
            foundation,
            tail,
            remainder
        }
    }
    /// Unpack the sector data without verifying it.
    pub fn from_bytes(sec_data: &[u8]) -> Result<Self,DYNERR> {
        if sec_data.len()<512 {
            error!("boot sector too small");
            return Err(Box::new(Error::InvalidBootSector));
        }
        let foundation = BPBFoundation::read(&mut Cursor::new(&sec_data[11..36]))?;
        let tail = BPBTail::read(&mut Cursor::new(&sec_data[36..62]))?;
        let mut jmp = [0;3];
        let mut oem = [0;8];
        jmp.copy_from_slice(&sec_data[0..3]);
        oem.copy_from_slice(&sec_data[3..11]);
        Ok(Self {
            jmp,
            oem,
            foundation,
            tail,
            remainder: sec_data[62..512].to_vec()
        })
    }
    /// Verify that the sector data is a valid FAT12 boot sector.
    pub fn verify(sec_data: &[u8]) -> bool {
        let mut ans = true;
        if sec_data.len()<512 {
            debug!("sector too small");
            return false;
        }
        let signature = [sec_data[510],sec_data[511]];
        if signature!=BOOT_SIGNATURE {
            debug!("signature mismatch");
            ans = false;
        }
        let bpb = match BPBFoundation::read(&mut Cursor::new(&sec_data[11..36])) {
            Ok(bpb) => bpb,
            Err(_) => return false
        };
        ans &= bpb.verify();
        if !ans {
            return false;
        }
        let geometry = geometry_of(&bpb);
        if geometry.total_sectors <= geometry.data_start_sector() {
            debug!("data region came out 0 or negative");
            return false;
        }
        let clusters = geometry.cluster_count();
        if clusters==0 || clusters >= MAX_CLUSTERS_FAT12 {
            debug!("cluster count {} is not FAT12",clusters);
            return false;
        }
        if geometry.fat_bytes()*2/3 < clusters + 2 {
            debug!("FAT is too small for {} clusters",clusters);
            return false;
        }
        debug!("BPB counts: {}({}) FAT, {} tot, {} res, {} root",
            geometry.sectors_per_fat,geometry.fat_count,geometry.total_sectors,geometry.reserved_sectors,geometry.root_dir_sectors());
        ans
    }
    /// Verify and unpack the boot sector.
    pub fn parse(sec_data: &[u8]) -> Result<Self,DYNERR> {
        if !Self::verify(sec_data) {
            error!("invalid boot sector");
            return Err(Box::new(Error::InvalidBootSector));
        }
        Self::from_bytes(sec_data)
    }
    pub fn to_bytes(&self) -> Result<Vec<u8>,DYNERR> {
        let mut curs = Cursor::new(Vec::new());
        self.foundation.write(&mut curs)?;
        self.tail.write(&mut curs)?;
        Ok([
            self.jmp.to_vec(),
            self.oem.to_vec(),
            curs.into_inner(),
            self.remainder.clone()
        ].concat())
    }
    pub fn geometry(&self) -> Geometry {
        geometry_of(&self.foundation)
    }
    pub fn foundation(&self) -> &BPBFoundation {
        &self.foundation
    }
    pub fn oem(&self) -> String {
        crate::escaped_ascii_from_bytes(&self.oem,true).trim_end().to_string()
    }
    pub fn vol_id(&self) -> u32 {
        u32::from_le_bytes(self.tail.vol_id)
    }
    pub fn has_tail(&self) -> bool {
        self.tail.boot_sig==EXT_BOOT_SIG
    }
    /// volume label from the tail, if the tail exists and the label is not blank
    pub fn label(&self) -> Option<[u8;11]> {
        if self.has_tail() && self.tail.vol_lab!=[0x20;11] {
            Some(self.tail.vol_lab)
        } else {
            None
        }
    }
    pub fn fs_type(&self) -> Option<String> {
        match self.has_tail() {
            true => Some(crate::escaped_ascii_from_bytes(&self.tail.fil_sys_type,true).trim_end().to_string()),
            false => None
        }
    }
    pub fn media_byte(&self) -> u8 {
        self.foundation.media
    }
    pub fn secs_per_track(&self) -> u64 {
        self.foundation.sec_per_trk as u64
    }
    pub fn heads(&self) -> u64 {
        self.foundation.num_heads as u64
    }
    /// See if this BPB matches one of the standard tables
    pub fn preset(&self) -> Option<Preset> {
        Preset::all().into_iter().find(|p| foundation_for(*p)==self.foundation)
    }
    /// Boot sector fields as a JSON string
    pub fn to_json(&self,indent: Option<u16>) -> String {
        let geometry = self.geometry();
        let mut ans = json::JsonValue::new_object();
        ans["oem"] = json::JsonValue::String(self.oem());
        ans["bytesPerSector"] = geometry.bytes_per_sector.into();
        ans["sectorsPerCluster"] = geometry.sectors_per_cluster.into();
        ans["reservedSectors"] = geometry.reserved_sectors.into();
        ans["fatCount"] = geometry.fat_count.into();
        ans["rootEntries"] = geometry.root_entry_count.into();
        ans["totalSectors"] = geometry.total_sectors.into();
        ans["mediaDescriptor"] = json::JsonValue::String(hex::encode_upper([geometry.media_descriptor]));
        ans["sectorsPerFat"] = geometry.sectors_per_fat.into();
        ans["sectorsPerTrack"] = self.secs_per_track().into();
        ans["heads"] = self.heads().into();
        ans["hiddenSectors"] = self.foundation.hidd_sec.into();
        ans["dataStartSector"] = geometry.data_start_sector().into();
        ans["clusterCount"] = geometry.cluster_count().into();
        if self.has_tail() {
            ans["driveNumber"] = self.tail.drv_num.into();
            ans["volumeId"] = json::JsonValue::String(hex::encode_upper(self.vol_id().to_be_bytes()));
            ans["volumeLabel"] = json::JsonValue::String(crate::escaped_ascii_from_bytes(&self.tail.vol_lab,true).trim_end().to_string());
            ans["fsType"] = json::JsonValue::String(self.fs_type().unwrap_or_default());
        }
        if let Some(preset) = self.preset() {
            ans["format"] = json::JsonValue::String(preset.to_string());
        }
        match indent {
            Some(spaces) => json::stringify_pretty(ans,spaces),
            None => json::stringify(ans)
        }
    }
}

fn geometry_of(bpb: &BPBFoundation) -> Geometry {
    Geometry {
        bytes_per_sector: bpb.bytes_per_sec as usize,
        sectors_per_cluster: bpb.sec_per_clus as usize,
        reserved_sectors: bpb.reserved_sectors as usize,
        fat_count: bpb.num_fats as usize,
        sectors_per_fat: bpb.fat_size_16 as usize,
        root_entry_count: bpb.root_ent_cnt as usize,
        total_sectors: bpb.tot_sec() as usize,
        media_descriptor: bpb.media
    }
}

fn foundation_for(preset: Preset) -> BPBFoundation {
    match preset {
        Preset::D525_360 => DSDD_525_9,
        Preset::D35_720 => D35_720,
        Preset::D525_1200 => DSHD_525,
        Preset::D35_1440 => D35_1440,
        Preset::D35_1680 => D35_1680_DMF,
        Preset::D35_2880 => D35_2880
    }
}

const DSDD_525_9: BPBFoundation = BPBFoundation {
    bytes_per_sec: 512,
    sec_per_clus: 2,
    reserved_sectors: 1,
    num_fats: 2,
    root_ent_cnt: 0x70,
    tot_sec_16: 720,
    media: 0xfd,
    fat_size_16: 2,
    sec_per_trk: 9,
    num_heads: 2,
    hidd_sec: 0,
    tot_sec_32: 0
};

const DSHD_525: BPBFoundation = BPBFoundation {
    bytes_per_sec: 512,
    sec_per_clus: 1,
    reserved_sectors: 1,
    num_fats: 2,
    root_ent_cnt: 0xe0,
    tot_sec_16: 2400,
    media: 0xf9,
    fat_size_16: 7,
    sec_per_trk: 15,
    num_heads: 2,
    hidd_sec: 0,
    tot_sec_32: 0
};

const D35_720: BPBFoundation = BPBFoundation {
    bytes_per_sec: 512,
    sec_per_clus: 2,
    reserved_sectors: 1,
    num_fats: 2,
    root_ent_cnt: 0x70,
    tot_sec_16: 1440,
    media: 0xf9,
    fat_size_16: 3,
    sec_per_trk: 9,
    num_heads: 2,
    hidd_sec: 0,
    tot_sec_32: 0
};

const D35_1440: BPBFoundation = BPBFoundation {
    bytes_per_sec: 512,
    sec_per_clus: 1,
    reserved_sectors: 1,
    num_fats: 2,
    root_ent_cnt: 0xe0,
    tot_sec_16: 2880,
    media: 0xf0,
    fat_size_16: 9,
    sec_per_trk: 18,
    num_heads: 2,
    hidd_sec: 0,
    tot_sec_32: 0
};

const D35_1680_DMF: BPBFoundation = BPBFoundation {
    bytes_per_sec: 512,
    sec_per_clus: 4,
    reserved_sectors: 1,
    num_fats: 2,
    root_ent_cnt: 0x10,
    tot_sec_16: 3360,
    media: 0xf0,
    fat_size_16: 3,
    sec_per_trk: 21,
    num_heads: 2,
    hidd_sec: 0,
    tot_sec_32: 0
};

const D35_2880: BPBFoundation = BPBFoundation {
    bytes_per_sec: 512,
    sec_per_clus: 2,
    reserved_sectors: 1,
    num_fats: 2,
    root_ent_cnt: 0xe0,
    tot_sec_16: 5760,
    media: 0xf0,
    fat_size_16: 9,
    sec_per_trk: 36,
    num_heads: 2,
    hidd_sec: 0,
    tot_sec_32: 0
};

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn preset_round_trip() {
        for preset in Preset::all() {
            let boot = BootSector::create(preset,0x12345678);
            let buf = boot.to_bytes().expect("could not serialize");
            assert_eq!(buf.len(),512);
            assert_eq!(buf.len()*boot.geometry().total_sectors,preset.byte_capacity());
            let parsed = BootSector::parse(&buf).expect("could not parse");
            assert_eq!(parsed.geometry(),boot.geometry());
            assert_eq!(parsed.preset(),Some(preset));
            assert_eq!(parsed.vol_id(),0x12345678);
            assert_eq!(parsed.to_bytes().expect("could not serialize"),buf);
        }
    }

    #[test]
    fn layout_1440() {
        let buf = BootSector::create(Preset::D35_1440,0).to_bytes().expect("could not serialize");
        assert_eq!(buf[0..3],[0xeb,0x3c,0x90]);
        assert_eq!(&buf[3..11],b"MSDOS5.0");
        assert_eq!(buf[11..13],[0x00,0x02]);
        assert_eq!(buf[13],1);
        assert_eq!(buf[17..19],[0xe0,0x00]);
        assert_eq!(buf[19..21],[0x40,0x0b]);
        assert_eq!(buf[21],0xf0);
        assert_eq!(buf[38],0x29);
        assert_eq!(&buf[43..54],b"NO NAME    ");
        assert_eq!(&buf[54..62],b"FAT12   ");
        assert_eq!(buf[510..512],[0x55,0xaa]);
        let geometry = BootSector::parse(&buf).expect("could not parse").geometry();
        assert_eq!(geometry.root_dir_sectors(),14);
        assert_eq!(geometry.data_start_sector(),33);
        assert_eq!(geometry.cluster_count(),2847);
    }

    #[test]
    fn layout_2880() {
        let buf = BootSector::create(Preset::D35_2880,0).to_bytes().expect("could not serialize");
        assert_eq!(buf[13],2);
        assert_eq!(buf[17..19],[0xe0,0x00]);
        assert_eq!(buf[19..21],[0x80,0x16]);
        assert_eq!(buf[21],0xf0);
        assert_eq!(buf[22..24],[0x09,0x00]);
        assert_eq!(buf[24..26],[0x24,0x00]);
        let geometry = BootSector::parse(&buf).expect("could not parse").geometry();
        assert_eq!(geometry.root_entry_count,224);
        assert_eq!(geometry.root_dir_sectors(),14);
        assert_eq!(geometry.data_start_sector(),33);
        assert_eq!(geometry.cluster_count(),2863);
    }

    #[test]
    fn rejects_bad_fields() {
        let good = BootSector::create(Preset::D35_720,0).to_bytes().expect("could not serialize");
        let mut bad = good.clone();
        bad[11] = 0x01; // 513 bytes per sector
        assert!(BootSector::parse(&bad).is_err());
        let mut bad = good.clone();
        bad[13] = 3;
        assert!(BootSector::parse(&bad).is_err());
        let mut bad = good.clone();
        bad[16] = 0;
        assert!(BootSector::parse(&bad).is_err());
        let mut bad = good.clone();
        bad[511] = 0;
        assert!(BootSector::parse(&bad).is_err());
        let mut bad = good.clone();
        bad[21] = 0x12;
        assert!(BootSector::parse(&bad).is_err());
        assert!(BootSector::parse(&good[0..100]).is_err());
    }
}
