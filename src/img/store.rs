//! ## Sector store
//!
//! Owns the bytes of the whole image.  All reads and writes are validated against the
//! image bounds, a violation produces `img::Error::OutOfRange` rather than truncating
//! or wrapping.  Writing is the only way the image changes, and every write marks
//! the store dirty so that callers know a save is pending.

use log::{trace,error};
use super::Error;
use crate::{STDRESULT,DYNERR};

/// Every FAT12 volume we handle has at least this sector size
pub const MIN_SECTOR_SIZE: usize = 512;

pub struct SectorStore {
    data: Vec<u8>,
    sec_size: usize,
    dirty: bool
}

impl SectorStore {
    /// Create a zeroed image of `total_bytes`.  A new image is considered dirty.
    pub fn create(total_bytes: usize) -> Self {
        Self {
            data: vec![0;total_bytes],
            sec_size: MIN_SECTOR_SIZE,
            dirty: true
        }
    }
    /// Take a copy of image bytes, e.g., as loaded from a file.
    /// The length must be a non-zero multiple of 512.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self,DYNERR> {
        if bytes.len()==0 || bytes.len() % MIN_SECTOR_SIZE != 0 {
            error!("image length {} is not a multiple of {}",bytes.len(),MIN_SECTOR_SIZE);
            return Err(Box::new(Error::ImageSizeMismatch));
        }
        Ok(Self {
            data: bytes.to_vec(),
            sec_size: MIN_SECTOR_SIZE,
            dirty: false
        })
    }
    /// Change the sector size, this is done once the boot sector is known.
    pub fn set_sec_size(&mut self,sec_size: usize) -> STDRESULT {
        if sec_size==0 || self.data.len() % sec_size != 0 {
            error!("sector size {} does not divide image",sec_size);
            return Err(Box::new(Error::ImageSizeMismatch));
        }
        self.sec_size = sec_size;
        Ok(())
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn sec_size(&self) -> usize {
        self.sec_size
    }
    pub fn sector_count(&self) -> usize {
        self.data.len() / self.sec_size
    }
    fn check(&self,offset: usize,len: usize) -> STDRESULT {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => {
                error!("access {}+{} exceeds image size {}",offset,len,self.data.len());
                Err(Box::new(Error::OutOfRange))
            }
        }
    }
    /// Read `len` bytes starting at byte `offset`
    pub fn read(&self,offset: usize,len: usize) -> Result<Vec<u8>,DYNERR> {
        self.check(offset,len)?;
        trace!("read {} bytes at {}",len,offset);
        Ok(self.data[offset..offset+len].to_vec())
    }
    /// Write all of `dat` starting at byte `offset`
    pub fn write(&mut self,offset: usize,dat: &[u8]) -> STDRESULT {
        self.check(offset,dat.len())?;
        trace!("write {} bytes at {}",dat.len(),offset);
        self.data[offset..offset+dat.len()].copy_from_slice(dat);
        self.dirty = true;
        Ok(())
    }
    /// Set `len` bytes starting at `offset` to `val`
    pub fn fill(&mut self,offset: usize,len: usize,val: u8) -> STDRESULT {
        self.check(offset,len)?;
        trace!("fill {} bytes at {} with {:02X}",len,offset,val);
        self.data[offset..offset+len].fill(val);
        self.dirty = true;
        Ok(())
    }
    /// Read logical sector `lsec`
    pub fn read_sector(&self,lsec: usize) -> Result<Vec<u8>,DYNERR> {
        match lsec.checked_mul(self.sec_size) {
            Some(offset) => self.read(offset,self.sec_size),
            None => Err(Box::new(Error::OutOfRange))
        }
    }
    /// Write logical sector `lsec`, data longer than a sector is refused,
    /// data shorter than a sector leaves the trailing bytes unaffected.
    pub fn write_sector(&mut self,lsec: usize,dat: &[u8]) -> STDRESULT {
        if dat.len() > self.sec_size {
            error!("sector data too long {}",dat.len());
            return Err(Box::new(Error::OutOfRange));
        }
        match lsec.checked_mul(self.sec_size) {
            Some(offset) => self.write(offset,dat),
            None => Err(Box::new(Error::OutOfRange))
        }
    }
    /// Replace the whole image with `total_bytes` of zeros, as part of formatting.
    pub fn resize_for_format(&mut self,total_bytes: usize) -> STDRESULT {
        if total_bytes==0 || total_bytes % MIN_SECTOR_SIZE != 0 {
            return Err(Box::new(Error::ImageSizeMismatch));
        }
        self.data = vec![0;total_bytes];
        self.sec_size = MIN_SECTOR_SIZE;
        self.dirty = true;
        Ok(())
    }
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bounds() {
        let mut store = SectorStore::create(1024);
        assert!(store.read(1000,24).is_ok());
        assert!(store.read(1000,25).is_err());
        assert!(store.read(usize::MAX,2).is_err());
        assert!(store.write(1023,&[1,2]).is_err());
        assert!(store.write_sector(2,&[0;512]).is_err());
        assert!(store.write_sector(1,&[0;513]).is_err());
        assert!(store.read_sector(1).is_ok());
    }

    #[test]
    fn dirty_tracking() {
        let mut store = SectorStore::from_bytes(&vec![0;1024]).expect("bad size");
        assert!(!store.is_dirty());
        store.write(10,&[0xaa,0xbb]).expect("write failed");
        assert!(store.is_dirty());
        assert_eq!(store.read(10,2).expect("read failed"),vec![0xaa,0xbb]);
        store.mark_clean();
        assert!(!store.is_dirty());
        // failed write leaves the store clean
        assert!(store.write(1024,&[1]).is_err());
        assert!(!store.is_dirty());
    }

    #[test]
    fn bad_sizes() {
        assert!(SectorStore::from_bytes(&[]).is_err());
        assert!(SectorStore::from_bytes(&vec![0;700]).is_err());
        let mut store = SectorStore::create(2048);
        assert!(store.set_sec_size(1024).is_ok());
        assert_eq!(store.sector_count(),2);
        assert!(store.set_sec_size(1536).is_err());
        store.resize_for_format(4096).expect("resize failed");
        assert_eq!(store.len(),4096);
        assert_eq!(store.sec_size(),512);
    }
}
