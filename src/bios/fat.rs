//! ### File allocation table (FAT)
//!
//! Module for manipulating the FAT on FAT12 volumes.  This module assumes the
//! entire FAT is buffered (floppy FATs are at most a few kilobytes).
//!
//! The FAT can be thought of as a cluster pool with forward links.
//! A cluster is an allocation unit composed of a fixed number of logical sectors.
//! The links in the FAT form chains of clusters, each chain points to a file's data.
//! A cluster value tells us:
//! * state of cluster, can be damaged, free, reserved, or allocated
//! * if allocated, is this the last cluster
//! * if allocated and not the last cluster, where is the next cluster
//!
//! The first two clusters are reserved, so that the first data cluster is cluster 2.
//! Cluster 0 contains the same value as the BPB's media field in the low 8 bits, higher bits are 1.
//! Cluster 1 contains end of cluster chain (EOC) upon formatting.
//!
//! Chains are never held as linked objects, they are described by index walks over the
//! owned table.  Writing the table back to the disk (all copies) is the caller's job.

use bit_vec::BitVec;
use log::{trace,debug,error};
use super::Error;
use super::bpb::Geometry;
use crate::DYNERR;

// end of cluster chain (EOC), if FAT entry is >= the value it is EOC.
const EOC12_MIN: u16 = 0xff8;
const EOC12_SET: u16 = 0xfff;
const RESERVED12_MIN: u16 = 0xff0;
const BAD_CLUSTER12: u16 = 0xff7;
const RESERVED_CLUSTER: u16 = 1;
const FREE_CLUSTER: u16 = 0;
pub const FIRST_DATA_CLUSTER: usize = 2;

/// Interpretation of a 12-bit FAT value
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum ClusterStatus {
    Free,
    Reserved,
    Bad,
    Last,
    Next(usize)
}

impl ClusterStatus {
    pub fn classify(val: u16) -> Self {
        match val & 0xfff {
            FREE_CLUSTER => Self::Free,
            RESERVED_CLUSTER => Self::Reserved,
            BAD_CLUSTER12 => Self::Bad,
            v if v >= EOC12_MIN => Self::Last,
            v if v >= RESERVED12_MIN => Self::Reserved,
            v => Self::Next(v as usize)
        }
    }
}

/// Test a chain for being a single ascending run
pub fn is_contiguous(chain: &[usize]) -> bool {
    chain.windows(2).all(|w| w[1]==w[0]+1)
}

/// The buffered FAT.  Only the first copy is held, mirroring happens at writeback.
#[derive(Clone)]
pub struct FatTable {
    buf: Vec<u8>,
    /// one past the last valid data cluster
    end: usize
}

impl FatTable {
    /// Fresh table for a newly formatted volume, with the media markers in clusters 0 and 1.
    pub fn new(geometry: &Geometry) -> Self {
        let mut ans = Self {
            buf: vec![0;geometry.fat_bytes()],
            end: FIRST_DATA_CLUSTER + geometry.cluster_count()
        };
        ans.set(0,0xf00 | geometry.media_descriptor as u16);
        ans.set(1,EOC12_SET);
        ans
    }
    /// Wrap the bytes of one FAT copy, which must be large enough for every cluster.
    pub fn from_bytes(buf: &[u8],geometry: &Geometry) -> Result<Self,DYNERR> {
        let end = FIRST_DATA_CLUSTER + geometry.cluster_count();
        if buf.len()*2/3 < end {
            error!("FAT buffer too small for {} clusters",end);
            return Err(Box::new(Error::InvalidBootSector));
        }
        if buf[0]!=geometry.media_descriptor {
            debug!("FAT media byte {:02X} differs from BPB {:02X}",buf[0],geometry.media_descriptor);
        }
        Ok(Self {
            buf: buf.to_vec(),
            end
        })
    }
    pub fn to_bytes(&self) -> &[u8] {
        &self.buf
    }
    /// one past the last valid data cluster
    pub fn end(&self) -> usize {
        self.end
    }
    /// is `n` a data cluster on this volume
    pub fn in_range(&self,n: usize) -> bool {
        n >= FIRST_DATA_CLUSTER && n < self.end
    }
    /// get the 12-bit value of cluster `n`, which must be less than `end()`.
    pub fn get(&self,n: usize) -> u16 {
        let offset = n + (n/2);
        let val16 = u16::from_le_bytes([self.buf[offset],self.buf[offset+1]]);
        if n & 1 == 1 {
            val16 >> 4
        } else {
            val16 & 0x0fff
        }
    }
    /// set the 12-bit value of cluster `n`, which must be less than `end()`.
    pub fn set(&mut self,n: usize,val: u16) {
        let offset = n + (n/2);
        let old = u16::from_le_bytes([self.buf[offset],self.buf[offset+1]]);
        let val16 = if n & 1 == 1 {
            (old & 0x000f) | (val << 4)
        } else {
            (old & 0xf000) | (val & 0x0fff)
        };
        let [lo,hi] = u16::to_le_bytes(val16);
        self.buf[offset] = lo;
        self.buf[offset+1] = hi;
    }
    pub fn status(&self,n: usize) -> ClusterStatus {
        ClusterStatus::classify(self.get(n))
    }
    pub fn is_free(&self,n: usize) -> bool {
        self.get(n)==FREE_CLUSTER
    }
    pub fn mark_last(&mut self,n: usize) {
        self.set(n,EOC12_SET);
    }
    pub fn num_free(&self) -> usize {
        (FIRST_DATA_CLUSTER..self.end).filter(|n| self.is_free(*n)).count()
    }
    /// Link the clusters in order and terminate with EOC.
    pub fn link(&mut self,chain: &[usize]) {
        for i in 0..chain.len() {
            match chain.get(i+1) {
                Some(next) => self.set(chain[i],*next as u16),
                None => self.mark_last(chain[i])
            }
        }
    }
    /// First-fit allocation of `count` clusters, chained in ascending order.
    /// Either all clusters are allocated or the table is untouched and `DiskFull` is returned.
    pub fn allocate(&mut self,count: usize) -> Result<Vec<usize>,DYNERR> {
        let mut chain = Vec::new();
        if count==0 {
            return Ok(chain);
        }
        for n in FIRST_DATA_CLUSTER..self.end {
            if self.is_free(n) {
                chain.push(n);
                if chain.len()==count {
                    break;
                }
            }
        }
        if chain.len() < count {
            debug!("requested {} clusters, only {} free",count,chain.len());
            return Err(Box::new(Error::DiskFull));
        }
        self.link(&chain);
        trace!("allocated {} clusters starting at {}",count,chain[0]);
        Ok(chain)
    }
    /// Allocate the lowest run of `count` consecutive free clusters, or return None
    /// if there is no such run.  The table is untouched in the latter case.
    pub fn allocate_contiguous(&mut self,count: usize) -> Option<Vec<usize>> {
        if count==0 {
            return Some(Vec::new());
        }
        let mut run = 0;
        for n in FIRST_DATA_CLUSTER..self.end {
            match self.is_free(n) {
                true => run += 1,
                false => run = 0
            }
            if run==count {
                let chain: Vec<usize> = (n+1-count..=n).collect();
                self.link(&chain);
                return Some(chain);
            }
        }
        None
    }
    /// Allocate `count` more clusters and attach them after `last`.
    /// All or nothing, as with `allocate`.
    pub fn extend(&mut self,last: usize,count: usize) -> Result<Vec<usize>,DYNERR> {
        let added = self.allocate(count)?;
        if let Some(first) = added.first() {
            self.set(last,*first as u16);
        }
        Ok(added)
    }
    /// Set every cluster in the chain to free.  Freeing a free cluster is not an error.
    pub fn free(&mut self,chain: &[usize]) {
        for n in chain {
            if self.in_range(*n) {
                self.set(*n,FREE_CLUSTER);
            }
        }
    }
    /// Keep the first `keep` clusters of the chain, free the rest.
    pub fn truncate(&mut self,chain: &[usize],keep: usize) {
        if keep >= chain.len() {
            return;
        }
        if keep > 0 {
            self.mark_last(chain[keep-1]);
        }
        self.free(&chain[keep..]);
    }
    /// Follow a chain from `start`, returning all of its clusters.
    /// `start==0` is the empty chain.  Fails with `CorruptChain` upon a cycle,
    /// a reference out of range, or a free, reserved, or bad marker mid-chain.
    pub fn follow(&self,start: usize) -> Result<Vec<usize>,DYNERR> {
        let (chain,intact) = self.walk(start);
        match intact {
            true => Ok(chain),
            false => Err(Box::new(Error::CorruptChain))
        }
    }
    /// Same as `follow`, but returns whatever valid prefix was found, along with a flag
    /// indicating whether the chain was intact.  Used when freeing damaged chains.
    pub fn walk(&self,start: usize) -> (Vec<usize>,bool) {
        let mut chain = Vec::new();
        if start==0 {
            return (chain,true);
        }
        if !self.in_range(start) {
            error!("chain starts out of range at {}",start);
            return (chain,false);
        }
        let mut visited = BitVec::from_elem(self.end,false);
        let mut curr = start;
        loop {
            if visited[curr] {
                error!("cluster chain loops back to {}",curr);
                return (chain,false);
            }
            visited.set(curr,true);
            chain.push(curr);
            match self.status(curr) {
                ClusterStatus::Last => return (chain,true),
                ClusterStatus::Next(next) if self.in_range(next) => curr = next,
                ClusterStatus::Next(next) => {
                    error!("cluster {} links out of range to {}",curr,next);
                    return (chain,false);
                },
                status => {
                    error!("cluster {} in chain is marked {:?}",curr,status);
                    chain.pop();
                    return (chain,false);
                }
            }
        }
    }
    /// Find the complete chain that contains cluster `n`, by walking back to the head
    /// and then following forward.
    pub fn chain_containing(&self,n: usize) -> Result<Vec<usize>,DYNERR> {
        if !self.in_range(n) {
            return Err(Box::new(Error::ClusterRange));
        }
        match self.status(n) {
            ClusterStatus::Free | ClusterStatus::Bad | ClusterStatus::Reserved => return Ok(vec![n]),
            _ => {}
        }
        let mut visited = BitVec::from_elem(self.end,false);
        let mut head = n;
        visited.set(head,true);
        loop {
            let parent = (FIRST_DATA_CLUSTER..self.end).find(|c| self.status(*c)==ClusterStatus::Next(head));
            match parent {
                Some(p) if visited[p] => {
                    error!("backward walk loops at {}",p);
                    return Err(Box::new(Error::CorruptChain));
                },
                Some(p) => {
                    visited.set(p,true);
                    head = p;
                },
                None => break
            }
        }
        self.follow(head)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bios::bpb::BootSector;
    use crate::img::Preset;

    fn table() -> FatTable {
        FatTable::new(&BootSector::create(Preset::D35_1440,0).geometry())
    }

    #[test]
    fn media_markers() {
        let fat = table();
        assert_eq!(fat.to_bytes()[0..3],[0xf0,0xff,0xff]);
        assert_eq!(fat.end(),2849);
        assert_eq!(fat.num_free(),2847);
    }

    #[test]
    fn packing() {
        let mut fat = table();
        fat.set(2,0x123);
        fat.set(3,0x456);
        assert_eq!(fat.to_bytes()[3..6],[0x23,0x61,0x45]);
        assert_eq!(fat.get(2),0x123);
        assert_eq!(fat.get(3),0x456);
        for n in [2,3,100,101,2847,2848] {
            for v in [0x000,0x001,0x0ab,0x7ff,0xff7,0xfff] {
                fat.set(n,v);
                assert_eq!(fat.get(n),v);
            }
        }
        // neighbors unaffected
        fat.set(10,0xfff);
        fat.set(11,0);
        fat.set(12,0xabc);
        fat.set(11,0x555);
        assert_eq!(fat.get(10),0xfff);
        assert_eq!(fat.get(12),0xabc);
    }

    #[test]
    fn classify() {
        assert_eq!(ClusterStatus::classify(0),ClusterStatus::Free);
        assert_eq!(ClusterStatus::classify(1),ClusterStatus::Reserved);
        assert_eq!(ClusterStatus::classify(0xff3),ClusterStatus::Reserved);
        assert_eq!(ClusterStatus::classify(0xff7),ClusterStatus::Bad);
        assert_eq!(ClusterStatus::classify(0xff8),ClusterStatus::Last);
        assert_eq!(ClusterStatus::classify(0xfff),ClusterStatus::Last);
        assert_eq!(ClusterStatus::classify(0x2a),ClusterStatus::Next(0x2a));
    }

    #[test]
    fn allocate_and_free() {
        let mut fat = table();
        let a = fat.allocate(3).expect("alloc failed");
        assert_eq!(a,vec![2,3,4]);
        let b = fat.allocate(2).expect("alloc failed");
        assert_eq!(b,vec![5,6]);
        assert_eq!(fat.follow(2).expect("bad chain"),a);
        fat.free(&a);
        fat.free(&a);
        assert_eq!(fat.num_free(),2845);
        let c = fat.allocate(4).expect("alloc failed");
        assert_eq!(c,vec![2,3,4,7]);
        assert!(!is_contiguous(&c));
        assert_eq!(fat.follow(2).expect("bad chain"),c);
    }

    #[test]
    fn all_or_nothing() {
        let mut fat = table();
        let before = fat.to_bytes().to_vec();
        assert!(fat.allocate(2848).is_err());
        assert_eq!(fat.to_bytes(),&before[..]);
        assert!(fat.allocate(2847).is_ok());
        assert_eq!(fat.num_free(),0);
        assert!(fat.allocate(1).is_err());
    }

    #[test]
    fn contiguous_runs() {
        let mut fat = table();
        fat.allocate(5).expect("alloc failed");
        fat.free(&[3,5]);
        assert_eq!(fat.allocate_contiguous(1),Some(vec![3]));
        assert_eq!(fat.allocate_contiguous(2),Some(vec![7,8]));
        fat.free(&[4]);
        assert_eq!(fat.allocate_contiguous(2),Some(vec![9,10]));
    }

    #[test]
    fn corrupt_chains() {
        let mut fat = table();
        // cycle
        fat.set(2,3);
        fat.set(3,2);
        assert!(fat.follow(2).is_err());
        // free cluster mid-chain
        fat.set(3,4);
        fat.set(4,0);
        assert!(fat.follow(2).is_err());
        assert_eq!(fat.walk(2),(vec![2,3],false));
        // bad cluster mid-chain
        fat.set(4,0xff7);
        assert!(fat.follow(2).is_err());
        // out of range
        fat.set(4,0xf00);
        assert!(fat.follow(2).is_err());
        fat.mark_last(4);
        assert_eq!(fat.follow(2).expect("bad chain"),vec![2,3,4]);
        assert!(fat.follow(1).is_err());
        assert_eq!(fat.follow(0).expect("bad chain"),Vec::<usize>::new());
    }

    #[test]
    fn extend_and_truncate() {
        let mut fat = table();
        let a = fat.allocate(2).expect("alloc failed");
        fat.allocate(1).expect("alloc failed");
        fat.extend(3,2).expect("extend failed");
        let chain = fat.follow(2).expect("bad chain");
        assert_eq!(chain,vec![2,3,5,6]);
        fat.truncate(&chain,1);
        assert_eq!(fat.follow(2).expect("bad chain"),vec![2]);
        assert!(fat.is_free(3) && fat.is_free(5) && fat.is_free(6));
        assert_eq!(fat.chain_containing(2).expect("bad chain"),vec![a[0]]);
    }

    #[test]
    fn find_chain_head() {
        let mut fat = table();
        fat.allocate(2).expect("alloc failed");
        let c = fat.allocate(4).expect("alloc failed");
        assert_eq!(fat.chain_containing(6).expect("bad chain"),c);
        assert_eq!(fat.chain_containing(100).expect("bad chain"),vec![100]);
        assert!(fat.chain_containing(5000).is_err());
    }
}
