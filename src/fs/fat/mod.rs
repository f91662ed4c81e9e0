//! ## FAT file system module
//!
//! The File Allocation Table (FAT) file system is named after the structure that
//! keeps track of allocated clusters.
//! The FAT itself is implemented in `crate::bios::fat`, this module makes use of the FAT
//! as part of managing the overall file system.
//! Only FAT12 floppy volumes are handled, there is no partition table.
//!
//! Every mutating operation either completes, or leaves the image as it was before the
//! call.  Data clusters are written before the directory slots that reference them, and
//! the buffered FAT is written to every FAT copy only once the operation has succeeded.
//! Upon failure the buffered FAT is reloaded from the image.

pub mod directory;
pub mod pack;
pub mod types;
pub mod display;
pub mod defrag;

use std::collections::{BTreeMap,HashSet,VecDeque};
use log::{trace,debug,info,warn,error};
use types::*;
use directory::*;
use crate::img;
use crate::img::Preset;
use crate::img::store::{SectorStore,MIN_SECTOR_SIZE};
use crate::bios;
use crate::bios::bpb::{BootSector,Geometry};
use crate::bios::fat::{FatTable,ClusterStatus,FIRST_DATA_CLUSTER};
use crate::fs::vfat;
use crate::{DYNERR,STDRESULT};

pub use types::{Error,Ptr,Attributes,TailPolicy};
pub use directory::{FileInfo,RawSlot};
pub use defrag::DefragReport;

/// A directory buffered along with what is needed to write it back.
pub struct DirLoc {
    /// starting cluster of the directory, if None this is the fixed root directory
    pub cluster1: Option<usize>,
    /// all clusters of a subdirectory, empty for the root
    chain: Vec<usize>,
    /// the entire directory as a vector of entries
    pub dir: Directory
}

/// How a cluster is being used, for the FAT viewer
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum ClusterUse {
    Free,
    Reserved,
    Bad,
    EndOfChain,
    Used
}

/// One row of the FAT viewer
#[derive(Clone,Debug)]
pub struct ClusterView {
    pub cluster: usize,
    pub value: u16,
    pub status: ClusterUse,
    pub owner: Option<String>
}

/// Result of walking the whole tree
#[derive(Clone,Debug,Default)]
pub struct ClusterMap {
    /// cluster to path of the owning file or directory
    pub owners: BTreeMap<usize,String>,
    /// paths whose chains are corrupt, only the valid prefix is in `owners`
    pub damaged: Vec<String>
}

/// The primary interface for disk operations.
pub struct Disk {
    store: SectorStore,
    boot_sector: BootSector,
    geometry: Geometry,
    fat: FatTable,
    policy: TailPolicy
}

/// Using nanos gives us about 30 bits of resolution for the volume serial number.
fn volume_id() -> u32 {
    chrono::Local::now().naive_local().and_utc().timestamp_subsec_nanos()
}

impl Disk {
    /// Create the file system from a sector store, which must start with a valid FAT12 boot sector.
    /// The Disk takes ownership of the store.
    pub fn from_store(mut store: SectorStore) -> Result<Self,DYNERR> {
        let sec0 = store.read(0,MIN_SECTOR_SIZE)?;
        let boot_sector = BootSector::parse(&sec0)?;
        let geometry = boot_sector.geometry();
        if geometry.total_bytes() > store.len() {
            error!("BPB describes {} bytes, image has {}",geometry.total_bytes(),store.len());
            return Err(Box::new(img::Error::ImageSizeMismatch));
        }
        if geometry.total_bytes() < store.len() {
            warn!("image has {} bytes beyond the volume",store.len()-geometry.total_bytes());
        }
        store.set_sec_size(geometry.bytes_per_sector)?;
        let fat_buf = store.read(geometry.fat_offset(0),geometry.fat_bytes())?;
        let fat = FatTable::from_bytes(&fat_buf,&geometry)?;
        debug!("opened volume with {} clusters, {} free",geometry.cluster_count(),fat.num_free());
        Ok(Self {
            store,
            boot_sector,
            geometry,
            fat,
            policy: TailPolicy::default()
        })
    }
    /// Create the file system from image bytes, e.g., as loaded from a file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self,DYNERR> {
        Self::from_store(SectorStore::from_bytes(bytes)?)
    }
    /// Create a freshly formatted volume.
    pub fn create(preset: Preset) -> Result<Self,DYNERR> {
        let boot_sector = BootSector::create(preset,volume_id());
        let geometry = boot_sector.geometry();
        let mut ans = Self {
            store: SectorStore::create(preset.byte_capacity()),
            fat: FatTable::new(&geometry),
            boot_sector,
            geometry,
            policy: TailPolicy::default()
        };
        ans.write_boot_sector()?;
        ans.commit_fat()?;
        info!("created {} volume",preset);
        Ok(ans)
    }
    /// Select how short names are generated for subsequent operations.
    pub fn set_tail_policy(&mut self,policy: TailPolicy) {
        self.policy = policy;
    }
    pub fn tail_policy(&self) -> TailPolicy {
        self.policy
    }
    pub fn store(&self) -> &SectorStore {
        &self.store
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        self.store.to_bytes()
    }
    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }
    pub fn mark_clean(&mut self) {
        self.store.mark_clean();
    }
    pub fn boot_sector(&self) -> &BootSector {
        &self.boot_sector
    }
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }
    pub fn fat(&self) -> &FatTable {
        &self.fat
    }
    fn write_boot_sector(&mut self) -> STDRESULT {
        let buf = self.boot_sector.to_bytes()?;
        self.store.write_sector(0,&buf)
    }
    /// Write the buffered FAT to every FAT copy.
    fn commit_fat(&mut self) -> STDRESULT {
        for i in 0..self.geometry.fat_count {
            self.store.write(self.geometry.fat_offset(i),self.fat.to_bytes())?;
        }
        trace!("FAT written to {} copies",self.geometry.fat_count);
        Ok(())
    }
    /// Throw away the buffered FAT and buffer the first copy from the image.
    fn reload_fat(&mut self) -> STDRESULT {
        let buf = self.store.read(self.geometry.fat_offset(0),self.geometry.fat_bytes())?;
        self.fat = FatTable::from_bytes(&buf,&self.geometry)?;
        Ok(())
    }
    /// Run `f`, if it fails restore the FAT buffer to the last committed state.
    fn transact<T,F>(&mut self,f: F) -> Result<T,DYNERR> where F: FnOnce(&mut Self) -> Result<T,DYNERR> {
        match f(self) {
            Ok(ans) => Ok(ans),
            Err(e) => {
                debug!("rolling back FAT after: {}",e);
                if let Err(e2) = self.reload_fat() {
                    error!("could not roll back FAT: {}",e2);
                }
                Err(e)
            }
        }
    }
    /// Rewrite the whole image with a new volume of the given capacity.  Destructive and irreversible.
    pub fn format(&mut self,preset: Preset) -> STDRESULT {
        self.store.resize_for_format(preset.byte_capacity())?;
        self.boot_sector = BootSector::create(preset,volume_id());
        self.geometry = self.boot_sector.geometry();
        self.fat = FatTable::new(&self.geometry);
        self.write_boot_sector()?;
        self.commit_fat()?;
        info!("formatted as {}",preset);
        Ok(())
    }
    /// Zero the FATs and root directory keeping the boot sector.  If `full`, zero the data region also.
    pub fn erase(&mut self,full: bool) -> STDRESULT {
        let fat_start = self.geometry.fat_offset(0);
        self.store.fill(fat_start,self.geometry.data_offset()-fat_start,0)?;
        if full {
            let data_start = self.geometry.data_offset();
            self.store.fill(data_start,self.geometry.total_bytes()-data_start,0)?;
        }
        self.fat = FatTable::new(&self.geometry);
        self.commit_fat()?;
        info!("erased volume");
        Ok(())
    }
    fn cluster_bytes(&self) -> usize {
        self.geometry.cluster_bytes()
    }
    fn read_chain_data(&self,chain: &[usize]) -> Result<Vec<u8>,DYNERR> {
        let mut ans = Vec::new();
        for c in chain {
            ans.append(&mut self.store.read(self.geometry.cluster_offset(*c),self.cluster_bytes())?);
        }
        Ok(ans)
    }
    /// Write `data` into the clusters of `chain`, zero padding the last cluster.
    fn write_chain_data(&mut self,chain: &[usize],data: &[u8]) -> STDRESULT {
        let cb = self.cluster_bytes();
        for (i,c) in chain.iter().enumerate() {
            let beg = usize::min(i*cb,data.len());
            let end = usize::min((i+1)*cb,data.len());
            let mut buf = data[beg..end].to_vec();
            buf.resize(cb,0);
            self.store.write(self.geometry.cluster_offset(*c),&buf)?;
        }
        Ok(())
    }
    /// Buffer the directory starting at `cluster1`, or the root if None
    fn read_dir(&self,cluster1: Option<usize>) -> Result<DirLoc,DYNERR> {
        match cluster1 {
            None => {
                let buf = self.store.read(self.geometry.root_dir_offset(),self.geometry.root_dir_bytes())?;
                Ok(DirLoc { cluster1, chain: Vec::new(), dir: Directory::from_bytes(&buf) })
            },
            Some(c) => {
                let chain = self.fat.follow(c)?;
                let buf = self.read_chain_data(&chain)?;
                Ok(DirLoc { cluster1, chain, dir: Directory::from_bytes(&buf) })
            }
        }
    }
    /// byte offset of slot `idx` in the image
    fn slot_offset(&self,loc: &DirLoc,idx: usize) -> Result<usize,DYNERR> {
        match loc.cluster1 {
            None => match idx < self.geometry.root_entry_count {
                true => Ok(self.geometry.root_dir_offset() + idx*DIR_ENTRY_SIZE),
                false => Err(Box::new(img::Error::OutOfRange))
            },
            Some(_) => {
                let per_cluster = self.cluster_bytes()/DIR_ENTRY_SIZE;
                match loc.chain.get(idx/per_cluster) {
                    Some(c) => Ok(self.geometry.cluster_offset(*c) + (idx%per_cluster)*DIR_ENTRY_SIZE),
                    None => Err(Box::new(img::Error::OutOfRange))
                }
            }
        }
    }
    /// Write slots from the directory buffer to the image
    fn write_slots<I: IntoIterator<Item=usize>>(&mut self,loc: &DirLoc,slots: I) -> STDRESULT {
        for idx in slots {
            let offset = self.slot_offset(loc,idx)?;
            self.store.write(offset,&loc.dir.get_raw(&Ptr::Entry(idx)))?;
        }
        Ok(())
    }
    /// Update an entry in the buffer and write it to the image
    fn write_entry(&mut self,loc: &mut DirLoc,idx: usize,entry: &Entry) -> STDRESULT {
        loc.dir.set_entry(&Ptr::Entry(idx),entry)?;
        self.write_slots(loc,[idx])
    }
    /// Place long name records followed by the short entry starting at slot `start`,
    /// and write them all to the image.
    fn write_entry_group(&mut self,loc: &mut DirLoc,start: usize,lfn: &[vfat::LfnEntry],entry: &Entry) -> STDRESULT {
        for (i,rec) in lfn.iter().enumerate() {
            loc.dir.set_raw(&Ptr::Entry(start+i),rec.to_bytes()?);
        }
        loc.dir.set_entry(&Ptr::Entry(start+lfn.len()),entry)?;
        self.write_slots(loc,start..=start+lfn.len())
    }
    /// Grow a subdirectory by enough clusters to hold `slots` more entries.
    /// Only the FAT buffer is changed, and the new clusters are zeroed.
    fn extend_dir(&mut self,loc: &mut DirLoc,slots: usize) -> STDRESULT {
        let last = match (loc.cluster1,loc.chain.last()) {
            (Some(_),Some(last)) => *last,
            _ => {
                error!("root directory cannot grow");
                return Err(Box::new(Error::RootDirectoryFull));
            }
        };
        let per_cluster = self.cluster_bytes()/DIR_ENTRY_SIZE;
        let count = (slots + per_cluster - 1)/per_cluster;
        let added = self.fat.extend(last,count)?;
        for c in &added {
            self.store.fill(self.geometry.cluster_offset(*c),self.cluster_bytes(),0)?;
        }
        debug!("directory grows by {} clusters",added.len());
        loc.chain.extend(added);
        loc.dir.expand(count*per_cluster);
        Ok(())
    }
    /// Find (or make) a run of `count` free slots, returning the first one.
    fn reserve_slots(&mut self,loc: &mut DirLoc,count: usize) -> Result<usize,DYNERR> {
        if let Some(start) = loc.dir.free_run(count) {
            return Ok(start);
        }
        if loc.cluster1.is_none() {
            error!("no run of {} free slots in root directory",count);
            return Err(Box::new(Error::RootDirectoryFull));
        }
        let trailing = loc.dir.trailing_free();
        let start = loc.dir.num_entries() - trailing;
        self.extend_dir(loc,count - trailing)?;
        Ok(start)
    }
    /// Put path as [subdir,subdir,...,last].  The root is the empty vector.
    /// Path is always absolute, starting and ending slash is optional.
    fn normalize_path(&self,path: &str) -> Result<Vec<String>,DYNERR> {
        let trimmed = path.trim().trim_start_matches('/').trim_end_matches('/');
        if trimmed.len()==0 {
            return Ok(Vec::new());
        }
        let nodes: Vec<String> = trimmed.split('/').map(|s| s.to_string()).collect();
        if nodes.iter().any(|s| s.len()==0) {
            error!("empty path node not allowed");
            return Err(Box::new(Error::Syntax));
        }
        Ok(nodes)
    }
    /// split the path into its parent nodes and the last node (file or directory)
    fn split_path(&self,path: &str) -> Result<(Vec<String>,String),DYNERR> {
        let mut nodes = self.normalize_path(path)?;
        match nodes.pop() {
            Some(name) => Ok((nodes,name)),
            None => {
                error!("path {} has no file name",path);
                Err(Box::new(Error::FileNotFound))
            }
        }
    }
    /// Descend from the root through `nodes`, each of which must be a directory.
    fn goto_dir(&self,nodes: &[String]) -> Result<DirLoc,DYNERR> {
        let mut loc = self.read_dir(None)?;
        for node in nodes {
            if node=="." {
                continue;
            }
            if node==".." && loc.cluster1.is_none() {
                continue;
            }
            let files = loc.dir.build_files()?;
            let finfo = match get_file(node,&files) {
                Some(f) => f,
                None => {
                    debug!("{} not found",node);
                    return Err(Box::new(Error::FileNotFound));
                }
            };
            if !finfo.is_dir() {
                error!("{} is not a directory",node);
                return Err(Box::new(Error::NotADirectory));
            }
            loc = match finfo.cluster1 {
                0 => self.read_dir(None)?,
                c => self.read_dir(Some(c))?
            };
        }
        Ok(loc)
    }
    fn goto_path_dir(&self,path: &str) -> Result<DirLoc,DYNERR> {
        let nodes = self.normalize_path(path)?;
        self.goto_dir(&nodes)
    }
    /// Find the directory containing `path` and the file info of `path` itself.
    fn locate(&self,path: &str) -> Result<(DirLoc,FileInfo),DYNERR> {
        let (parent,name) = self.split_path(path)?;
        if name=="." || name==".." {
            error!("dot entries cannot be targeted");
            return Err(Box::new(Error::Syntax));
        }
        let loc = self.goto_dir(&parent)?;
        let files = loc.dir.build_files()?;
        match get_file(&name,&files) {
            Some(finfo) => {
                let finfo = finfo.clone();
                Ok((loc,finfo))
            },
            None => {
                debug!("{} not found",name);
                Err(Box::new(Error::FileNotFound))
            }
        }
    }
    /// Check a new name and produce the raw short name and long name records.
    /// `skip` is a short name to disregard during collision checks (the entry being renamed).
    fn prepare_names(&self,loc: &DirLoc,name: &str,skip: Option<usize>) -> Result<([u8;11],Vec<vfat::LfnEntry>),DYNERR> {
        if !vfat::is_long_name_valid(name) || name=="." || name==".." {
            error!("invalid file name {}",name);
            return Err(Box::new(Error::Syntax));
        }
        let files = loc.dir.build_files()?;
        if files.iter().any(|f| Some(f.idx)!=skip && f.matches(name)) {
            error!("{} already exists",name);
            return Err(Box::new(Error::DuplicateFile));
        }
        let existing: Vec<[u8;11]> = match skip {
            Some(idx) => {
                let own = loc.dir.get_entry(&Ptr::Entry(idx))?.raw_name();
                loc.dir.short_names().into_iter().filter(|n| *n!=own).collect()
            },
            None => loc.dir.short_names()
        };
        let short = generate_short_name(name,&existing,self.policy)?;
        let lfn = match vfat::needs_long_name(name,&short) {
            true => vfat::encode_long_name(name,&short)?,
            false => Vec::new()
        };
        debug!("{} gets short name {} with {} long name records",name,pack::file_name_to_string(&short),lfn.len());
        Ok((short,lfn))
    }
    fn file_info_at(&self,loc: &DirLoc,idx: usize) -> Result<FileInfo,DYNERR> {
        match loc.dir.build_files()?.into_iter().find(|f| f.idx==idx) {
            Some(finfo) => Ok(finfo),
            None => Err(Box::new(Error::FileNotFound))
        }
    }
    /// Follow a file's chain and check it against the file size
    fn file_chain(&self,finfo: &FileInfo) -> Result<Vec<usize>,DYNERR> {
        let chain = self.fat.follow(finfo.cluster1)?;
        let expected = (finfo.eof + self.cluster_bytes() - 1)/self.cluster_bytes();
        if chain.len()!=expected {
            error!("{} has {} clusters but its size requires {}",finfo.name,chain.len(),expected);
            return Err(Box::new(bios::Error::CorruptChain));
        }
        Ok(chain)
    }
    /// Get the volume label from the root directory, or from the boot sector,
    /// if there is no label it is set to "NO NAME" per MS docs
    pub fn label(&self) -> Result<String,DYNERR> {
        let root = self.read_dir(None)?;
        if let Some(entry) = root.dir.find_label() {
            return Ok(entry.name());
        }
        match self.boot_sector.label() {
            Some(lab) => Ok(pack::label_to_string(lab)),
            None => Ok("NO NAME".to_string())
        }
    }
    /// List the directory at `path` in order of appearance, including dot entries
    pub fn list(&self,path: &str) -> Result<Vec<FileInfo>,DYNERR> {
        let loc = self.goto_path_dir(path)?;
        loc.dir.build_files()
    }
    /// Slot level view of the directory at `path`
    pub fn raw_directory(&self,path: &str) -> Result<Vec<RawSlot>,DYNERR> {
        let loc = self.goto_path_dir(path)?;
        loc.dir.raw_slots()
    }
    /// Find an entry in the directory at `dir_path` by its raw short name
    pub fn find_by_short_name(&self,dir_path: &str,short: &[u8;11]) -> Result<Option<FileInfo>,DYNERR> {
        let loc = self.goto_path_dir(dir_path)?;
        Ok(loc.dir.build_files()?.into_iter().find(|f| f.short_name==*short))
    }
    /// Short name that adding `name` to `dir_path` would produce, the image is not changed
    pub fn predict_short_name(&self,dir_path: &str,name: &str,policy: TailPolicy) -> Result<String,DYNERR> {
        let loc = self.goto_path_dir(dir_path)?;
        let short = generate_short_name(name,&loc.dir.short_names(),policy)?;
        Ok(pack::file_name_to_string(&short))
    }
    /// Add a file at `path` with contents `data`.  The parent directory must exist.
    /// If `time` is None the local time is used for the stamps.
    pub fn add_file(&mut self,path: &str,data: &[u8],time: Option<chrono::NaiveDateTime>) -> Result<FileInfo,DYNERR> {
        if data.len() > u32::MAX as usize {
            error!("file too large");
            return Err(Box::new(bios::Error::DiskFull));
        }
        self.transact(|disk| {
            let (parent,name) = disk.split_path(path)?;
            let mut loc = disk.goto_dir(&parent)?;
            let (short,lfn) = disk.prepare_names(&loc,&name,None)?;
            let start = disk.reserve_slots(&mut loc,lfn.len()+1)?;
            let count = (data.len() + disk.cluster_bytes() - 1)/disk.cluster_bytes();
            let chain = disk.fat.allocate(count)?;
            disk.write_chain_data(&chain,data)?;
            let mut entry = Entry::create(short,Attributes::ARCHIVE,time);
            entry.set_cluster(chain.first().copied().unwrap_or(0));
            entry.set_eof(data.len());
            disk.write_entry_group(&mut loc,start,&lfn,&entry)?;
            disk.commit_fat()?;
            info!("added {} ({} bytes, {} clusters)",name,data.len(),chain.len());
            disk.file_info_at(&loc,start+lfn.len())
        })
    }
    /// Create a subdirectory at `path`.  The parent directory must exist.
    pub fn mkdir(&mut self,path: &str,time: Option<chrono::NaiveDateTime>) -> Result<FileInfo,DYNERR> {
        self.transact(|disk| {
            let (parent,name) = disk.split_path(path)?;
            let mut loc = disk.goto_dir(&parent)?;
            let (short,lfn) = disk.prepare_names(&loc,&name,None)?;
            let start = disk.reserve_slots(&mut loc,lfn.len()+1)?;
            let chain = disk.fat.allocate(1)?;
            let (dot,dotdot) = Entry::create_dots(chain[0],loc.cluster1.unwrap_or(0),time);
            let mut sub = Directory::new();
            sub.expand(disk.cluster_bytes()/DIR_ENTRY_SIZE);
            sub.set_entry(&Ptr::Entry(0),&dot)?;
            sub.set_entry(&Ptr::Entry(1),&dotdot)?;
            disk.write_chain_data(&chain,&sub.to_bytes())?;
            let mut entry = Entry::create(short,Attributes::DIRECTORY,time);
            entry.set_cluster(chain[0]);
            disk.write_entry_group(&mut loc,start,&lfn,&entry)?;
            disk.commit_fat()?;
            info!("created directory {}",name);
            disk.file_info_at(&loc,start+lfn.len())
        })
    }
    /// Free the chain and commit the FAT, then mark the entry and its long name deleted.
    fn remove_entry(&mut self,loc: &mut DirLoc,finfo: &FileInfo) -> STDRESULT {
        let (chain,intact) = self.fat.walk(finfo.cluster1);
        if !intact {
            warn!("{} has a damaged chain, freeing the first {} clusters",finfo.name,chain.len());
        }
        self.fat.free(&chain);
        self.commit_fat()?;
        for idx in finfo.slots() {
            loc.dir.mark_deleted(&Ptr::Entry(idx));
        }
        self.write_slots(loc,finfo.slots())?;
        debug!("deleted {} and freed {} clusters",finfo.name,chain.len());
        Ok(())
    }
    /// Delete the file at `path`.  Empty directories can also be deleted this way.
    pub fn delete(&mut self,path: &str) -> STDRESULT {
        let (mut loc,finfo) = self.locate(path)?;
        if finfo.is_dir() {
            return self.delete_directory(path,false);
        }
        self.remove_entry(&mut loc,&finfo)?;
        info!("deleted {}",path);
        Ok(())
    }
    /// Delete the directory at `path`.  If it has contents, `recursive` must be true,
    /// in which case everything below it is deleted depth first.
    pub fn delete_directory(&mut self,path: &str,recursive: bool) -> STDRESULT {
        let (mut loc,finfo) = self.locate(path)?;
        if !finfo.is_dir() {
            error!("{} is not a directory",path);
            return Err(Box::new(Error::NotADirectory));
        }
        if finfo.cluster1 < FIRST_DATA_CLUSTER {
            error!("directory {} has no clusters",path);
            return Err(Box::new(bios::Error::CorruptChain));
        }
        let sub = self.read_dir(Some(finfo.cluster1))?;
        let children = sub.dir.build_files()?.into_iter().filter(|f| !f.is_dot()).count();
        if children > 0 && !recursive {
            error!("cannot delete directory with {} files",children);
            return Err(Box::new(Error::DirectoryNotEmpty));
        }
        let mut ancestors = vec![finfo.cluster1];
        self.check_tree(finfo.cluster1,&mut ancestors)?;
        self.delete_contents(finfo.cluster1)?;
        self.remove_entry(&mut loc,&finfo)?;
        info!("deleted directory {}",path);
        Ok(())
    }
    /// Read every directory below `cluster1` without changing anything.
    /// Fails if a directory chain is broken or the tree loops.
    fn check_tree(&self,cluster1: usize,ancestors: &mut Vec<usize>) -> STDRESULT {
        let loc = self.read_dir(Some(cluster1))?;
        for child in loc.dir.build_files()?.into_iter().filter(|f| !f.is_dot()) {
            if child.is_dir() && child.cluster1 >= FIRST_DATA_CLUSTER {
                if ancestors.contains(&child.cluster1) {
                    error!("directory tree loops back at cluster {}",child.cluster1);
                    return Err(Box::new(bios::Error::CorruptChain));
                }
                ancestors.push(child.cluster1);
                self.check_tree(child.cluster1,ancestors)?;
                ancestors.pop();
            }
        }
        Ok(())
    }
    /// Depth first removal, the tree must have passed `check_tree`
    fn delete_contents(&mut self,cluster1: usize) -> STDRESULT {
        let mut loc = self.read_dir(Some(cluster1))?;
        for child in loc.dir.build_files()?.into_iter().filter(|f| !f.is_dot()) {
            if child.is_dir() && child.cluster1 >= FIRST_DATA_CLUSTER {
                self.delete_contents(child.cluster1)?;
            }
            self.remove_entry(&mut loc,&child)?;
        }
        Ok(())
    }
    /// Give the file or directory at `path` the new name `new_name` within the same directory.
    /// The short name is regenerated, slots are reused in place when the new names fit.
    pub fn rename(&mut self,path: &str,new_name: &str) -> Result<FileInfo,DYNERR> {
        self.transact(|disk| {
            let (mut loc,finfo) = disk.locate(path)?;
            let (short,lfn) = disk.prepare_names(&loc,new_name,Some(finfo.idx))?;
            let mut entry = loc.dir.get_entry(&Ptr::Entry(finfo.idx))?;
            entry.set_raw_name(short);
            if !finfo.is_dir() {
                entry.set_attributes(entry.attributes() | Attributes::ARCHIVE);
            }
            let old: Vec<usize> = finfo.slots().collect();
            let start = match lfn.len()+1 <= old.len() {
                true => old[0],
                false => {
                    for idx in &old {
                        loc.dir.mark_deleted(&Ptr::Entry(*idx));
                    }
                    disk.reserve_slots(&mut loc,lfn.len()+1)?
                }
            };
            let new_range = start..=start+lfn.len();
            for idx in &old {
                if !new_range.contains(idx) {
                    loc.dir.mark_deleted(&Ptr::Entry(*idx));
                }
            }
            disk.write_entry_group(&mut loc,start,&lfn,&entry)?;
            disk.write_slots(&loc,old.into_iter().filter(|i| !new_range.contains(i)))?;
            disk.commit_fat()?;
            info!("renamed {} to {}",path,new_name);
            disk.file_info_at(&loc,start+lfn.len())
        })
    }
    /// is the directory at `target` the directory starting at `cluster1`, or below it
    fn is_within(&self,target: &DirLoc,cluster1: usize) -> Result<bool,DYNERR> {
        let mut curr = match target.cluster1 {
            Some(c) => c,
            None => return Ok(false)
        };
        let mut visited = HashSet::new();
        loop {
            if curr==cluster1 {
                return Ok(true);
            }
            if !visited.insert(curr) {
                error!("parent links loop at cluster {}",curr);
                return Err(Box::new(bios::Error::CorruptChain));
            }
            let loc = self.read_dir(Some(curr))?;
            let parent = loc.dir.build_files()?.into_iter().find(|f| f.short_name==pack::DOTDOT);
            curr = match parent {
                Some(p) if p.cluster1 >= FIRST_DATA_CLUSTER => p.cluster1,
                _ => return Ok(false)
            };
        }
    }
    /// Move the file or directory at `path` into the directory at `dest_dir`.
    /// The short name is regenerated if it collides in the destination.
    pub fn move_entry(&mut self,path: &str,dest_dir: &str) -> Result<FileInfo,DYNERR> {
        self.transact(|disk| {
            let (mut src,finfo) = disk.locate(path)?;
            let mut dest = disk.goto_path_dir(dest_dir)?;
            if dest.cluster1==src.cluster1 {
                debug!("source and destination are the same directory");
                return Ok(finfo);
            }
            if finfo.is_dir() && disk.is_within(&dest,finfo.cluster1)? {
                error!("cannot move {} into itself",path);
                return Err(Box::new(Error::InvalidMove));
            }
            // a moved directory is read up front, nothing is written if it is damaged
            let mut parent_link: Option<(DirLoc,usize,Entry)> = None;
            if finfo.is_dir() {
                if finfo.cluster1 < FIRST_DATA_CLUSTER {
                    error!("directory {} has no clusters",path);
                    return Err(Box::new(bios::Error::CorruptChain));
                }
                let moved = disk.read_dir(Some(finfo.cluster1))?;
                if let Some(dotdot) = moved.dir.build_files()?.into_iter().find(|f| f.short_name==pack::DOTDOT) {
                    let dotdot_entry = moved.dir.get_entry(&Ptr::Entry(dotdot.idx))?;
                    parent_link = Some((moved,dotdot.idx,dotdot_entry));
                }
            }
            let (short,lfn) = disk.prepare_names(&dest,&finfo.name,None)?;
            let mut entry = src.dir.get_entry(&Ptr::Entry(finfo.idx))?;
            entry.set_raw_name(short);
            let start = disk.reserve_slots(&mut dest,lfn.len()+1)?;
            disk.write_entry_group(&mut dest,start,&lfn,&entry)?;
            for idx in finfo.slots() {
                src.dir.mark_deleted(&Ptr::Entry(idx));
            }
            disk.write_slots(&src,finfo.slots())?;
            if let Some((mut moved,idx,mut dotdot_entry)) = parent_link {
                dotdot_entry.set_cluster(dest.cluster1.unwrap_or(0));
                disk.write_entry(&mut moved,idx,&dotdot_entry)?;
            }
            disk.commit_fat()?;
            info!("moved {} to {}",path,dest_dir);
            disk.file_info_at(&dest,start+lfn.len())
        })
    }
    /// Read the contents of the file at `path`.  The chain must agree with the file size.
    pub fn extract(&self,path: &str) -> Result<Vec<u8>,DYNERR> {
        let (_loc,finfo) = self.locate(path)?;
        if finfo.is_dir() {
            error!("{} is a directory",path);
            return Err(Box::new(Error::IsADirectory));
        }
        let chain = self.file_chain(&finfo)?;
        let mut ans = self.read_chain_data(&chain)?;
        ans.truncate(finfo.eof);
        Ok(ans)
    }
    /// Add `data` to the end of the file at `path`, extending its chain as needed.
    pub fn append(&mut self,path: &str,data: &[u8],time: Option<chrono::NaiveDateTime>) -> Result<FileInfo,DYNERR> {
        self.transact(|disk| {
            let (mut loc,finfo) = disk.locate(path)?;
            if finfo.is_dir() {
                return Err(Box::new(Error::IsADirectory));
            }
            let cb = disk.cluster_bytes();
            let mut chain = disk.file_chain(&finfo)?;
            let new_len = finfo.eof + data.len();
            if new_len > u32::MAX as usize {
                return Err(Box::new(bios::Error::DiskFull));
            }
            let needed = (new_len + cb - 1)/cb - chain.len();
            let added = match chain.last() {
                Some(last) => disk.fat.extend(*last,needed)?,
                None => disk.fat.allocate(needed)?
            };
            chain.extend(added);
            // rewrite from the partial cluster onward
            let first = finfo.eof/cb;
            let mut buf = match finfo.eof%cb {
                0 => Vec::new(),
                partial => disk.store.read(disk.geometry.cluster_offset(chain[first]),partial)?
            };
            buf.extend_from_slice(data);
            disk.write_chain_data(&chain[first..],&buf)?;
            let mut entry = loc.dir.get_entry(&Ptr::Entry(finfo.idx))?;
            entry.set_cluster(chain.first().copied().unwrap_or(0));
            entry.set_eof(new_len);
            entry.set_attributes(entry.attributes() | Attributes::ARCHIVE);
            entry.stamp(time);
            disk.write_entry(&mut loc,finfo.idx,&entry)?;
            disk.commit_fat()?;
            info!("appended {} bytes to {}",data.len(),path);
            disk.file_info_at(&loc,finfo.idx)
        })
    }
    /// Shorten the file at `path` to `len` bytes, freeing clusters no longer needed.
    pub fn truncate(&mut self,path: &str,len: usize,time: Option<chrono::NaiveDateTime>) -> Result<FileInfo,DYNERR> {
        self.transact(|disk| {
            let (mut loc,finfo) = disk.locate(path)?;
            if finfo.is_dir() {
                return Err(Box::new(Error::IsADirectory));
            }
            if len > finfo.eof {
                error!("cannot truncate {} bytes to {}",finfo.eof,len);
                return Err(Box::new(Error::Syntax));
            }
            let chain = disk.file_chain(&finfo)?;
            let keep = (len + disk.cluster_bytes() - 1)/disk.cluster_bytes();
            disk.fat.truncate(&chain,keep);
            disk.commit_fat()?;
            let mut entry = loc.dir.get_entry(&Ptr::Entry(finfo.idx))?;
            if keep==0 {
                entry.set_cluster(0);
            }
            entry.set_eof(len);
            entry.set_attributes(entry.attributes() | Attributes::ARCHIVE);
            entry.stamp(time);
            disk.write_entry(&mut loc,finfo.idx,&entry)?;
            info!("truncated {} to {} bytes",path,len);
            disk.file_info_at(&loc,finfo.idx)
        })
    }
    /// Set or clear attribute bits, `None` leaves a bit as is.
    /// The directory and volume bits cannot be changed.
    pub fn set_attributes(&mut self,path: &str,read_only: Option<bool>,hidden: Option<bool>,system: Option<bool>,archive: Option<bool>) -> Result<FileInfo,DYNERR> {
        let (mut loc,finfo) = self.locate(path)?;
        let mut entry = loc.dir.get_entry(&Ptr::Entry(finfo.idx))?;
        let mut attr = entry.attributes();
        for (maybe,flag) in [(read_only,Attributes::READ_ONLY),(hidden,Attributes::HIDDEN),(system,Attributes::SYSTEM),(archive,Attributes::ARCHIVE)] {
            if let Some(on) = maybe {
                attr.set(flag,on);
            }
        }
        entry.set_attributes(attr);
        self.write_entry(&mut loc,finfo.idx,&entry)?;
        self.file_info_at(&loc,finfo.idx)
    }
    /// free space in bytes
    pub fn free_space(&self) -> usize {
        self.fat.num_free()*self.cluster_bytes()
    }
    /// bytes actually consumed by a file of `bytes` bytes
    pub fn size_on_disk(&self,bytes: usize) -> usize {
        let cb = self.cluster_bytes();
        (bytes + cb - 1)/cb*cb
    }
    /// Friendly name of the format, e.g. "1.44M"
    pub fn format_name(&self) -> String {
        match self.boot_sector.preset() {
            Some(preset) => preset.to_string(),
            None => format!("{}K",self.geometry.total_bytes()/1024)
        }
    }
    /// Find the complete chain containing `cluster`
    pub fn chain_containing(&self,cluster: usize) -> Result<Vec<usize>,DYNERR> {
        self.fat.chain_containing(cluster)
    }
    /// Walk the tree breadth first, associating every cluster in use with a path.
    pub fn cluster_map(&self) -> Result<ClusterMap,DYNERR> {
        let mut ans = ClusterMap::default();
        let mut visited: HashSet<usize> = HashSet::new();
        let mut queue: VecDeque<(String,Option<usize>)> = VecDeque::new();
        queue.push_back(("/".to_string(),None));
        while let Some((path,cluster1)) = queue.pop_front() {
            let dir = match cluster1 {
                None => self.read_dir(None)?.dir,
                Some(c) => {
                    let (chain,intact) = self.fat.walk(c);
                    if !intact {
                        ans.damaged.push(path.clone());
                    }
                    for n in &chain {
                        ans.owners.insert(*n,path.clone());
                    }
                    Directory::from_bytes(&self.read_chain_data(&chain)?)
                }
            };
            for finfo in dir.build_files()? {
                if finfo.is_dot() || finfo.cluster1 < FIRST_DATA_CLUSTER {
                    continue;
                }
                let child = [path.as_str(),finfo.name.as_str()].concat();
                if finfo.is_dir() {
                    if visited.insert(finfo.cluster1) {
                        queue.push_back((child + "/",Some(finfo.cluster1)));
                    }
                    continue;
                }
                let (chain,intact) = self.fat.walk(finfo.cluster1);
                if !intact {
                    warn!("{} has a corrupt chain",child);
                    ans.damaged.push(child.clone());
                }
                for n in chain {
                    ans.owners.insert(n,child.clone());
                }
            }
        }
        Ok(ans)
    }
    /// Per cluster status for visualization, the owner is found by walking the tree.
    pub fn fat_table_view(&self) -> Result<Vec<ClusterView>,DYNERR> {
        let map = self.cluster_map()?;
        let mut ans = Vec::new();
        for n in FIRST_DATA_CLUSTER..self.fat.end() {
            let status = match self.fat.status(n) {
                ClusterStatus::Free => ClusterUse::Free,
                ClusterStatus::Reserved => ClusterUse::Reserved,
                ClusterStatus::Bad => ClusterUse::Bad,
                ClusterStatus::Last => ClusterUse::EndOfChain,
                ClusterStatus::Next(_) => ClusterUse::Used
            };
            ans.push(ClusterView {
                cluster: n,
                value: self.fat.get(n),
                status,
                owner: map.owners.get(&n).cloned()
            });
        }
        Ok(ans)
    }
    /// Collect every file (not directory) in the tree as (directory start, file info), breadth first.
    fn all_files(&self) -> Result<Vec<(Option<usize>,FileInfo)>,DYNERR> {
        let mut ans = Vec::new();
        let mut visited: HashSet<usize> = HashSet::new();
        let mut queue: VecDeque<Option<usize>> = VecDeque::new();
        queue.push_back(None);
        while let Some(cluster1) = queue.pop_front() {
            let loc = self.read_dir(cluster1)?;
            for finfo in loc.dir.build_files()? {
                if finfo.is_dot() {
                    continue;
                }
                match finfo.is_dir() {
                    true => if finfo.cluster1 >= FIRST_DATA_CLUSTER && visited.insert(finfo.cluster1) {
                        queue.push_back(Some(finfo.cluster1));
                    },
                    false => ans.push((cluster1,finfo))
                }
            }
        }
        Ok(ans)
    }
}
