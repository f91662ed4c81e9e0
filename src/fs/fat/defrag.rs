//! ### Defragmentation
//!
//! Files are visited in order of their current starting cluster.  A fragmented file is copied
//! into the lowest free run that can hold it, the directory entry is pointed at the copy, and
//! only then is the old chain freed.  If the process stops between files, every file is intact
//! either in its old location or its new one.

use log::{debug,info,warn};
use super::Disk;
use super::types::Ptr;
use crate::bios::fat::is_contiguous;
use crate::DYNERR;

/// Outcome of a defragmentation pass
#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct DefragReport {
    /// files relocated into a contiguous run
    pub moved: usize,
    /// files that were contiguous already
    pub contiguous: usize,
    /// files left in place, either because no run was big enough or the chain is damaged
    pub skipped: usize
}

impl Disk {
    /// Make every file's chain a single ascending run where space permits.
    /// Directories keep their clusters.
    pub fn defragment(&mut self) -> Result<DefragReport,DYNERR> {
        self.defragment_some(usize::MAX)
    }
    /// Same as `defragment`, but stop after `limit` relocations.
    pub fn defragment_some(&mut self,limit: usize) -> Result<DefragReport,DYNERR> {
        let mut report = DefragReport::default();
        let mut files = self.all_files()?;
        files.retain(|(_,f)| f.cluster1 > 0);
        files.sort_by_key(|(_,f)| f.cluster1);
        for (dir_cluster,finfo) in files {
            if report.moved >= limit {
                debug!("stopping after {} relocations",report.moved);
                break;
            }
            let old = match self.fat.follow(finfo.cluster1) {
                Ok(chain) => chain,
                Err(e) => {
                    warn!("skipping {}: {}",finfo.name,e);
                    report.skipped += 1;
                    continue;
                }
            };
            if is_contiguous(&old) {
                report.contiguous += 1;
                continue;
            }
            let data = self.read_chain_data(&old)?;
            let new = match self.fat.allocate_contiguous(old.len()) {
                Some(chain) => chain,
                None => {
                    warn!("no run of {} free clusters for {}, leaving it fragmented",old.len(),finfo.name);
                    report.skipped += 1;
                    continue;
                }
            };
            self.transact(|disk| {
                disk.write_chain_data(&new,&data)?;
                disk.commit_fat()?;
                let mut loc = disk.read_dir(dir_cluster)?;
                let mut entry = loc.dir.get_entry(&Ptr::Entry(finfo.idx))?;
                entry.set_cluster(new[0]);
                disk.write_entry(&mut loc,finfo.idx,&entry)?;
                disk.fat.free(&old);
                disk.commit_fat()
            })?;
            debug!("{} moved from cluster {} to {}",finfo.name,old[0],new[0]);
            report.moved += 1;
        }
        info!("defragmentation moved {}, {} already contiguous, {} skipped",report.moved,report.contiguous,report.skipped);
        Ok(report)
    }
}
