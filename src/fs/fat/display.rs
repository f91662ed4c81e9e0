//! ### FAT Display Module
//!
//! This module is concerned with displaying the directory and the allocation table.

use colored::{Colorize,ColoredString};
use super::directory::{FileInfo,RawSlot};
use super::types::Attributes;
use super::{ClusterView,ClusterUse};

fn colorize(finfo: &FileInfo,s: &str) -> ColoredString {
    let attr = finfo.attributes;
    match (attr.contains(Attributes::DIRECTORY),attr.contains(Attributes::SYSTEM),attr.contains(Attributes::READ_ONLY),attr.contains(Attributes::HIDDEN)) {
        (true,_,_,_) => s.blue().bold(),
        (_,true,_,_) => s.bold(),
        (_,_,true,true) => s.red().dimmed(),
        (_,_,true,false) => s.red(),
        (_,_,false,true) => s.dimmed(),
        _ => s.normal()
    }
}

/// base and extension of the short name, as MS-DOS prints them
fn format_name(finfo: &FileInfo) {
    let short = finfo.short_string();
    let (base,typ) = match short.rfind('.') {
        Some(idx) if idx > 0 => (short[0..idx].to_string(),short[idx+1..].to_string()),
        _ => (short,String::new())
    };
    print!("{:8} {:3}",colorize(finfo,&base),colorize(finfo,&typ));
}

/// Display basic directory table cell.
fn dir_table(finfo: &FileInfo,count: &mut usize,cols: usize) {
    if *count%cols>0 {
        print!("    ");
    }
    format_name(finfo);
    if *count%cols==cols-1 {
        println!();
    }
    *count += 1;
}

/// Display one line of directory listing, the long name goes at the end as in later DOS versions
fn dir_line(finfo: &FileInfo,count: &mut usize) {
    format_name(finfo);
    if finfo.is_dir() {
        print!(" <DIR>     ");
    } else {
        print!(" {:8}  ",finfo.eof);
    }
    if let Some(t) = finfo.write_date {
        print!("{}   ",t.format("%m-%d-%y").to_string());
        if let Some(t) = finfo.write_time {
            print!("{}",t.format("%H:%M").to_string());
        }
    }
    if let Some(long) = &finfo.long_name {
        print!("  {}",colorize(finfo,long));
    }
    println!();
    *count += 1;
}

/// Display FAT directory, either in normal or `wide` mode.
/// This will behave like MS-DOS, except for color highlights and long names.
pub fn dir(path: &str,vol_lab: &str,files: &[FileInfo],wide: bool,free: usize) {
    println!();
    if vol_lab!="NO NAME" {
        println!(" Volume in drive A is {}",vol_lab.blue().bold());
    } else {
        println!(" Volume in drive A has no label")
    }
    let displ_path = if !path.starts_with("/") {
        "/".to_string() + path
    } else {
        path.to_string()
    }.replace("/","\\").to_uppercase();
    println!(" Directory of A:{}",&displ_path);
    println!();
    let mut count = 0;
    if wide {
        for finfo in files {
            dir_table(finfo,&mut count,5);
        }
        if count % 5 > 0 {
            println!();
        }
    } else {
        for finfo in files {
            dir_line(finfo,&mut count);
        }
    }
    if count==0 {
        println!("No File");
    }
    println!("{:9} File(s)   {} bytes free",count,free);
    println!();
}

/// Display every slot of a directory, including deleted slots and long name records.
/// Slots after the end marker are not shown.
pub fn raw_dir(slots: &[RawSlot]) {
    for (i,slot) in slots.iter().enumerate() {
        match slot {
            RawSlot::End => {
                println!("{:4} {}",i,"end".dimmed());
                break;
            },
            RawSlot::Deleted => println!("{:4} {}",i,"deleted".dimmed()),
            RawSlot::LongName { seq, last, checksum, text } => {
                let flag = match *last { true => "*", false => " " };
                println!("{:4} LFN {:2}{} {:02X} {}",i,seq,flag,checksum,text.cyan());
            },
            RawSlot::Short { name, attributes, cluster, size } => {
                println!("{:4} {:12} {:02X} {:5} {}",i,name,attributes.bits(),cluster,size);
            }
        }
    }
}

fn cluster_symbol(status: ClusterUse) -> ColoredString {
    match status {
        ClusterUse::Free => ".".dimmed(),
        ClusterUse::Reserved => "R".yellow(),
        ClusterUse::Bad => "B".red().bold(),
        ClusterUse::EndOfChain => "E".green(),
        ClusterUse::Used => "#".green()
    }
}

/// Display the allocation table as a grid of symbols, 64 clusters to a row
pub fn fat_map(view: &[ClusterView]) {
    const COLS: usize = 64;
    for row in view.chunks(COLS) {
        if let Some(first) = row.first() {
            print!("{:4} ",first.cluster);
        }
        for cell in row {
            print!("{}",cluster_symbol(cell.status));
        }
        println!();
    }
    println!();
    println!("{} free, {} used, {} bad",
        view.iter().filter(|c| c.status==ClusterUse::Free).count(),
        view.iter().filter(|c| c.status==ClusterUse::Used || c.status==ClusterUse::EndOfChain).count(),
        view.iter().filter(|c| c.status==ClusterUse::Bad).count());
}

/// Per cluster view as a JSON string
pub fn fat_json(view: &[ClusterView],indent: Option<u16>) -> String {
    let mut items = Vec::new();
    for cell in view {
        let mut obj = json::JsonValue::new_object();
        obj["cluster"] = cell.cluster.into();
        obj["value"] = json::JsonValue::String(format!("{:03X}",cell.value));
        obj["status"] = match cell.status {
            ClusterUse::Free => "free",
            ClusterUse::Reserved => "reserved",
            ClusterUse::Bad => "bad",
            ClusterUse::EndOfChain => "eoc",
            ClusterUse::Used => "used"
        }.into();
        if let Some(owner) = &cell.owner {
            obj["owner"] = json::JsonValue::String(owner.clone());
        }
        items.push(obj);
    }
    let ans = json::JsonValue::Array(items);
    match indent {
        Some(spaces) => json::stringify_pretty(ans,spaces),
        None => json::stringify(ans)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fat_as_json() {
        let view = vec![
            ClusterView { cluster: 2, value: 0x003, status: ClusterUse::Used, owner: Some("/A.TXT".to_string()) },
            ClusterView { cluster: 3, value: 0xfff, status: ClusterUse::EndOfChain, owner: Some("/A.TXT".to_string()) },
            ClusterView { cluster: 4, value: 0, status: ClusterUse::Free, owner: None }
        ];
        let parsed = json::parse(&fat_json(&view,None)).expect("bad json");
        assert_eq!(parsed.len(),3);
        assert_eq!(parsed[0]["status"],"used");
        assert_eq!(parsed[1]["value"],"FFF");
        assert_eq!(parsed[1]["owner"],"/A.TXT");
        assert!(parsed[2]["owner"].is_null());
    }
}
