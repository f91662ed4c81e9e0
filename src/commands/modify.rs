use log::info;
use super::CommandError;
use crate::settings::Settings;
use crate::STDRESULT;

pub fn mkdir(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let path_in_img = super::required(cmd,"file")?;
    let (mut disk,path_to_img) = super::open_disk(cmd,settings)?;
    disk.mkdir(path_in_img,None)?;
    crate::save_img(&mut disk,&path_to_img)
}

pub fn delete(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let path_in_img = super::required(cmd,"file")?;
    let (mut disk,path_to_img) = super::open_disk(cmd,settings)?;
    if settings.confirm_delete && !super::confirm(&format!("delete {}?",path_in_img))? {
        return Err(Box::new(CommandError::Cancelled));
    }
    match cmd.get_flag("recursive") {
        true => disk.delete_directory(path_in_img,true)?,
        false => disk.delete(path_in_img)?
    }
    crate::save_img(&mut disk,&path_to_img)
}

pub fn rename(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let path_in_img = super::required(cmd,"file")?;
    let name = super::required(cmd,"name")?;
    let (mut disk,path_to_img) = super::open_disk(cmd,settings)?;
    let finfo = disk.rename(path_in_img,name)?;
    info!("short name is {}",finfo.short_string());
    crate::save_img(&mut disk,&path_to_img)
}

pub fn move_entry(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let path_in_img = super::required(cmd,"file")?;
    let dest = super::required(cmd,"to")?;
    let (mut disk,path_to_img) = super::open_disk(cmd,settings)?;
    disk.move_entry(path_in_img,dest)?;
    crate::save_img(&mut disk,&path_to_img)
}

/// `Some(true)` if the flag is given, `Some(false)` if the negated flag is given
fn tri_state(cmd: &clap::ArgMatches,on: &str,off: &str) -> Option<bool> {
    match (cmd.get_flag(on),cmd.get_flag(off)) {
        (true,_) => Some(true),
        (_,true) => Some(false),
        _ => None
    }
}

pub fn attr(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let path_in_img = super::required(cmd,"file")?;
    let (mut disk,path_to_img) = super::open_disk(cmd,settings)?;
    disk.set_attributes(path_in_img,
        tri_state(cmd,"ro","no-ro"),
        tri_state(cmd,"hidden","no-hidden"),
        tri_state(cmd,"system","no-system"),
        tri_state(cmd,"archive","no-archive"))?;
    crate::save_img(&mut disk,&path_to_img)
}

pub fn defrag(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let (mut disk,path_to_img) = super::open_disk(cmd,settings)?;
    let report = disk.defragment()?;
    eprintln!("{} moved, {} already contiguous, {} skipped",report.moved,report.contiguous,report.skipped);
    crate::save_img(&mut disk,&path_to_img)
}

pub fn erase(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let (mut disk,path_to_img) = super::open_disk(cmd,settings)?;
    if settings.confirm_delete && !super::confirm(&format!("erase every file on {}?",path_to_img))? {
        return Err(Box::new(CommandError::Cancelled));
    }
    disk.erase(cmd.get_flag("full"))?;
    crate::save_img(&mut disk,&path_to_img)
}
