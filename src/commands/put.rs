use std::io::Read;
use log::{error,info};
use super::CommandError;
use crate::fs::fat;
use crate::settings::Settings;
use crate::STDRESULT;

pub fn put(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    if atty::is(atty::Stream::Stdin) {
        error!("cannot use `put` with console input, please pipe something in");
        return Err(Box::new(CommandError::InvalidCommand));
    }
    let dest_path = super::required(cmd,"file")?;
    let mut file_data = Vec::new();
    std::io::stdin().read_to_end(&mut file_data)?;
    let (mut disk,path_to_img) = super::open_disk(cmd,settings)?;
    match disk.add_file(dest_path,&file_data,None) {
        Ok(finfo) => info!("stored as {}",finfo.short_string()),
        Err(e) if e.downcast_ref::<fat::Error>()==Some(&fat::Error::DuplicateFile) => {
            if settings.confirm_replace && !cmd.get_flag("force") {
                error!("{} exists, use --force to replace it",dest_path);
                return Err(e);
            }
            info!("replacing {}",dest_path);
            disk.delete(dest_path)?;
            disk.add_file(dest_path,&file_data,None)?;
        },
        Err(e) => return Err(e)
    }
    crate::save_img(&mut disk,&path_to_img)
}
