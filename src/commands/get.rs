use std::io::Write;
use crate::settings::Settings;
use crate::STDRESULT;

pub fn get(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let src_path = super::required(cmd,"file")?;
    let (disk,_) = super::open_disk(cmd,settings)?;
    let object = disk.extract(src_path)?;
    let mut out = std::io::stdout();
    out.write_all(&object)?;
    out.flush()?;
    Ok(())
}
