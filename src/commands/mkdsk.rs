use std::str::FromStr;
use log::{error,info};
use super::CommandError;
use crate::img::Preset;
use crate::settings::Settings;
use crate::STDRESULT;

pub fn mkdsk(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let path_to_img = super::required(cmd,"dimg")?;
    let preset = match cmd.get_one::<String>("kind") {
        Some(kind) => match Preset::from_str(kind) {
            Ok(p) => p,
            Err(e) => {
                error!("{}, choices are {}",e,Preset::all().map(|p| p.cli_name()).join(", "));
                return Err(Box::new(e));
            }
        },
        None => settings.preset
    };
    if std::path::Path::new(path_to_img).exists() && !cmd.get_flag("force") {
        error!("{} already exists, use --force to overwrite",path_to_img);
        return Err(Box::new(CommandError::FileExists));
    }
    let mut disk = crate::create_img(preset)?;
    info!("{}",preset.description());
    crate::save_img(&mut disk,path_to_img)
}
