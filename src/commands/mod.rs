//! # CLI Subcommands
//!
//! Contains modules that run the subcommands.
//! Each runner loads the image, performs one operation, and saves the image only if the
//! operation succeeded.

pub mod mkdsk;
pub mod put;
pub mod get;
pub mod modify;
pub mod stat;
pub mod completions;

use log::error;
use crate::settings::Settings;
use crate::fs::fat::{Disk,TailPolicy};
use crate::DYNERR;

#[derive(thiserror::Error,Debug)]
pub enum CommandError {
    #[error("Command could not be interpreted")]
    InvalidCommand,
    #[error("One of the parameters was out of range")]
    OutOfRange,
    #[error("Input source is not supported")]
    UnsupportedFormat,
    #[error("File already exists")]
    FileExists,
    #[error("Operation was cancelled")]
    Cancelled
}

/// Get a string argument that clap should have required.
pub fn required<'a>(cmd: &'a clap::ArgMatches,id: &str) -> Result<&'a str,DYNERR> {
    match cmd.get_one::<String>(id) {
        Some(s) => Ok(s.as_str()),
        None => {
            error!("missing argument `{}`",id);
            Err(Box::new(CommandError::InvalidCommand))
        }
    }
}

/// Load settings from `--settings` if given, then apply `--plain`.
pub fn get_settings(cmd: &clap::ArgMatches) -> Result<Settings,DYNERR> {
    let mut ans = match cmd.get_one::<String>("settings") {
        Some(path) => {
            let json_str = std::fs::read_to_string(path)?;
            crate::settings::parse(&json_str)?
        },
        None => Settings::new()
    };
    if cmd.get_flag("plain") {
        ans.short_names = TailPolicy::Plain;
    }
    Ok(ans)
}

/// Open the image named by `--dimg` and apply the settings
pub fn open_disk(cmd: &clap::ArgMatches,settings: &Settings) -> Result<(Disk,String),DYNERR> {
    let path_to_img = required(cmd,"dimg")?;
    let mut disk = crate::open_img(path_to_img)?;
    disk.set_tail_policy(settings.short_names);
    Ok((disk,path_to_img.to_string()))
}

/// Ask a yes or no question on the console, anything but `y` is no.
/// If stdin is not a console the answer is yes.
pub fn confirm(prompt: &str) -> Result<bool,DYNERR> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(true);
    }
    eprint!("{} [y/N] ",prompt);
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().to_lowercase()=="y")
}
