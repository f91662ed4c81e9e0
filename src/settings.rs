//! # Settings
//!
//! Options that modify the behavior of the front end and of short name generation.
//! Settings are loaded from a JSON document, only keys that are present are changed.
//!
//! ```json
//! {
//!     "numericTail": true,
//!     "preset": "1.44M",
//!     "confirmDelete": true,
//!     "confirmReplace": true
//! }
//! ```

use std::str::FromStr;
use log::{debug,warn};
use crate::fs::fat::TailPolicy;
use crate::img::Preset;
use crate::DYNERR;

#[derive(Clone,Copy,Debug,PartialEq)]
pub struct Settings {
    /// how short names are derived from long names
    pub short_names: TailPolicy,
    /// capacity of new images
    pub preset: Preset,
    /// ask before deleting
    pub confirm_delete: bool,
    /// ask before replacing an existing file
    pub confirm_replace: bool
}

impl Settings {
    pub fn new() -> Self {
        Self {
            short_names: TailPolicy::Windows,
            preset: Preset::D35_1440,
            confirm_delete: true,
            confirm_replace: true
        }
    }
    /// Update from a JSON string, unknown keys are ignored, bad values are skipped with a warning.
    pub fn parse(&mut self,json_str: &str) -> Result<(),DYNERR> {
        let root: serde_json::Value = serde_json::from_str(json_str)?;
        let obj = match root.as_object() {
            Some(obj) => obj,
            None => {
                warn!("settings must be a JSON object");
                return Err(Box::new(crate::commands::CommandError::InvalidCommand));
            }
        };
        for (key,val) in obj {
            match key.as_str() {
                "numericTail" => match val.as_bool() {
                    Some(true) => self.short_names = TailPolicy::Windows,
                    Some(false) => self.short_names = TailPolicy::Plain,
                    None => warn!("numericTail should be a boolean")
                },
                "preset" => match val.as_str().map(Preset::from_str) {
                    Some(Ok(preset)) => self.preset = preset,
                    _ => warn!("preset should be a capacity such as 1.44M")
                },
                "confirmDelete" => match val.as_bool() {
                    Some(b) => self.confirm_delete = b,
                    None => warn!("confirmDelete should be a boolean")
                },
                "confirmReplace" => match val.as_bool() {
                    Some(b) => self.confirm_replace = b,
                    None => warn!("confirmReplace should be a boolean")
                },
                _ => debug!("ignoring setting {}",key)
            }
        }
        Ok(())
    }
}

/// Settings starting from the defaults and updated from `json_str`
pub fn parse(json_str: &str) -> Result<Settings,DYNERR> {
    let mut ans = Settings::new();
    ans.parse(json_str)?;
    Ok(ans)
}
