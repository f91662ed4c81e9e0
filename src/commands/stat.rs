use crate::fs::fat::display;
use crate::settings::Settings;
use crate::STDRESULT;

pub fn catalog(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let path_in_img = cmd.get_one::<String>("file").map(|s| s.as_str()).unwrap_or("/");
    let (disk,_) = super::open_disk(cmd,settings)?;
    if cmd.get_flag("raw") {
        display::raw_dir(&disk.raw_directory(path_in_img)?);
        return Ok(());
    }
    let files = disk.list(path_in_img)?;
    display::dir(path_in_img,&disk.label()?,&files,cmd.get_flag("wide"),disk.free_space());
    Ok(())
}

pub fn stat(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let (disk,_) = super::open_disk(cmd,settings)?;
    let indent = cmd.get_one::<u16>("indent").copied();
    let mut obj = json::parse(&disk.boot_sector().to_json(None))?;
    obj["label"] = json::JsonValue::String(disk.label()?);
    obj["freeBytes"] = disk.free_space().into();
    obj["capacity"] = json::JsonValue::String(disk.format_name());
    let s = match indent {
        Some(spaces) => json::stringify_pretty(obj,spaces),
        None => json::stringify(obj)
    };
    println!("{}",s);
    Ok(())
}

pub fn fatmap(cmd: &clap::ArgMatches,settings: &Settings) -> STDRESULT {
    let (disk,_) = super::open_disk(cmd,settings)?;
    let view = disk.fat_table_view()?;
    if cmd.get_flag("console") || (atty::is(atty::Stream::Stdout) && cmd.get_one::<u16>("indent").is_none()) {
        display::fat_map(&view);
    } else {
        println!("{}",display::fat_json(&view,cmd.get_one::<u16>("indent").copied()));
    }
    Ok(())
}
