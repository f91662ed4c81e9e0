//! # Command Line Interface
//!
//! The command tree is built in `cli.rs`, which is shared with `build.rs`.
//! Subcommands are run by the `commands` module of the library.

use env_logger;
#[cfg(windows)]
use colored;
use log::error;
use fat12kit::commands;
use fat12kit::commands::CommandError;

mod cli;

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    #[cfg(windows)]
    let _ = colored::control::set_virtual_terminal(true);
    let main_cmd = cli::build_cli();
    let matches = main_cmd.clone().get_matches();
    let settings = commands::get_settings(&matches)?;

    match matches.subcommand() {
        Some(("mkdsk",cmd)) => commands::mkdsk::mkdsk(cmd,&settings),
        Some(("catalog",cmd)) => commands::stat::catalog(cmd,&settings),
        Some(("get",cmd)) => commands::get::get(cmd,&settings),
        Some(("put",cmd)) => commands::put::put(cmd,&settings),
        Some(("mkdir",cmd)) => commands::modify::mkdir(cmd,&settings),
        Some(("delete",cmd)) => commands::modify::delete(cmd,&settings),
        Some(("rename",cmd)) => commands::modify::rename(cmd,&settings),
        Some(("move",cmd)) => commands::modify::move_entry(cmd,&settings),
        Some(("attr",cmd)) => commands::modify::attr(cmd,&settings),
        Some(("defrag",cmd)) => commands::modify::defrag(cmd,&settings),
        Some(("erase",cmd)) => commands::modify::erase(cmd,&settings),
        Some(("stat",cmd)) => commands::stat::stat(cmd,&settings),
        Some(("fatmap",cmd)) => commands::stat::fatmap(cmd,&settings),
        Some(("completions",cmd)) => commands::completions::generate(main_cmd,cmd),
        _ => {
            error!("No subcommand was found, try `fat12kit --help`");
            Err(Box::new(CommandError::InvalidCommand))
        }
    }
}
