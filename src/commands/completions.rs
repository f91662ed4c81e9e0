use clap_complete::shells;
use log::error;
use super::CommandError;
use crate::STDRESULT;

pub fn generate(mut main_cmd: clap::Command,cmd: &clap::ArgMatches) -> STDRESULT {
    let shell = super::required(cmd,"shell")?;
    let out = &mut std::io::stdout();
    match shell {
        "bash" => clap_complete::generate(shells::Bash,&mut main_cmd,"fat12kit",out),
        "elvish" => clap_complete::generate(shells::Elvish,&mut main_cmd,"fat12kit",out),
        "fish" => clap_complete::generate(shells::Fish,&mut main_cmd,"fat12kit",out),
        "powershell" => clap_complete::generate(shells::PowerShell,&mut main_cmd,"fat12kit",out),
        "zsh" => clap_complete::generate(shells::Zsh,&mut main_cmd,"fat12kit",out),
        _ => {
            error!("unexpected shell {}",shell);
            return Err(Box::new(CommandError::InvalidCommand));
        }
    }
    Ok(())
}
