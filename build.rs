use std::collections::HashMap;
use clap::ValueEnum;

include!("src/cli.rs");

/// Map each subcommand that has visible aliases, in the form zsh prints case labels, e.g. `(catalog)`
fn alias_table(cmd: &Command) -> HashMap<String,Vec<String>> {
    let mut ans = HashMap::new();
    for sub in cmd.get_subcommands() {
        let aliases: Vec<String> = sub.get_visible_aliases().map(|a| format!("({})",a)).collect();
        if aliases.len() > 0 {
            ans.insert(format!("({})",sub.get_name()),aliases);
        }
    }
    ans
}

/// zsh completions do not pick up subcommand aliases, so each subcommand's case block
/// is repeated under every alias.  Also `--opt=[` becomes `--opt+[`.
fn refine_zsh(script: &str,aliases: &HashMap<String,Vec<String>>) -> String {
    let eq_patt = regex::RegexBuilder::new(r"^'--(\w+)=\[").multi_line(true).build().expect("regex parsing error");
    let label_patt = regex::Regex::new(r"^\(\w+\)$").expect("regex parsing error");
    let intermediate = eq_patt.replace_all(script, "'--$1+[");
    let mut new_script = String::new();
    // (case label, lines of the block so far)
    let mut block: Option<(String,String)> = None;
    for line in intermediate.lines() {
        if let Some(label) = label_patt.find(line).map(|m| m.as_str()) {
            if aliases.contains_key(label) {
                block = Some((label.to_string(),format!("{}\n",line)));
                continue;
            }
        }
        match block.as_mut() {
            Some((label,lines)) => {
                lines.push_str(line);
                lines.push('\n');
                if line==";;" {
                    new_script += lines.as_str();
                    for alias in aliases.get(label.as_str()).map(|v| v.as_slice()).unwrap_or(&[]) {
                        new_script += &lines.replace(label.as_str(),alias);
                    }
                    block = None;
                }
            },
            None => {
                new_script += line;
                new_script += "\n";
            }
        }
    }
    new_script
}

fn main() -> Result<(), std::io::Error> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    if std::env::var("DOCS_RS").is_ok() {
        return Ok(());
    }
    let outdir = match std::env::var_os("CARGO_MANIFEST_DIR") {
        None => return Ok(()),
        Some(root) => std::path::Path::new(&root).join("completions"),
    };
    std::fs::create_dir_all(&outdir)?;

    let mut cmd = build_cli();
    let aliases = alias_table(&cmd);

    for &shell in clap_complete::Shell::value_variants() {
        let path = clap_complete::generate_to(shell, &mut cmd, "fat12kit", &outdir)?;
        if shell==clap_complete::Shell::Zsh {
            let script = String::from_utf8_lossy(&std::fs::read(&path)?).to_string();
            std::fs::write(&path,refine_zsh(&script,&aliases))?;
        }
    }

    Ok(())
}
