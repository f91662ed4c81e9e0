use clap::{value_parser, crate_version, Arg, ArgAction, ArgGroup, Command, ValueHint};

const PATH_HELP: &str = "paths inside the image always use the forward slash,
any component can be given as the long name or the short name, case is ignored";
const PRESET_HELP: &str = "capacities: 360k, 720k, 1.2m, 1.44m, 1.68m (dmf), 2.88m,
the long forms such as 3.5in-1440k are also accepted";

fn file_arg(help: &'static str, req: bool) -> Arg {
    Arg::new("file").short('f').long("file").value_name("PATH").required(req).help(help)
}

fn indent_arg() -> Arg {
    Arg::new("indent").long("indent").help("JSON indentation, omit to minify")
        .value_name("SPACES")
        .value_parser(value_parser!(u16).range(0..16))
        .required(false)
}

fn dimg_arg() -> Arg {
    Arg::new("dimg").short('d').long("dimg").help("path to disk image itself")
        .value_name("PATH")
        .value_hint(ValueHint::FilePath)
        .required(true)
}

fn console_arg() -> Arg {
    Arg::new("console").long("console").help("format for console unconditionally")
        .required(false)
        .action(ArgAction::SetTrue)
        .long_help("even if the output context is a file or pipe, format it for the console")
}

fn flag_pair(cmd: Command, name: &'static str, no_name: &'static str, help: &'static str, no_help: &'static str) -> Command {
    cmd.arg(Arg::new(name).long(name).help(help).action(ArgAction::SetTrue))
        .arg(Arg::new(no_name).long(no_name).help(no_help).action(ArgAction::SetTrue).conflicts_with(name))
}

pub fn build_cli() -> Command {
    let long_help = "fat12kit is always invoked with exactly one of several subcommands.
Changes are written back to the image only if the subcommand succeeds.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
create image:          `fat12kit mkdsk -k 1.44m -d floppy.img`
list root directory:   `fat12kit catalog -d floppy.img`
copy into image:       `fat12kit put -f \"/My Song.mid\" -d floppy.img < song.mid`
copy out of image:     `fat12kit get -f /MYSONG~1.MID -d floppy.img > song.mid`
make it contiguous:    `fat12kit defrag -d floppy.img`";

    let mut main_cmd = Command::new("fat12kit")
        .about("Manipulates FAT12 floppy disk images.")
        .after_long_help(long_help)
        .version(crate_version!())
        .arg(Arg::new("settings").long("settings").value_name("PATH").help("JSON settings file")
            .value_hint(ValueHint::FilePath)
            .global(true)
            .required(false))
        .arg(Arg::new("plain").long("plain").help("short names by plain truncation")
            .long_help("derive short names by truncating to 8 characters, a numeric tail is added only upon collision")
            .action(ArgAction::SetTrue)
            .global(true));

    main_cmd = main_cmd.subcommand(
        Command::new("mkdsk")
            .arg(Arg::new("kind").long("kind").short('k').value_name("CAPACITY").help("capacity of the disk")
                .long_help(PRESET_HELP)
                .required(false))
            .arg(Arg::new("dimg").long("dimg").short('d').value_name("PATH").help("disk image path to create")
                .value_hint(ValueHint::FilePath)
                .required(true))
            .arg(Arg::new("force").long("force").help("overwrite an existing file").action(ArgAction::SetTrue))
            .visible_alias("mkimg")
            .about("write a new formatted disk image to the given path")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("catalog")
            .arg(file_arg("path of directory inside disk image",false))
            .arg(dimg_arg())
            .arg(Arg::new("wide").long("wide").short('w').help("names only, several to a row").action(ArgAction::SetTrue))
            .arg(Arg::new("raw").long("raw").help("show every directory slot").action(ArgAction::SetTrue))
            .group(ArgGroup::new("style").multiple(false).args(["wide","raw"]))
            .visible_alias("ls")
            .visible_alias("dir")
            .about("write disk image catalog to stdout")
            .after_help(PATH_HELP)
    );
    main_cmd = main_cmd.subcommand(
        Command::new("get")
            .arg(file_arg("path of file inside disk image",true))
            .arg(dimg_arg())
            .about("read from disk image, write to stdout")
            .after_help(PATH_HELP)
    );
    main_cmd = main_cmd.subcommand(
        Command::new("put")
            .arg(file_arg("path of file inside disk image",true))
            .arg(dimg_arg())
            .arg(Arg::new("force").long("force").help("replace an existing file").action(ArgAction::SetTrue))
            .about("read from stdin, write to disk image")
            .after_help(PATH_HELP)
    );
    main_cmd = main_cmd.subcommand(
        Command::new("mkdir")
            .arg(file_arg("path inside disk image of new directory",true))
            .arg(dimg_arg())
            .about("create a new directory inside a disk image")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("delete")
            .arg(file_arg("path inside disk image to delete",true))
            .arg(dimg_arg())
            .arg(Arg::new("recursive").long("recursive").short('r').help("delete directory contents also").action(ArgAction::SetTrue))
            .visible_alias("del")
            .visible_alias("era")
            .about("delete a file or directory inside a disk image")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("rename")
            .arg(file_arg("path inside disk image to rename",true))
            .arg(Arg::new("name").long("name").short('n').value_name("NAME").help("new name").required(true))
            .arg(dimg_arg())
            .about("rename a file or directory inside a disk image")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("move")
            .arg(file_arg("path inside disk image to move",true))
            .arg(Arg::new("to").long("to").short('t').value_name("DIR").help("destination directory").required(true))
            .arg(dimg_arg())
            .visible_alias("mv")
            .about("move a file or directory to another directory inside a disk image")
    );
    let mut attr_cmd = Command::new("attr")
        .arg(file_arg("path inside disk image",true))
        .arg(dimg_arg())
        .about("set or clear attributes of a file or directory inside a disk image");
    attr_cmd = flag_pair(attr_cmd,"ro","no-ro","set read only","clear read only");
    attr_cmd = flag_pair(attr_cmd,"hidden","no-hidden","set hidden","clear hidden");
    attr_cmd = flag_pair(attr_cmd,"system","no-system","set system","clear system");
    attr_cmd = flag_pair(attr_cmd,"archive","no-archive","set archive","clear archive");
    main_cmd = main_cmd.subcommand(attr_cmd);
    main_cmd = main_cmd.subcommand(
        Command::new("defrag")
            .arg(dimg_arg())
            .about("make every file occupy a contiguous run of clusters")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("erase")
            .arg(dimg_arg())
            .arg(Arg::new("full").long("full").help("zero the data region also").action(ArgAction::SetTrue))
            .about("empty the volume, keeping the boot sector")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("stat")
            .arg(dimg_arg())
            .arg(indent_arg())
            .about("write boot sector and volume information to stdout as JSON")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("fatmap")
            .arg(dimg_arg())
            .arg(indent_arg())
            .arg(console_arg())
            .about("write the allocation table to stdout")
            .after_help("the console form is a grid of symbols, otherwise the output is JSON")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("completions")
            .arg(Arg::new("shell").long("shell").short('s').value_name("SHELL").help("type of shell")
                .value_parser(["bash","elvish","fish","powershell","zsh"])
                .required(true))
            .about("write shell completions to stdout")
    );
    main_cmd
}
