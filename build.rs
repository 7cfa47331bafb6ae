// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn name_arg(help: &'static str) -> Arg {
    Arg::new("name").required(true).help(help)
}

fn build_cli() -> Command {
    Command::new("packshift")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Switch between saved sets of add-on components")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file"),
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("DIR")
                .global(true)
                .help("Managed root directory (overrides the configuration)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Enable debug logging"),
        )
        .subcommand(Command::new("list").about("List saved packs"))
        .subcommand(
            Command::new("show")
                .about("Show the components recorded in a pack")
                .arg(name_arg("Pack name")),
        )
        .subcommand(
            Command::new("save")
                .about("Save the live components as a pack")
                .arg(name_arg("Pack name"))
                .arg(
                    Arg::new("description")
                        .short('d')
                        .long("description")
                        .default_value("")
                        .help("Pack description"),
                ),
        )
        .subcommand(
            Command::new("load")
                .about("Switch the live components to a pack")
                .arg(name_arg("Pack name"))
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Close a running host application without asking"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Delete a saved pack")
                .arg(name_arg("Pack name")),
        )
        .subcommand(Command::new("recover").about("Recover from an interrupted switch"))
        .subcommand(
            Command::new("deps")
                .about("Show the dependency closure of a component")
                .arg(Arg::new("component").required(true).help("Component identifier")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("packshift.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
