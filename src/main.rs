// src/main.rs

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use packshift::PackshiftConfig;
use tracing_subscriber::EnvFilter;

fn load_config(cli: &Cli) -> Result<PackshiftConfig> {
    let mut config =
        PackshiftConfig::discover(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        return commands::cmd_completions(*shell);
    }

    let config = load_config(&cli)?;
    match command {
        Commands::List => commands::cmd_list(&config),
        Commands::Show { name } => commands::cmd_show(&config, name),
        Commands::Save { name, description } => commands::cmd_save(&config, name, description),
        Commands::Load { name, yes } => commands::cmd_load(&config, name, *yes),
        Commands::Remove { name } => commands::cmd_remove(&config, name),
        Commands::Recover => commands::cmd_recover(&config),
        Commands::Deps { component } => commands::cmd_deps(&config, component),
        Commands::Completions { shell } => commands::cmd_completions(*shell),
    }
}
