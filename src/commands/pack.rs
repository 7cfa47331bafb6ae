// src/commands/pack.rs
//! Pack commands: list, show, save, load, remove

use super::progress::SwitchProgress;
use anyhow::{Context, Result};
use packshift::{
    DirectoryInstaller, HostMonitor, JsonCatalog, NoHost, PackManager, PackshiftConfig,
    ProcessMonitor, RootLock,
};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::info;

type CliManager = PackManager<JsonCatalog, DirectoryInstaller, Box<dyn HostMonitor>>;

/// Build the manager from the configured catalog, cache and host process
pub(crate) fn open_manager(config: &PackshiftConfig, assume_yes: bool) -> Result<CliManager> {
    let catalog_path = config.catalog_path();
    let catalog = JsonCatalog::load(&catalog_path)
        .with_context(|| format!("Failed to load catalog {}", catalog_path.display()))?;
    let installer = DirectoryInstaller::new(config.component_cache());

    let host: Box<dyn HostMonitor> = match &config.host_process {
        Some(executable) => Box::new(ProcessMonitor::new(executable.clone(), move |name| {
            assume_yes || ask_to_close(name)
        })),
        None => Box::new(NoHost),
    };

    PackManager::open(config, catalog, installer, host)
        .with_context(|| format!("Failed to open managed root {}", config.root.display()))
}

fn ask_to_close(name: &str) -> bool {
    print!("{} is running. Close it and continue? [y/N] ", name);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn lock_root(config: &PackshiftConfig) -> Result<RootLock> {
    RootLock::acquire(&config.root).context("Another packshift command is running")
}

/// List all packs
pub fn cmd_list(config: &PackshiftConfig) -> Result<()> {
    info!("Listing packs...");
    let manager = open_manager(config, false)?;
    let packs = manager.list_packs();

    for skipped in manager.registry().skipped() {
        println!("Skipped folder {}: {}", skipped.folder, skipped.reason);
    }

    if packs.is_empty() {
        println!("No packs saved.");
        println!("\nSave the current components with `packshift save <name>`.");
        return Ok(());
    }

    println!("Packs:");
    println!(" {:24}  {:>10}  DESCRIPTION", "NAME", "COMPONENTS");
    println!("{}", "-".repeat(70));

    for pack in packs {
        let active_marker = if manager.active_pack() == Some(pack.name.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{}{:24}  {:>10}  {}",
            active_marker,
            pack.name,
            pack.installed.len(),
            pack.description
        );
    }

    println!();
    println!("* = active pack");
    println!("Total: {} pack(s)", packs.len());
    Ok(())
}

/// Show details of one pack
pub fn cmd_show(config: &PackshiftConfig, name: &str) -> Result<()> {
    let manager = open_manager(config, false)?;
    let pack = manager
        .find_pack(name)
        .ok_or_else(|| anyhow::anyhow!("Pack '{}' not found", name))?;

    println!("Pack {}", pack.name);
    println!("{}", "=".repeat(40));
    if !pack.description.is_empty() {
        println!("Description: {}", pack.description);
    }
    println!(
        "Active:      {}",
        if manager.active_pack() == Some(name) { "Yes" } else { "No" }
    );

    let installed = &pack.installed;
    if !installed.mods.is_empty() {
        println!("\nCatalog components ({}):", installed.mods.len());
        for (id, metadata) in &installed.mods {
            match metadata.get("version").and_then(|v| v.as_str()) {
                Some(version) => println!("  {} {}", id, version),
                None => println!("  {}", id),
            }
        }
    }
    if !installed.not_in_catalog_mods.is_empty() {
        println!(
            "\nOther components ({}):",
            installed.not_in_catalog_mods.len()
        );
        for id in installed.not_in_catalog_mods.keys() {
            println!("  {}", id);
        }
    }
    if installed.is_empty() {
        println!("\nNo components.");
    }

    Ok(())
}

/// Save the live folder as a pack
pub fn cmd_save(config: &PackshiftConfig, name: &str, description: &str) -> Result<()> {
    let _lock = lock_root(config)?;
    let mut manager = open_manager(config, false)?;
    let replacing = manager.find_pack(name).is_some();

    let pack = manager
        .save_pack(name, description)
        .with_context(|| format!("Failed to save pack '{}'", name))?;

    println!(
        "{} pack {} ({} components)",
        if replacing { "Replaced" } else { "Saved" },
        pack.name,
        pack.installed.len()
    );
    Ok(())
}

/// Switch to a pack
pub fn cmd_load(config: &PackshiftConfig, name: &str, assume_yes: bool) -> Result<()> {
    let _lock = lock_root(config)?;
    let progress = Arc::new(SwitchProgress::new(name));
    let mut manager = open_manager(config, assume_yes)?.with_progress(progress);

    let outcome = match manager.load_pack(name) {
        Ok(outcome) => outcome,
        Err(e) if e.is_unrecoverable() => {
            return Err(anyhow::Error::new(e).context(
                "The managed root may be inconsistent; run `packshift recover` before anything else",
            ));
        }
        Err(e) => return Err(anyhow::Error::new(e).context(format!("Failed to load pack '{}'", name))),
    };

    println!("Switched to pack {}", outcome.pack);
    if !outcome.installed.is_empty() {
        println!("  Installed: {}", outcome.installed.join(", "));
    }
    if !outcome.dropped.is_empty() {
        println!("  Dropped (not in catalog): {}", outcome.dropped.join(", "));
    }
    if !outcome.pruned.is_empty() {
        println!("  Removed: {}", outcome.pruned.join(", "));
    }
    if !outcome.pruned_dependencies.is_empty() {
        println!(
            "  Note: removed dependencies the pack does not list: {}",
            outcome.pruned_dependencies.join(", ")
        );
    }
    info!("Switch {} took {} ms", outcome.tx_uuid, outcome.duration_ms);
    Ok(())
}

/// Remove a pack
pub fn cmd_remove(config: &PackshiftConfig, name: &str) -> Result<()> {
    let _lock = lock_root(config)?;
    let mut manager = open_manager(config, false)?;

    let outcome = manager.remove_pack(name);
    if outcome.was_absent() {
        println!("Pack {} does not exist.", name);
        return Ok(());
    }

    println!("Removed pack {}", name);
    if let Some(error) = outcome.folder_error {
        println!("  Warning: folder could not be deleted: {}", error);
    }
    Ok(())
}
