// src/commands/system.rs
//! Maintenance commands: recover, deps, completions

use super::pack::open_manager;
use crate::cli::Cli;
use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;
use packshift::{
    Catalog, JsonCatalog, PackshiftConfig, RecoveryOutcome, RootLock, compute_closure,
};
use tracing::info;

/// Recover interrupted switches
pub fn cmd_recover(config: &PackshiftConfig) -> Result<()> {
    let _lock = RootLock::acquire(&config.root).context("Another packshift command is running")?;
    let manager = open_manager(config, false)?;

    info!("Checking {} for interrupted switches...", config.root.display());
    let outcomes = manager.recover().context("Recovery failed")?;

    if outcomes.is_empty() {
        println!("Nothing to recover.");
        return Ok(());
    }

    let mut unresolved = 0;
    for outcome in &outcomes {
        if !outcome.is_resolved() {
            unresolved += 1;
        }
        match outcome {
            RecoveryOutcome::RolledBack {
                tx_uuid,
                pack,
                reason,
            } => println!("Rolled back switch to {} ({}): {}", pack, tx_uuid, reason),
            RecoveryOutcome::RolledForward { tx_uuid, pack } => {
                println!("Completed switch to {} ({})", pack, tx_uuid)
            }
            RecoveryOutcome::RollbackIncomplete { tx_uuid, reason } => {
                println!("Could not roll back {}: {}", tx_uuid, reason)
            }
            RecoveryOutcome::Corrupted { tx_uuid, error } => {
                println!("Journal {} is unreadable: {}", tx_uuid, error)
            }
            RecoveryOutcome::Clean { tx_uuid } => println!("Removed empty journal {}", tx_uuid),
            RecoveryOutcome::HoldingRestored { path } => {
                println!("Moved {} back into the live location", path.display())
            }
            RecoveryOutcome::StaleHolding { path } => println!(
                "{} exists next to a live folder; inspect it and delete it by hand",
                path.display()
            ),
        }
    }

    if unresolved > 0 {
        anyhow::bail!("{} interrupted switch(es) need manual attention", unresolved);
    }
    Ok(())
}

/// Print the dependency closure of a component
pub fn cmd_deps(config: &PackshiftConfig, component: &str) -> Result<()> {
    let catalog_path = config.catalog_path();
    let catalog = JsonCatalog::load(&catalog_path)
        .with_context(|| format!("Failed to load catalog {}", catalog_path.display()))?;

    let closure = compute_closure([component], &catalog);
    println!("{} ({} components in closure):", component, closure.len());
    for id in &closure {
        if id == component {
            continue;
        }
        match catalog.lookup(id) {
            Some(descriptor) => println!("  {} [{}]", id, descriptor.state),
            None => println!("  {} (not in catalog)", id),
        }
    }
    Ok(())
}

/// Generate shell completions
pub fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "packshift", &mut std::io::stdout());
    Ok(())
}
