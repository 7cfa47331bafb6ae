// src/transaction/recovery.rs

//! Recovery of switches interrupted by a crash
//!
//! - Before `Committed`: roll back by replaying the journaled steps'
//!   compensations in reverse order.
//! - At or after `Committed`: roll forward. The manifest is already written,
//!   so only the holding location, trash and incoming leftovers need
//!   cleaning up.
//!
//! Compensations are idempotent and inspect the disk before acting, because
//! a step is journaled before it runs and a crash can land in between.

use crate::error::Result;
use crate::filesystem;
use std::fs;
use std::path::PathBuf;

use super::journal::{JournalRecord, SwitchJournal, find_incomplete_journals};
use super::{SwitchConfig, SwitchStep};

/// Outcome of recovering one interrupted switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Switch was rolled back (crashed before commit)
    RolledBack {
        tx_uuid: String,
        pack: String,
        reason: String,
    },
    /// Switch had committed; leftovers cleaned up
    RolledForward { tx_uuid: String, pack: String },
    /// Rollback could not restore the previous state; journal kept
    RollbackIncomplete { tx_uuid: String, reason: String },
    /// Journal was unreadable, manual intervention needed
    Corrupted { tx_uuid: String, error: String },
    /// Journal was empty
    Clean { tx_uuid: String },
    /// Holding location with no journal: moved back into the empty live location
    HoldingRestored { path: PathBuf },
    /// Holding location with no journal next to an existing live directory
    StaleHolding { path: PathBuf },
}

impl RecoveryOutcome {
    /// True when the managed root is consistent again
    pub fn is_resolved(&self) -> bool {
        !matches!(
            self,
            Self::RollbackIncomplete { .. } | Self::Corrupted { .. } | Self::StaleHolding { .. }
        )
    }
}

/// Recover every unfinished switch under the managed root
pub fn recover_all(config: &SwitchConfig) -> Result<Vec<RecoveryOutcome>> {
    let mut outcomes = Vec::new();

    for journal_path in find_incomplete_journals(&config.journal_dir)? {
        outcomes.push(recover_single(config, journal_path)?);
    }

    let holding = config.holding_dir();
    if filesystem::entry_exists(&holding) {
        if filesystem::entry_exists(&config.live_dir) {
            log::warn!(
                "{} has no journal and the live directory exists; leaving both for manual review",
                holding.display()
            );
            outcomes.push(RecoveryOutcome::StaleHolding { path: holding });
        } else {
            log::info!("Restoring orphaned holding location {}", holding.display());
            filesystem::move_dir(&holding, &config.live_dir)?;
            outcomes.push(RecoveryOutcome::HoldingRestored { path: holding });
        }
    }

    Ok(outcomes)
}

fn recover_single(config: &SwitchConfig, journal_path: PathBuf) -> Result<RecoveryOutcome> {
    let journal = match SwitchJournal::open(journal_path.clone()) {
        Ok(j) => j,
        Err(e) => {
            return Ok(RecoveryOutcome::Corrupted {
                tx_uuid: "unknown".to_string(),
                error: format!("failed to open {}: {}", journal_path.display(), e),
            });
        }
    };

    let tx_uuid = journal.tx_uuid().to_string();
    let records = match journal.read_all() {
        Ok(r) => r,
        Err(e) => {
            return Ok(RecoveryOutcome::Corrupted {
                tx_uuid,
                error: format!("failed to read journal: {}", e),
            });
        }
    };

    if records.is_empty() {
        journal.delete()?;
        return Ok(RecoveryOutcome::Clean { tx_uuid });
    }

    let pack = records
        .iter()
        .find_map(|r| match r {
            JournalRecord::Begin { pack, .. } => Some(pack.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "unknown".to_string());
    let last_phase = journal.last_phase()?;
    log::info!(
        "Recovering switch {} to {} (last phase: {})",
        tx_uuid,
        pack,
        last_phase
    );

    let committed = records
        .iter()
        .any(|r| matches!(r, JournalRecord::Committed { .. }));

    if committed {
        cleanup_after_commit(config, &tx_uuid);
        if let Err(e) = config.write_active_pack(&pack) {
            log::warn!("Failed to record active pack: {}", e);
        }
        let mut journal = journal;
        journal.write_barrier(&JournalRecord::Done {
            duration_ms: 0,
            success: true,
        })?;
        journal.archive()?;
        return Ok(RecoveryOutcome::RolledForward { tx_uuid, pack });
    }

    let steps: Vec<SwitchStep> = records.iter().filter_map(JournalRecord::to_step).collect();
    match rollback_steps(config, &tx_uuid, &steps) {
        Ok(()) => {
            journal.delete()?;
            Ok(RecoveryOutcome::RolledBack {
                tx_uuid,
                pack,
                reason: format!("interrupted while {}", last_phase),
            })
        }
        Err(reason) => Ok(RecoveryOutcome::RollbackIncomplete { tx_uuid, reason }),
    }
}

/// Run the compensations of `steps` in reverse order
///
/// Every compensation runs even if an earlier one failed; the failures are
/// joined into the returned reason.
pub(crate) fn rollback_steps(
    config: &SwitchConfig,
    tx_uuid: &str,
    steps: &[SwitchStep],
) -> std::result::Result<(), String> {
    log::info!("Rolling back switch {} ({} steps)", tx_uuid, steps.len());
    let applied = steps.contains(&SwitchStep::PackApplied);
    let mut failures = Vec::new();

    for step in steps.iter().rev() {
        let result = match step {
            SwitchStep::DisabledPruned { component } => {
                restore_disabled(config, tx_uuid, component)
            }
            SwitchStep::PackApplied => {
                let incoming = config.incoming_dir();
                filesystem::remove_entry(&incoming)
                    .map(|_| ())
                    .map_err(|e| format!("failed to remove {}: {}", incoming.display(), e))
            }
            SwitchStep::LiveStaged { live_existed } => {
                restore_live(config, *live_existed, applied)
            }
        };
        if let Err(reason) = result {
            log::warn!("Compensation for {:?} failed: {}", step, reason);
            failures.push(reason);
        }
    }

    let trash = config.trash_dir(tx_uuid);
    if let Err(e) = filesystem::remove_entry(&trash) {
        log::warn!("Failed to remove {}: {}", trash.display(), e);
    }
    let _ = fs::remove_dir(crate::paths::trash_dir(&config.root));

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures.join("; "))
    }
}

fn restore_disabled(
    config: &SwitchConfig,
    tx_uuid: &str,
    component: &str,
) -> std::result::Result<(), String> {
    let trashed = config.trash_dir(tx_uuid).join(component);
    let original = config.disabled_dir.join(component);

    if !filesystem::entry_exists(&trashed) {
        // The move never started
        return Ok(());
    }
    if filesystem::entry_exists(&original) {
        // Interrupted cross-device copy; the original is still whole
        return filesystem::remove_entry(&trashed)
            .map(|_| ())
            .map_err(|e| format!("failed to remove {}: {}", trashed.display(), e));
    }
    filesystem::move_dir(&trashed, &original).map_err(|e| {
        format!(
            "failed to restore {} to {}: {}",
            trashed.display(),
            original.display(),
            e
        )
    })
}

/// Put the pre-switch live directory back
///
/// Before the pack was applied the live directory may still be the original
/// (the move failed or never ran); after, whatever is live belongs to the
/// failed switch and the holding location must exist if live did.
fn restore_live(
    config: &SwitchConfig,
    live_existed: bool,
    applied: bool,
) -> std::result::Result<(), String> {
    let live = &config.live_dir;
    let holding = config.holding_dir();
    let live_exists = filesystem::entry_exists(live);
    let holding_exists = filesystem::entry_exists(&holding);

    if !applied && live_exists {
        if holding_exists {
            filesystem::remove_entry(&holding)
                .map_err(|e| format!("failed to remove partial {}: {}", holding.display(), e))?;
        }
        return Ok(());
    }

    if live_exists {
        filesystem::remove_entry(live)
            .map_err(|e| format!("failed to clear {}: {}", live.display(), e))?;
    }

    if holding_exists {
        filesystem::move_dir(&holding, live).map_err(|e| {
            format!(
                "failed to move {} back to {}: {}",
                holding.display(),
                live.display(),
                e
            )
        })
    } else if live_existed {
        Err(format!(
            "holding location {} is missing; the previous live directory is lost",
            holding.display()
        ))
    } else {
        Ok(())
    }
}

fn cleanup_after_commit(config: &SwitchConfig, tx_uuid: &str) {
    for dir in [
        config.holding_dir(),
        config.trash_dir(tx_uuid),
        config.incoming_dir(),
    ] {
        if let Err(e) = filesystem::remove_entry(&dir) {
            log::warn!("Failed to clean up {}: {}", dir.display(), e);
        }
    }
    let _ = fs::remove_dir(crate::paths::trash_dir(&config.root));
}
