// src/pack/registry.rs

//! In-memory registry of known packs
//!
//! Discovered from the managed root at startup, kept sorted by byte-wise
//! name comparison after every mutation. Observers only ever get a slice.

use super::{Pack, PackStore};
use crate::error::Result;
use crate::filesystem;
use std::fs;
use tracing::{debug, warn};

/// A root folder that discovery refused to register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPack {
    pub folder: String,
    pub reason: String,
}

/// What `remove` actually found and deleted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// A registry entry existed and was removed
    pub entry_removed: bool,
    /// A backing folder existed and was deleted
    pub folder_removed: bool,
    /// Why the folder could not be deleted, if it could not
    pub folder_error: Option<String>,
}

impl RemoveOutcome {
    /// Neither an entry nor a folder existed
    pub fn was_absent(&self) -> bool {
        !self.entry_removed && !self.folder_removed && self.folder_error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PackRegistry {
    packs: Vec<Pack>,
    skipped: Vec<SkippedPack>,
}

impl PackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the managed root for pack folders
    ///
    /// Reserved folders are ignored. A folder without a manifest is not a
    /// pack. A folder whose manifest is unreadable, malformed, or declares a
    /// different name is skipped and recorded, and the scan carries on.
    pub fn discover(store: &PackStore) -> Result<Self> {
        let mut registry = Self::new();

        if !store.root().exists() {
            debug!("Managed root {} does not exist yet", store.root().display());
            return Ok(registry);
        }

        for entry in fs::read_dir(store.root())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Ok(folder) = entry.file_name().into_string() else {
                continue;
            };
            if store.is_reserved(&folder) {
                continue;
            }

            let manifest_path = entry.path().join(store.manifest_name());
            if !manifest_path.is_file() {
                debug!("Skipping {}: no manifest", folder);
                continue;
            }

            match PackStore::read_manifest(&manifest_path) {
                Ok(pack) if pack.name == folder => registry.packs.push(pack),
                Ok(pack) => {
                    warn!(
                        "Skipping pack folder {}: manifest declares name '{}'",
                        folder, pack.name
                    );
                    registry.skipped.push(SkippedPack {
                        folder,
                        reason: format!("manifest declares name '{}'", pack.name),
                    });
                }
                Err(e) => {
                    warn!("Skipping pack folder {}: {}", folder, e);
                    registry.skipped.push(SkippedPack {
                        folder,
                        reason: e.to_string(),
                    });
                }
            }
        }

        registry.sort();
        debug!(
            "Discovered {} packs ({} skipped)",
            registry.packs.len(),
            registry.skipped.len()
        );
        Ok(registry)
    }

    /// Packs in byte-wise name order
    pub fn list(&self) -> &[Pack] {
        &self.packs
    }

    /// Folders the last discovery refused
    pub fn skipped(&self) -> &[SkippedPack] {
        &self.skipped
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Pack> {
        self.packs
            .binary_search_by(|p| p.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.packs[i])
    }

    /// Replace the entry with the same name, or add it
    pub fn upsert(&mut self, pack: Pack) {
        match self.packs.iter_mut().find(|p| p.name == pack.name) {
            Some(existing) => *existing = pack,
            None => self.packs.push(pack),
        }
        self.sort();
    }

    /// Remove the entry and, best-effort, its backing folder
    pub fn remove(&mut self, name: &str, store: &PackStore) -> RemoveOutcome {
        let mut outcome = RemoveOutcome::default();

        let before = self.packs.len();
        self.packs.retain(|p| p.name != name);
        outcome.entry_removed = self.packs.len() != before;
        self.sort();

        match store.pack_dir(name) {
            Ok(dir) => match filesystem::remove_entry(&dir) {
                Ok(removed) => outcome.folder_removed = removed,
                Err(e) => {
                    warn!("Failed to delete pack folder {}: {}", dir.display(), e);
                    outcome.folder_error = Some(e.to_string());
                }
            },
            Err(e) => {
                warn!("Not deleting folder for pack '{}': {}", name, e);
                outcome.folder_error = Some(e.to_string());
            }
        }

        outcome
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    fn sort(&mut self) {
        self.packs.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    }
}
