// src/manager.rs

//! Pack management entry point
//!
//! Ties the store, the registry and the switch engine together behind the
//! four pack operations: list, load, save, remove. Callers serialize
//! mutating calls; the CLI does so with a `RootLock`.

use crate::catalog::{Catalog, Installer};
use crate::config::PackshiftConfig;
use crate::error::{Error, Result};
use crate::filesystem;
use crate::host::HostMonitor;
use crate::pack::{InstalledSnapshot, Pack, PackRegistry, PackStore, RemoveOutcome};
use crate::progress::ProgressTracker;
use crate::transaction::{RecoveryOutcome, SwitchConfig, SwitchEngine, SwitchOutcome};
use std::sync::Arc;
use tracing::{debug, info};

pub struct PackManager<C, I, H> {
    store: PackStore,
    registry: PackRegistry,
    engine: SwitchEngine<C, I, H>,
}

impl<C, I, H> PackManager<C, I, H>
where
    C: Catalog,
    I: Installer,
    H: HostMonitor,
{
    /// Discover packs under the configured root and restore the active set
    ///
    /// The active set comes from the pack recorded by the last commit when
    /// it is still registered, otherwise from the live directory's contents.
    pub fn open(config: &PackshiftConfig, catalog: C, installer: I, host: H) -> Result<Self> {
        let store = PackStore::from_config(config);
        let registry = PackRegistry::discover(&store)?;
        let switch_config = SwitchConfig::from_config(config);

        let active_pack = switch_config
            .read_active_pack()
            .filter(|name| registry.find_by_name(name).is_some());
        let engine = SwitchEngine::new(switch_config, catalog, installer, host);

        let mut manager = Self {
            store,
            registry,
            engine,
        };
        let active = match active_pack
            .as_deref()
            .and_then(|name| manager.registry.find_by_name(name))
        {
            Some(pack) => pack.installed.clone(),
            None => manager.snapshot_live()?,
        };
        debug!(
            "Active set has {} components (pack: {})",
            active.len(),
            active_pack.as_deref().unwrap_or("none")
        );
        manager.engine = manager.engine.with_active(active_pack, active);

        Ok(manager)
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.engine = self.engine.with_progress(progress);
        self
    }

    /// Registered packs in name order
    pub fn list_packs(&self) -> &[Pack] {
        self.registry.list()
    }

    pub fn find_pack(&self, name: &str) -> Option<&Pack> {
        self.registry.find_by_name(name)
    }

    /// Switch the live directory to pack `name`
    pub fn load_pack(&mut self, name: &str) -> Result<SwitchOutcome> {
        self.engine
            .switch_to(name, &mut self.registry, &self.store)
    }

    /// Snapshot the live directory as pack `name`, replacing any pack of that name
    ///
    /// Disabled components are listed in the manifest; their files stay in
    /// the disabled location.
    pub fn save_pack(&mut self, name: &str, description: &str) -> Result<Pack> {
        if let Some(reason) = self.engine.config().pending_recovery()? {
            return Err(Error::RecoveryRequired(reason));
        }

        let snapshot = self.snapshot_live()?;
        let pack = self.store.save_snapshot(name, description, &snapshot)?;
        self.registry.upsert(pack.clone());
        info!("Saved pack {}", name);
        Ok(pack)
    }

    /// Remove pack `name` and its folder; absence is reported, not an error
    pub fn remove_pack(&mut self, name: &str) -> RemoveOutcome {
        let outcome = self.registry.remove(name, &self.store);
        if outcome.was_absent() {
            info!("Pack {} does not exist", name);
        }
        outcome
    }

    pub fn recover(&self) -> Result<Vec<RecoveryOutcome>> {
        self.engine.recover()
    }

    /// Name of the pack the live directory was last switched to
    pub fn active_pack(&self) -> Option<&str> {
        self.engine.active_pack()
    }

    pub fn active_set(&self) -> &InstalledSnapshot {
        self.engine.active_set()
    }

    pub fn registry(&self) -> &PackRegistry {
        &self.registry
    }

    pub fn store(&self) -> &PackStore {
        &self.store
    }

    pub fn engine(&self) -> &SwitchEngine<C, I, H> {
        &self.engine
    }

    /// Describe the materialized components as a snapshot
    ///
    /// Covers the live directory and the disabled location, so a disabled
    /// component stays listed and survives the next switch to this pack.
    /// Catalog-known entries carry catalog metadata. Other entries keep the
    /// metadata the active set holds for them, or null.
    pub fn snapshot_live(&self) -> Result<InstalledSnapshot> {
        let config = self.engine.config();
        let mut entries = filesystem::list_entries(&config.live_dir)?;
        entries.extend(filesystem::list_entries(&config.disabled_dir)?);
        let mut snapshot = InstalledSnapshot::from_entries(
            entries,
            self.engine.catalog(),
            &[config.housekeeping_name.as_str()],
        );

        let active = self.engine.active_set();
        for (id, metadata) in snapshot.not_in_catalog_mods.iter_mut() {
            if let Some(known) = active.not_in_catalog_mods.get(id) {
                *metadata = known.clone();
            }
        }
        Ok(snapshot)
    }
}
