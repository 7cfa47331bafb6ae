// src/transaction/mod.rs

//! Pack switch engine
//!
//! A switch replaces the live component directory with the contents of a
//! stored pack, installs whatever the pack lists but does not carry, prunes
//! whatever it does not list, and commits the result back into the pack.
//!
//! The switch is a saga. Each step that touches the disk is journaled before
//! it runs and has a compensation; on failure the compensations run in
//! reverse order and the live directory comes back exactly as it was.
//!
//! # Switch Lifecycle
//!
//! ```text
//! Idle -> PreCheck -> Staging -> Applying -> Installing -> Pruning -> Committing -> Idle
//!                        |          |            |            |           |
//!                        +----------+------------+------------+-----------+--> RollingBack -> Idle
//!                                                                         ^
//!                                                       Point of no return once the manifest is written
//! ```

mod journal;
mod recovery;

pub use journal::{JournalRecord, SwitchJournal, find_incomplete_journals};
pub use recovery::{RecoveryOutcome, recover_all};

use crate::catalog::{Catalog, ComponentDescriptor, ComponentId, Installer};
use crate::config::PackshiftConfig;
use crate::error::{Error, Result};
use crate::filesystem::{self, path::sanitize_name};
use crate::host::HostMonitor;
use crate::pack::{InstalledSnapshot, Pack, PackRegistry, PackStore};
use crate::paths;
use crate::progress::{ProgressTracker, SilentProgress};
use crate::resolver;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Locations the switch engine works with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchConfig {
    /// Managed root
    pub root: PathBuf,
    /// Live components folder
    pub live_dir: PathBuf,
    /// Disabled components folder
    pub disabled_dir: PathBuf,
    /// Entry in live/disabled that pruning never touches
    pub housekeeping_name: String,
    /// Directory for switch journals
    pub journal_dir: PathBuf,
}

impl SwitchConfig {
    /// Default layout under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(&PackshiftConfig::with_root(root))
    }

    pub fn from_config(config: &PackshiftConfig) -> Self {
        Self {
            root: config.root.clone(),
            live_dir: config.live_dir(),
            disabled_dir: config.disabled_dir(),
            housekeeping_name: config.housekeeping_name.clone(),
            journal_dir: paths::journal_dir(&config.root),
        }
    }

    pub fn holding_dir(&self) -> PathBuf {
        paths::holding_dir(&self.root)
    }

    pub fn incoming_dir(&self) -> PathBuf {
        paths::incoming_dir(&self.root)
    }

    /// Trash for entries pruned from the disabled folder by one switch
    pub fn trash_dir(&self, tx_uuid: &str) -> PathBuf {
        paths::trash_dir(&self.root).join(tx_uuid)
    }

    pub fn active_marker(&self) -> PathBuf {
        paths::active_marker(&self.root)
    }

    /// Name of the last pack a switch committed, if recorded
    pub fn read_active_pack(&self) -> Option<String> {
        let name = fs::read_to_string(self.active_marker()).ok()?;
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    pub(crate) fn write_active_pack(&self, name: &str) -> io::Result<()> {
        fs::write(self.active_marker(), name)
    }

    /// Why the root is not safe to mutate, if an interrupted switch left state behind
    pub fn pending_recovery(&self) -> Result<Option<String>> {
        let holding = self.holding_dir();
        if filesystem::entry_exists(&holding) {
            return Ok(Some(format!(
                "holding location {} still exists",
                holding.display()
            )));
        }
        Ok(find_incomplete_journals(&self.journal_dir)?
            .first()
            .map(|journal| format!("unfinished journal {}", journal.display())))
    }
}

/// Switch engine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchState {
    /// No switch in flight
    Idle,
    /// Validating the request; nothing on disk changes
    PreCheck,
    /// Moving the live directory to the holding location
    Staging,
    /// Materializing the pack into the live location
    Applying,
    /// Installing listed components the pack does not carry
    Installing,
    /// Removing components the pack does not list
    Pruning,
    /// Writing the result into the pack - POINT OF NO RETURN
    Committing,
    /// Running compensations after a failure
    RollingBack,
}

impl SwitchState {
    /// True for phases that change the disk and therefore roll back on failure
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Staging | Self::Applying | Self::Installing | Self::Pruning | Self::Committing
        )
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::PreCheck => "pre-check",
            Self::Staging => "staging",
            Self::Applying => "applying",
            Self::Installing => "installing",
            Self::Pruning => "pruning",
            Self::Committing => "committing",
            Self::RollingBack => "rolling back",
        };
        f.write_str(name)
    }
}

/// A switch step that has a compensation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchStep {
    /// Live directory moved to the holding location
    LiveStaged { live_existed: bool },
    /// Pack assembled in the incoming location and renamed into live
    PackApplied,
    /// Disabled entry moved into the switch's trash
    DisabledPruned { component: ComponentId },
}

/// What a successful switch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchOutcome {
    pub pack: String,
    pub tx_uuid: String,
    /// Components the installer materialized, dependencies included
    pub installed: Vec<ComponentId>,
    /// Requested components the catalog does not know
    pub dropped: Vec<ComponentId>,
    /// Entries removed from the live and disabled folders
    pub pruned: Vec<ComponentId>,
    /// Dependency closure of the installed components
    pub protected: BTreeSet<ComponentId>,
    /// Components the catalog reported as present that had to be installed
    pub stale_catalog: Vec<ComponentId>,
    /// Pruned entries that an active component depends on
    pub pruned_dependencies: Vec<ComponentId>,
    pub duration_ms: u64,
}

/// Exclusive advisory lock on the managed root
///
/// Held for the lifetime of the value.
#[derive(Debug)]
pub struct RootLock {
    file: File,
    path: PathBuf,
}

impl RootLock {
    /// Take the lock, retrying with backoff (0, 100, 200, 400, 800 ms)
    pub fn acquire(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let path = paths::lock_path(root);
        let file = File::create(&path)?;

        const MAX_RETRIES: u32 = 5;
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRIES - 1 {
                        std::thread::sleep(std::time::Duration::from_millis(100 * (1 << attempt)));
                    }
                }
            }
        }

        if let Some(e) = last_error {
            return Err(Error::Locked(format!(
                "{} is held by another packshift process ({} attempts): {}",
                path.display(),
                MAX_RETRIES,
                e
            )));
        }

        debug!("Acquired {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// One switch in flight: its journal and the steps that may need undoing
struct Switch {
    tx_uuid: String,
    pack: String,
    journal: SwitchJournal,
    steps: Vec<SwitchStep>,
    start_time: DateTime<Utc>,
}

impl Switch {
    fn begin(config: &SwitchConfig, pack: &str) -> Result<Self> {
        let tx_uuid = Uuid::new_v4().to_string();
        let journal = SwitchJournal::create(&config.journal_dir, &tx_uuid)?;

        let mut switch = Self {
            tx_uuid: tx_uuid.clone(),
            pack: pack.to_string(),
            journal,
            steps: Vec::new(),
            start_time: Utc::now(),
        };
        switch.record(JournalRecord::Begin {
            tx_uuid,
            pack: pack.to_string(),
            root: config.root.clone(),
            timestamp: switch.start_time,
        })?;
        Ok(switch)
    }

    /// Journal a record; steps are remembered before they run
    fn record(&mut self, record: JournalRecord) -> Result<()> {
        if let Some(step) = record.to_step() {
            self.steps.push(step);
        }
        if record.is_barrier() {
            self.journal.write_barrier(&record)
        } else {
            self.journal.write(&record)
        }
    }

    fn duration_ms(&self) -> u64 {
        Utc::now()
            .signed_duration_since(self.start_time)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Switches the live directory between stored packs
///
/// Owns the active set: the installed snapshot of the last pack that was
/// switched to successfully.
pub struct SwitchEngine<C, I, H> {
    config: SwitchConfig,
    catalog: C,
    installer: I,
    host: H,
    active: InstalledSnapshot,
    active_pack: Option<String>,
    state: SwitchState,
    progress: Arc<dyn ProgressTracker>,
}

impl<C, I, H> SwitchEngine<C, I, H>
where
    C: Catalog,
    I: Installer,
    H: HostMonitor,
{
    pub fn new(config: SwitchConfig, catalog: C, installer: I, host: H) -> Self {
        Self {
            config,
            catalog,
            installer,
            host,
            active: InstalledSnapshot::new(),
            active_pack: None,
            state: SwitchState::Idle,
            progress: Arc::new(SilentProgress::new()),
        }
    }

    /// Report phases and per-component work to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    /// Seed the active set, e.g. from the pack recorded by the last commit
    pub fn with_active(mut self, pack: Option<String>, active: InstalledSnapshot) -> Self {
        self.active_pack = pack;
        self.active = active;
        self
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    /// Installed snapshot of the last successful switch
    pub fn active_set(&self) -> &InstalledSnapshot {
        &self.active
    }

    pub fn active_pack(&self) -> Option<&str> {
        self.active_pack.as_deref()
    }

    /// Roll back or finish switches interrupted by a crash
    pub fn recover(&self) -> Result<Vec<RecoveryOutcome>> {
        recover_all(&self.config)
    }

    /// Switch the live directory to pack `name`
    ///
    /// Pre-check failures (`PackNotFound`, `HostRunning`, `HostTerminate`,
    /// `RecoveryRequired`) leave everything untouched. Any later failure is
    /// rolled back and reported as `SwitchFailed`, or as `RollbackFailure` if
    /// the rollback itself could not complete.
    pub fn switch_to(
        &mut self,
        name: &str,
        registry: &mut PackRegistry,
        store: &PackStore,
    ) -> Result<SwitchOutcome> {
        self.enter(SwitchState::PreCheck);
        let (pack, pack_dir) = match self.precheck(name, registry, store) {
            Ok(found) => found,
            Err(e) => {
                self.enter(SwitchState::Idle);
                self.progress.failed(&e.to_string());
                return Err(e);
            }
        };

        let mut switch = match Switch::begin(&self.config, name) {
            Ok(switch) => switch,
            Err(e) => {
                self.enter(SwitchState::Idle);
                self.progress.failed(&e.to_string());
                return Err(e);
            }
        };
        info!("Switching to pack {} (tx {})", name, switch.tx_uuid);

        let previous = self.active.clone();
        let mut outcome = SwitchOutcome {
            pack: name.to_string(),
            tx_uuid: switch.tx_uuid.clone(),
            ..SwitchOutcome::default()
        };

        if let Err(cause) = self.run_steps(&pack, &pack_dir, store, &mut switch, &mut outcome) {
            return Err(self.roll_back(switch, previous, cause));
        }

        self.enter(SwitchState::Committing);
        let committed = Pack::new(name, pack.description.clone(), self.active.clone());
        if let Err(cause) = store.write_manifest(&committed) {
            return Err(self.roll_back(switch, previous, cause));
        }
        if let Err(e) = switch.record(JournalRecord::Committed {
            components: committed.installed.len(),
        }) {
            warn!("Failed to journal commit of {}: {}", name, e);
        }

        registry.upsert(committed);
        self.active_pack = Some(name.to_string());
        self.finish(switch, &mut outcome);

        info!(
            "Switched to pack {}: {} installed, {} dropped, {} pruned",
            name,
            outcome.installed.len(),
            outcome.dropped.len(),
            outcome.pruned.len()
        );
        self.progress.finished(&format!("Switched to {}", name));
        Ok(outcome)
    }

    fn enter(&mut self, state: SwitchState) {
        debug!("Switch state: {} -> {}", self.state, state);
        self.state = state;
        if state != SwitchState::Idle {
            self.progress.phase(state);
        }
    }

    fn precheck(
        &self,
        name: &str,
        registry: &PackRegistry,
        store: &PackStore,
    ) -> Result<(Pack, PathBuf)> {
        let pack = registry
            .find_by_name(name)
            .cloned()
            .ok_or_else(|| Error::PackNotFound(name.to_string()))?;
        let pack_dir = store.pack_dir(name)?;

        if let Some(reason) = self.config.pending_recovery()? {
            return Err(Error::RecoveryRequired(reason));
        }

        if self.host.is_running() {
            info!("{} is running", self.host.name());
            if !self.host.confirm_terminate() {
                return Err(Error::HostRunning(self.host.name().to_string()));
            }
            self.host.terminate()?;
        }

        Ok((pack, pack_dir))
    }

    fn run_steps(
        &mut self,
        pack: &Pack,
        pack_dir: &Path,
        store: &PackStore,
        switch: &mut Switch,
        outcome: &mut SwitchOutcome,
    ) -> Result<()> {
        self.stage(switch)?;
        self.apply(pack, pack_dir, store.manifest_name(), switch)?;
        let protected = self.install_missing(switch, outcome)?;
        self.prune(&protected, switch, outcome)?;
        outcome.protected = protected;
        Ok(())
    }

    fn stage(&mut self, switch: &mut Switch) -> Result<()> {
        self.enter(SwitchState::Staging);
        let live = self.config.live_dir.clone();
        let live_existed = filesystem::entry_exists(&live);

        switch.record(JournalRecord::Staged { live_existed })?;
        if live_existed {
            filesystem::move_dir(&live, &self.config.holding_dir())
                .map_err(|e| Error::staging(&live, e))?;
        }
        Ok(())
    }

    fn apply(
        &mut self,
        pack: &Pack,
        pack_dir: &Path,
        manifest_name: &str,
        switch: &mut Switch,
    ) -> Result<()> {
        self.enter(SwitchState::Applying);
        let incoming = self.config.incoming_dir();

        switch.record(JournalRecord::Applied)?;
        if !pack_dir.is_dir() {
            return Err(Error::staging(
                pack_dir,
                io::Error::new(io::ErrorKind::NotFound, "pack folder is missing"),
            ));
        }

        filesystem::remove_entry(&incoming).map_err(|e| Error::staging(&incoming, e))?;
        let files = filesystem::copy_dir_filtered(pack_dir, &incoming, &[manifest_name])
            .map_err(|e| Error::staging(pack_dir, e))?;
        filesystem::move_dir(&incoming, &self.config.live_dir)
            .map_err(|e| Error::staging(&self.config.live_dir, e))?;
        debug!("Applied {} files from {}", files, pack_dir.display());

        self.active = pack.installed.clone();
        Ok(())
    }

    /// Install what the active set lists but neither folder holds
    ///
    /// Returns the protected set: the dependency closure of every component
    /// installed here.
    fn install_missing(
        &mut self,
        switch: &mut Switch,
        outcome: &mut SwitchOutcome,
    ) -> Result<BTreeSet<ComponentId>> {
        self.enter(SwitchState::Installing);
        let requested: Vec<ComponentId> = self.active.component_ids().cloned().collect();
        self.progress.expect(requested.len() as u64);

        let mut protected = BTreeSet::new();
        for id in requested {
            self.progress.advance();

            if let Err(e) = sanitize_name(&id) {
                warn!("Dropping component with unusable name '{}': {}", id, e);
                self.drop_component(&id, switch, outcome)?;
                continue;
            }
            if self.is_materialized(&id) {
                continue;
            }

            let Some(descriptor) = self.catalog.lookup(&id) else {
                debug!("{} is not in the catalog, dropping it", id);
                self.drop_component(&id, switch, outcome)?;
                continue;
            };
            if descriptor.state.claims_materialized() {
                debug!(
                    "Catalog lists {} as {} but it is not on disk, installing it",
                    id, descriptor.state
                );
                outcome.stale_catalog.push(id.clone());
            }

            self.install_one(&descriptor, switch, outcome)?;

            let missing =
                resolver::missing_dependencies(&id, &self.catalog, |dep| self.is_materialized(dep));
            for dep in missing {
                if let Some(dep_descriptor) = self.catalog.lookup(&dep) {
                    self.install_one(&dep_descriptor, switch, outcome)?;
                }
            }

            protected.extend(resolver::compute_closure([id.as_str()], &self.catalog));
        }

        Ok(protected)
    }

    fn install_one(
        &self,
        descriptor: &ComponentDescriptor,
        switch: &mut Switch,
        outcome: &mut SwitchOutcome,
    ) -> Result<()> {
        sanitize_name(&descriptor.id).map_err(|e| Error::install(&descriptor.id, e))?;
        self.progress.installing(&descriptor.id);

        self.installer
            .install(descriptor, &self.config.live_dir)
            .map_err(|e| match e {
                e @ Error::Install { .. } => e,
                other => Error::install(&descriptor.id, other),
            })?;

        switch.record(JournalRecord::Installed {
            component: descriptor.id.clone(),
        })?;
        outcome.installed.push(descriptor.id.clone());
        Ok(())
    }

    fn drop_component(
        &mut self,
        id: &str,
        switch: &mut Switch,
        outcome: &mut SwitchOutcome,
    ) -> Result<()> {
        self.active.remove(id);
        switch.record(JournalRecord::Dropped {
            component: id.to_string(),
        })?;
        outcome.dropped.push(id.to_string());
        Ok(())
    }

    fn is_materialized(&self, id: &str) -> bool {
        filesystem::entry_exists(&self.config.live_dir.join(id))
            || filesystem::entry_exists(&self.config.disabled_dir.join(id))
    }

    fn prune(
        &mut self,
        protected: &BTreeSet<ComponentId>,
        switch: &mut Switch,
        outcome: &mut SwitchOutcome,
    ) -> Result<()> {
        self.enter(SwitchState::Pruning);
        let live = self.config.live_dir.clone();
        let disabled = self.config.disabled_dir.clone();
        let keep = |name: &str| {
            name == self.config.housekeeping_name
                || self.active.contains(name)
                || protected.contains(name)
        };

        let wanted = resolver::compute_closure(self.active.component_ids(), &self.catalog);
        let note_dependency = |entry: &str, outcome: &mut SwitchOutcome| {
            if wanted.contains(entry) {
                debug!(
                    "Pruning {}: an active component depends on it but the pack does not list it",
                    entry
                );
                outcome.pruned_dependencies.push(entry.to_string());
            }
        };

        let live_entries = filesystem::list_entries(&live).map_err(|e| Error::prune(&live, e))?;
        for entry in live_entries.into_iter().filter(|e| !keep(e.as_str())) {
            note_dependency(&entry, outcome);
            let path = live.join(&entry);
            filesystem::remove_entry(&path).map_err(|e| Error::prune(&path, e))?;
            switch.record(JournalRecord::LivePruned {
                component: entry.clone(),
            })?;
            debug!("Pruned {} from live", entry);
            outcome.pruned.push(entry);
        }

        let disabled_entries =
            filesystem::list_entries(&disabled).map_err(|e| Error::prune(&disabled, e))?;
        let trash = self.config.trash_dir(&switch.tx_uuid);
        for entry in disabled_entries.into_iter().filter(|e| !keep(e.as_str())) {
            note_dependency(&entry, outcome);
            let path = disabled.join(&entry);
            switch.record(JournalRecord::DisabledPruned {
                component: entry.clone(),
            })?;
            fs::create_dir_all(&trash).map_err(|e| Error::prune(&trash, e))?;
            filesystem::move_dir(&path, &trash.join(&entry)).map_err(|e| Error::prune(&path, e))?;
            debug!("Pruned {} from disabled", entry);
            outcome.pruned.push(entry);
        }

        Ok(())
    }

    /// Post-commit cleanup; failures are logged, the switch has happened
    fn finish(&mut self, mut switch: Switch, outcome: &mut SwitchOutcome) {
        if let Err(e) = self.config.write_active_pack(&switch.pack) {
            warn!("Failed to record active pack: {}", e);
        }

        for dir in [
            self.config.holding_dir(),
            self.config.trash_dir(&switch.tx_uuid),
            self.config.incoming_dir(),
        ] {
            if let Err(e) = filesystem::remove_entry(&dir) {
                warn!("Failed to clean up {}: {}", dir.display(), e);
            }
        }
        // Only succeeds once no other switch's trash is left
        let _ = fs::remove_dir(paths::trash_dir(&self.config.root));

        outcome.duration_ms = switch.duration_ms();
        let done = switch.record(JournalRecord::Done {
            duration_ms: outcome.duration_ms,
            success: true,
        });
        if let Err(e) = done.and_then(|()| switch.journal.archive()) {
            warn!("Failed to archive journal for {}: {}", switch.tx_uuid, e);
        }

        self.enter(SwitchState::Idle);
    }

    /// Undo the recorded steps and build the error the caller sees
    fn roll_back(&mut self, switch: Switch, previous: InstalledSnapshot, cause: Error) -> Error {
        self.enter(SwitchState::RollingBack);
        warn!("Switch to {} failed: {}; rolling back", switch.pack, cause);

        self.active = previous;
        let result = recovery::rollback_steps(&self.config, &switch.tx_uuid, &switch.steps);
        self.enter(SwitchState::Idle);

        match result {
            Ok(()) => {
                let Switch { pack, journal, .. } = switch;
                if let Err(e) = journal.delete() {
                    warn!("Failed to delete journal after rollback: {}", e);
                }
                let err = Error::SwitchFailed {
                    pack,
                    cause: Box::new(cause),
                };
                self.progress.failed(&err.to_string());
                err
            }
            Err(reason) => {
                // Journal stays so `recover` can retry
                error!("Rollback of switch {} did not complete: {}", switch.tx_uuid, reason);
                let err = Error::RollbackFailure {
                    pack: switch.pack,
                    cause: Box::new(cause),
                    reason,
                };
                self.progress.failed(&err.to_string());
                err
            }
        }
    }
}
