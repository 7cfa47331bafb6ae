// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use packshift::{
    ComponentDescriptor, Error, HostMonitor, InstalledSnapshot, Installer, MemoryCatalog, Pack,
    PackManager, PackStore, PackshiftConfig, Result,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;

/// A managed root in a temporary directory.
///
/// Keep the fixture alive for the duration of the test to prevent cleanup.
pub struct Fixture {
    _temp_dir: TempDir,
    pub config: PackshiftConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = PackshiftConfig::with_root(temp_dir.path().join("game"));
        fs::create_dir_all(&config.root).unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn live(&self) -> PathBuf {
        self.config.live_dir()
    }

    pub fn disabled(&self) -> PathBuf {
        self.config.disabled_dir()
    }

    pub fn store(&self) -> PackStore {
        PackStore::from_config(&self.config)
    }

    /// Put a component folder with one data file into the live directory
    pub fn add_live(&self, name: &str) {
        write_component(&self.live(), name);
    }

    pub fn add_disabled(&self, name: &str) {
        write_component(&self.disabled(), name);
    }

    /// Make a component available to the `DirectoryInstaller`
    pub fn add_cached(&self, name: &str) {
        write_component(&self.config.component_cache(), name);
    }

    pub fn write_housekeeping(&self, content: &str) {
        fs::create_dir_all(self.live()).unwrap();
        fs::write(self.live().join(&self.config.housekeeping_name), content).unwrap();
    }

    /// Entry names in the live directory, sorted
    pub fn live_entries(&self) -> Vec<String> {
        entries(&self.live())
    }

    pub fn disabled_entries(&self) -> Vec<String> {
        entries(&self.disabled())
    }

    /// Create a pack folder holding `stored` component folders and a manifest
    /// listing `installed`
    pub fn write_pack(&self, name: &str, stored: &[&str], installed: InstalledSnapshot) -> Pack {
        let pack_dir = self.root().join(name);
        for component in stored {
            write_component(&pack_dir, component);
        }
        let pack = Pack::new(name, format!("{} pack", name), installed);
        self.store().write_manifest(&pack).unwrap();
        pack
    }

    pub fn read_manifest(&self, name: &str) -> Pack {
        self.store().load_snapshot(name).unwrap()
    }

    pub fn open<I, H>(
        &self,
        catalog: MemoryCatalog,
        installer: I,
        host: H,
    ) -> PackManager<MemoryCatalog, I, H>
    where
        I: Installer,
        H: HostMonitor,
    {
        PackManager::open(&self.config, catalog, installer, host).unwrap()
    }

    /// Files left in the journal directory, archive excluded
    pub fn pending_journals(&self) -> Vec<String> {
        entries(&self.root().join(".packshift-journal"))
            .into_iter()
            .filter(|name| name != "archive")
            .collect()
    }
}

fn write_component(dir: &Path, name: &str) {
    let path = dir.join(name);
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("data.bin"), format!("{} payload", name)).unwrap();
}

fn entries(dir: &Path) -> Vec<String> {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = read_dir
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

/// Snapshot listing `mods` as catalog components and `others` as not-in-catalog
pub fn snapshot(mods: &[&str], others: &[&str]) -> InstalledSnapshot {
    let mut snapshot = InstalledSnapshot::new();
    for id in mods {
        snapshot.insert_cataloged(*id, json!({ "version": "1.0" }));
    }
    for id in others {
        snapshot.insert_uncataloged(*id, json!(null));
    }
    snapshot
}

/// Catalog from `(id, dependencies)` pairs
pub fn catalog(entries: &[(&str, &[&str])]) -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    for (id, deps) in entries {
        catalog.insert(
            ComponentDescriptor::new(*id)
                .with_dependencies(deps.iter().copied())
                .with_metadata(json!({ "version": "1.0" })),
        );
    }
    catalog
}

/// Installer that writes a folder per component and can be told to fail
#[derive(Default)]
pub struct ScriptedInstaller {
    fail_on: Option<String>,
    remove_on_failure: Option<PathBuf>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when asked to install `id`
    pub fn failing_on(mut self, id: &str) -> Self {
        self.fail_on = Some(id.to_string());
        self
    }

    /// Delete `path` right before failing
    pub fn removing_on_failure(mut self, path: impl Into<PathBuf>) -> Self {
        self.remove_on_failure = Some(path.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Installer for ScriptedInstaller {
    fn install(&self, descriptor: &ComponentDescriptor, live_dir: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(descriptor.id.clone());

        if self.fail_on.as_deref() == Some(descriptor.id.as_str()) {
            if let Some(path) = &self.remove_on_failure {
                let _ = fs::remove_dir_all(path);
            }
            return Err(Error::install(&descriptor.id, "download refused"));
        }

        write_component(live_dir, &descriptor.id);
        Ok(())
    }
}

/// Host monitor with a fixed answer to every question
pub struct ScriptedHost {
    running: AtomicBool,
    confirm: bool,
    terminate_ok: bool,
    pub confirm_calls: AtomicUsize,
    pub terminate_calls: AtomicUsize,
}

impl ScriptedHost {
    pub fn running(confirm: bool, terminate_ok: bool) -> Self {
        Self {
            running: AtomicBool::new(true),
            confirm,
            terminate_ok,
            confirm_calls: AtomicUsize::new(0),
            terminate_calls: AtomicUsize::new(0),
        }
    }

    pub fn stopped() -> Self {
        let host = Self::running(true, true);
        host.running.store(false, Ordering::SeqCst);
        host
    }
}

impl HostMonitor for ScriptedHost {
    fn name(&self) -> &str {
        "game"
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn confirm_terminate(&self) -> bool {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.confirm
    }

    fn terminate(&self) -> Result<()> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.terminate_ok {
            return Err(Error::HostTerminate {
                name: "game".to_string(),
                reason: "still running after timeout".to_string(),
            });
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
