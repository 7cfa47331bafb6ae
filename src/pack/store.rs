// src/pack/store.rs

//! Durable pack storage
//!
//! Snapshots copy the live directory into a pack folder and write the
//! manifest next to the copied entries. The copy only ever reads from the
//! live directory. A failed save can leave a half-written pack folder
//! behind; that is a failed save, never damage to the live set.

use super::{InstalledSnapshot, Pack};
use crate::config::PackshiftConfig;
use crate::error::{Error, Result};
use crate::filesystem::{self, path::sanitize_name};
use crate::paths;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads and writes pack folders under the managed root
#[derive(Debug, Clone)]
pub struct PackStore {
    root: PathBuf,
    live_dir: PathBuf,
    manifest_name: String,
    reserved: Vec<String>,
}

impl PackStore {
    pub fn new(
        root: impl Into<PathBuf>,
        live_dir: impl Into<PathBuf>,
        manifest_name: impl Into<String>,
    ) -> Self {
        let live_dir = live_dir.into();
        let reserved = live_dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| vec![n.to_string()])
            .unwrap_or_default();
        Self {
            root: root.into(),
            live_dir,
            manifest_name: manifest_name.into(),
            reserved,
        }
    }

    pub fn from_config(config: &PackshiftConfig) -> Self {
        let mut store = Self::new(&config.root, config.live_dir(), &config.manifest_name);
        store.reserved = config.reserved_names();
        store
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn live_dir(&self) -> &Path {
        &self.live_dir
    }

    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    /// Root entry names that can never be packs
    pub fn is_reserved(&self, name: &str) -> bool {
        paths::is_bookkeeping(name) || self.reserved.iter().any(|r| r == name)
    }

    /// Folder backing the pack `name`
    pub fn pack_dir(&self, name: &str) -> Result<PathBuf> {
        let name = sanitize_name(name)?;
        if self.is_reserved(name) {
            return Err(Error::InvalidPackName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    pub fn manifest_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.pack_dir(name)?.join(&self.manifest_name))
    }

    /// Snapshot the live directory under `name`, replacing any existing pack
    pub fn save_snapshot(
        &self,
        name: &str,
        description: &str,
        snapshot: &InstalledSnapshot,
    ) -> Result<Pack> {
        let pack_dir = self.pack_dir(name)?;

        if filesystem::remove_entry(&pack_dir)? {
            debug!("Removed previous contents of pack {}", name);
        }

        if self.live_dir.exists() {
            let files = filesystem::copy_dir_filtered(
                &self.live_dir,
                &pack_dir,
                &[self.manifest_name.as_str()],
            )?;
            debug!("Copied {} files from {} into pack {}", files, self.live_dir.display(), name);
        } else {
            fs::create_dir_all(&pack_dir)?;
        }

        let pack = Pack::new(name, description, snapshot.clone());
        self.write_manifest(&pack)?;

        info!("Saved pack {} ({} components)", name, snapshot.len());
        Ok(pack)
    }

    /// Read the manifest of pack `name`
    pub fn load_snapshot(&self, name: &str) -> Result<Pack> {
        let path = self.manifest_path(name)?;
        Self::read_manifest(&path)
    }

    /// Parse a manifest file; malformed content is `ManifestParse`
    pub fn read_manifest(path: &Path) -> Result<Pack> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::ManifestParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write a pack's manifest atomically into its folder
    pub fn write_manifest(&self, pack: &Pack) -> Result<()> {
        let pack_dir = self.pack_dir(&pack.name)?;
        fs::create_dir_all(&pack_dir)?;

        let json = serde_json::to_string_pretty(pack)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&pack_dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(pack_dir.join(&self.manifest_name))
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Delete a pack folder. Returns false if it did not exist.
    pub fn remove_pack_dir(&self, name: &str) -> Result<bool> {
        let pack_dir = self.pack_dir(name)?;
        Ok(filesystem::remove_entry(&pack_dir)?)
    }

    /// Component entries stored in a pack folder (manifest excluded)
    pub fn stored_entries(&self, name: &str) -> Result<Vec<String>> {
        let pack_dir = self.pack_dir(name)?;
        let mut entries = filesystem::list_entries(&pack_dir)?;
        entries.retain(|e| *e != self.manifest_name);
        Ok(entries)
    }
}
