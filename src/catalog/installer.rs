// src/catalog/installer.rs

//! Component installers
//!
//! An installer materializes one component into the live directory. The
//! switch engine decides *what* to install; installers only know *how*.

use super::ComponentDescriptor;
use crate::error::{Error, Result};
use crate::filesystem::{self, path::safe_join};
use std::path::{Path, PathBuf};

/// Materializes a component on disk
pub trait Installer {
    /// Install `descriptor` so that `live_dir/<id>` exists afterwards
    fn install(&self, descriptor: &ComponentDescriptor, live_dir: &Path) -> Result<()>;
}

impl<I: Installer + ?Sized> Installer for &I {
    fn install(&self, descriptor: &ComponentDescriptor, live_dir: &Path) -> Result<()> {
        (**self).install(descriptor, live_dir)
    }
}

/// Installs components by copying them out of a local cache directory
///
/// The cache holds one entry per component, named by identifier, laid out
/// exactly as it should appear in the live directory.
#[derive(Debug, Clone)]
pub struct DirectoryInstaller {
    cache_dir: PathBuf,
}

impl DirectoryInstaller {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

impl Installer for DirectoryInstaller {
    fn install(&self, descriptor: &ComponentDescriptor, live_dir: &Path) -> Result<()> {
        let source = safe_join(&self.cache_dir, &descriptor.id)?;
        if !filesystem::entry_exists(&source) {
            return Err(Error::install(
                &descriptor.id,
                format!("not present in component cache {}", self.cache_dir.display()),
            ));
        }

        let target = safe_join(live_dir, &descriptor.id)?;
        let files = filesystem::copy_entry(&source, &target)
            .map_err(|e| Error::install(&descriptor.id, e))?;

        tracing::debug!("Installed {} ({} files)", descriptor.id, files);
        Ok(())
    }
}
