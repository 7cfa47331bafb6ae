// src/catalog/mod.rs

//! Read interface to the add-on catalog
//!
//! The catalog is owned by someone else (a mod portal, a local index file).
//! packshift only ever looks components up by identifier and follows their
//! dependency edges. Nothing here writes to a catalog.

mod installer;

pub use installer::{DirectoryInstaller, Installer};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Unique component name, stable across sessions
pub type ComponentId = String;

/// Installation state tag reported by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    #[default]
    Available,
    Installed,
    Disabled,
    UpdateAvailable,
}

impl InstallState {
    /// Whether the catalog believes the component is on disk
    ///
    /// The disk stays authoritative; a mismatch only means the catalog is stale.
    pub fn claims_materialized(self) -> bool {
        !matches!(self, Self::Available)
    }
}

impl std::fmt::Display for InstallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Installed => write!(f, "installed"),
            Self::Disabled => write!(f, "disabled"),
            Self::UpdateAvailable => write!(f, "update available"),
        }
    }
}

/// A component as the catalog describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub id: ComponentId,
    #[serde(default)]
    pub dependencies: BTreeSet<ComponentId>,
    #[serde(default)]
    pub state: InstallState,
    /// Opaque metadata recorded into pack manifests
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ComponentDescriptor {
    pub fn new(id: impl Into<ComponentId>) -> Self {
        Self {
            id: id.into(),
            dependencies: BTreeSet::new(),
            state: InstallState::Available,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ComponentId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Read-only lookup of component descriptors
pub trait Catalog {
    /// Find a component by identifier; `None` means the catalog does not know it
    fn lookup(&self, id: &str) -> Option<ComponentDescriptor>;

    /// Whether the catalog knows this identifier
    fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_some()
    }
}

impl<C: Catalog + ?Sized> Catalog for &C {
    fn lookup(&self, id: &str) -> Option<ComponentDescriptor> {
        (**self).lookup(id)
    }
}

/// Catalog held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    components: HashMap<ComponentId, ComponentDescriptor>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a descriptor
    pub fn insert(&mut self, descriptor: ComponentDescriptor) {
        self.components.insert(descriptor.id.clone(), descriptor);
    }

    /// Builder-style insert
    pub fn with(mut self, descriptor: ComponentDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Catalog for MemoryCatalog {
    fn lookup(&self, id: &str) -> Option<ComponentDescriptor> {
        self.components.get(id).cloned()
    }
}

/// On-disk catalog index
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogIndex {
    #[serde(default)]
    components: Vec<ComponentDescriptor>,
}

/// Catalog loaded from a JSON index file
///
/// ```json
/// { "components": [ { "id": "maps", "dependencies": ["core-lib"] } ] }
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    inner: MemoryCatalog,
}

impl JsonCatalog {
    /// Load an index file. A missing file yields an empty catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Catalog index {} not found, using empty catalog", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Catalog(format!("{}: {}", path.display(), e)))
    }

    /// Parse an index from its JSON text
    pub fn parse(content: &str) -> Result<Self> {
        let index: CatalogIndex = serde_json::from_str(content)?;
        let mut inner = MemoryCatalog::new();
        for descriptor in index.components {
            inner.insert(descriptor);
        }
        Ok(Self { inner })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Catalog for JsonCatalog {
    fn lookup(&self, id: &str) -> Option<ComponentDescriptor> {
        self.inner.lookup(id)
    }
}
