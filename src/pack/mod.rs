// src/pack/mod.rs

//! Packs: named, durable snapshots of an installed component set
//!
//! A pack lives in a folder under the managed root, named after the pack.
//! The folder holds a copy of the component entries plus a JSON manifest:
//!
//! ```json
//! {
//!   "name": "survival",
//!   "description": "Hard mode with the map overhaul",
//!   "installedMods": {
//!     "mods": { "maps": { "version": "1.2.0" } },
//!     "notInCatalogMods": { "my-local-tweak": null }
//!   }
//! }
//! ```

mod registry;
mod store;

pub use registry::{PackRegistry, RemoveOutcome, SkippedPack};
pub use store::PackStore;

use crate::catalog::{Catalog, ComponentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque per-component metadata, round-tripped verbatim
pub type ComponentMetadata = serde_json::Value;

/// Two disjoint name → metadata mappings describing an installed set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledSnapshot {
    /// Components the catalog knows
    #[serde(default)]
    pub mods: BTreeMap<ComponentId, ComponentMetadata>,

    /// Components installed outside the catalog
    #[serde(default)]
    pub not_in_catalog_mods: BTreeMap<ComponentId, ComponentMetadata>,
}

impl InstalledSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a catalog-known component, moving it out of the other mapping
    pub fn insert_cataloged(&mut self, id: impl Into<ComponentId>, metadata: ComponentMetadata) {
        let id = id.into();
        self.not_in_catalog_mods.remove(&id);
        self.mods.insert(id, metadata);
    }

    /// Record a component the catalog does not know, moving it out of the other mapping
    pub fn insert_uncataloged(&mut self, id: impl Into<ComponentId>, metadata: ComponentMetadata) {
        let id = id.into();
        self.mods.remove(&id);
        self.not_in_catalog_mods.insert(id, metadata);
    }

    /// Drop a component from whichever mapping holds it
    pub fn remove(&mut self, id: &str) -> Option<ComponentMetadata> {
        self.mods
            .remove(id)
            .or_else(|| self.not_in_catalog_mods.remove(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mods.contains_key(id) || self.not_in_catalog_mods.contains_key(id)
    }

    /// All component identifiers, catalog-known first
    pub fn component_ids(&self) -> impl Iterator<Item = &ComponentId> {
        self.mods.keys().chain(self.not_in_catalog_mods.keys())
    }

    pub fn len(&self) -> usize {
        self.mods.len() + self.not_in_catalog_mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty() && self.not_in_catalog_mods.is_empty()
    }

    /// Build a snapshot from materialized entry names
    ///
    /// Entries the catalog knows take the catalog's metadata; the rest are
    /// recorded as not-in-catalog with null metadata. `skip` names entries that
    /// are not components (the housekeeping file).
    pub fn from_entries<C, I, S>(entries: I, catalog: &C, skip: &[&str]) -> Self
    where
        C: Catalog + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut snapshot = Self::new();
        for entry in entries {
            let name = entry.as_ref();
            if skip.contains(&name) {
                continue;
            }
            match catalog.lookup(name) {
                Some(descriptor) => snapshot.insert_cataloged(name, descriptor.metadata),
                None => snapshot.insert_uncataloged(name, ComponentMetadata::Null),
            }
        }
        snapshot
    }
}

/// A named snapshot plus its description; also the manifest schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "installedMods", default)]
    pub installed: InstalledSnapshot,
}

impl Pack {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        installed: InstalledSnapshot,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            installed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ComponentDescriptor, MemoryCatalog};
    use serde_json::json;

    #[test]
    fn test_snapshot_mappings_stay_disjoint() {
        let mut snapshot = InstalledSnapshot::new();
        snapshot.insert_uncataloged("maps", json!(null));
        snapshot.insert_cataloged("maps", json!({"version": "2"}));

        assert!(snapshot.mods.contains_key("maps"));
        assert!(!snapshot.not_in_catalog_mods.contains_key("maps"));
        assert_eq!(snapshot.len(), 1);

        snapshot.insert_uncataloged("maps", json!(null));
        assert!(!snapshot.mods.contains_key("maps"));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_snapshot_remove() {
        let mut snapshot = InstalledSnapshot::new();
        snapshot.insert_cataloged("a", json!(1));
        snapshot.insert_uncataloged("b", json!(2));

        assert_eq!(snapshot.remove("b"), Some(json!(2)));
        assert_eq!(snapshot.remove("b"), None);
        assert!(snapshot.contains("a"));
        assert_eq!(snapshot.component_ids().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_snapshot_from_entries() {
        let catalog = MemoryCatalog::new()
            .with(ComponentDescriptor::new("maps").with_metadata(json!({"version": "1.2"})));

        let snapshot = InstalledSnapshot::from_entries(
            ["maps", "local-tweak", "mod-list.json"],
            &catalog,
            &["mod-list.json"],
        );

        assert_eq!(snapshot.mods.get("maps"), Some(&json!({"version": "1.2"})));
        assert_eq!(snapshot.not_in_catalog_mods.get("local-tweak"), Some(&json!(null)));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_manifest_schema_field_names() {
        let mut installed = InstalledSnapshot::new();
        installed.insert_cataloged("maps", json!({"version": "1.2"}));
        installed.insert_uncataloged("tweak", json!(null));
        let pack = Pack::new("survival", "Hard mode", installed);

        let value = serde_json::to_value(&pack).unwrap();
        assert_eq!(value["name"], "survival");
        assert_eq!(value["installedMods"]["mods"]["maps"]["version"], "1.2");
        assert!(value["installedMods"]["notInCatalogMods"]
            .as_object()
            .unwrap()
            .contains_key("tweak"));
    }

    #[test]
    fn test_manifest_missing_sections_default() {
        let pack: Pack = serde_json::from_str(r#"{ "name": "bare" }"#).unwrap();
        assert_eq!(pack.description, "");
        assert!(pack.installed.is_empty());
    }
}
