// tests/registry.rs

//! Pack save, discovery and removal tests.

mod common;

use common::{Fixture, ScriptedInstaller, catalog, snapshot};
use packshift::{Error, MemoryCatalog, NoHost, PackRegistry};
use serde_json::json;
use std::fs;

#[test]
fn test_saved_pack_round_trips_through_discovery() {
    let fixture = Fixture::new();
    fixture.add_live("maps");
    fixture.add_live("local-tweak");
    let catalog = catalog(&[("maps", &[])]);

    {
        let mut manager = fixture.open(catalog.clone(), ScriptedInstaller::new(), NoHost);
        manager.save_pack("survival", "Hard mode").unwrap();
    }

    let manager = fixture.open(catalog, ScriptedInstaller::new(), NoHost);
    let pack = manager.find_pack("survival").unwrap();
    assert_eq!(pack.description, "Hard mode");
    assert_eq!(pack.installed.mods.get("maps"), Some(&json!({ "version": "1.0" })));
    assert_eq!(
        pack.installed.not_in_catalog_mods.get("local-tweak"),
        Some(&json!(null))
    );
    assert_eq!(
        fixture.store().stored_entries("survival").unwrap(),
        vec!["local-tweak", "maps"]
    );
}

#[test]
fn test_save_replaces_existing_pack() {
    let fixture = Fixture::new();
    fixture.add_live("maps");

    let mut manager = fixture.open(MemoryCatalog::new(), ScriptedInstaller::new(), NoHost);
    manager.save_pack("survival", "first").unwrap();

    fs::remove_dir_all(fixture.live().join("maps")).unwrap();
    fixture.add_live("rivers");
    manager.save_pack("survival", "second").unwrap();

    assert_eq!(manager.list_packs().len(), 1);
    let pack = fixture.read_manifest("survival");
    assert_eq!(pack.description, "second");
    assert_eq!(pack.installed, snapshot(&[], &["rivers"]));
    assert_eq!(
        fixture.store().stored_entries("survival").unwrap(),
        vec!["rivers"]
    );
}

#[test]
fn test_save_keeps_active_metadata_for_uncataloged_entries() {
    let fixture = Fixture::new();
    let mut installed = snapshot(&[], &[]);
    installed.insert_uncataloged("local-tweak", json!({ "source": "handmade" }));
    fixture.write_pack("custom", &["local-tweak"], installed);

    let mut manager = fixture.open(MemoryCatalog::new(), ScriptedInstaller::new(), NoHost);
    manager.load_pack("custom").unwrap();
    let saved = manager.save_pack("copy", "").unwrap();

    assert_eq!(
        saved.installed.not_in_catalog_mods.get("local-tweak"),
        Some(&json!({ "source": "handmade" }))
    );
}

#[test]
fn test_discovery_skips_bad_folders() {
    let fixture = Fixture::new();
    fixture.write_pack("good", &[], snapshot(&[], &[]));

    // Manifest that names a different pack
    let renamed = fixture.root().join("renamed");
    fs::create_dir_all(&renamed).unwrap();
    fs::write(renamed.join("pack.json"), r#"{ "name": "original" }"#).unwrap();

    // Manifest that is not JSON
    let broken = fixture.root().join("broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("pack.json"), "not json").unwrap();

    // Folder without a manifest is not a pack at all
    fs::create_dir_all(fixture.root().join("screenshots")).unwrap();

    let registry = PackRegistry::discover(&fixture.store()).unwrap();
    let names: Vec<&str> = registry.list().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["good"]);

    let mut skipped: Vec<&str> = registry
        .skipped()
        .iter()
        .map(|s| s.folder.as_str())
        .collect();
    skipped.sort();
    assert_eq!(skipped, vec!["broken", "renamed"]);
}

#[test]
fn test_discovery_ignores_bookkeeping_folders() {
    let fixture = Fixture::new();
    fixture.add_live("maps");
    fixture.write_pack("good", &[], snapshot(&[], &[]));

    // Even with a manifest, the live folder and bookkeeping folders are not packs
    fs::write(
        fixture.live().join("pack.json"),
        r#"{ "name": "mods" }"#,
    )
    .unwrap();
    let journal = fixture.root().join(".packshift-journal");
    fs::create_dir_all(&journal).unwrap();

    let registry = PackRegistry::discover(&fixture.store()).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.skipped().is_empty());
}

#[test]
fn test_packs_listed_in_byte_order() {
    let fixture = Fixture::new();
    for name in ["beta", "Alpha", "alpha", "_tools"] {
        fixture.write_pack(name, &[], snapshot(&[], &[]));
    }

    let manager = fixture.open(MemoryCatalog::new(), ScriptedInstaller::new(), NoHost);
    let names: Vec<&str> = manager.list_packs().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "_tools", "alpha", "beta"]);
}

#[test]
fn test_remove_pack_deletes_folder() {
    let fixture = Fixture::new();
    fixture.write_pack("old", &["maps"], snapshot(&[], &["maps"]));

    let mut manager = fixture.open(MemoryCatalog::new(), ScriptedInstaller::new(), NoHost);
    let outcome = manager.remove_pack("old");

    assert!(outcome.entry_removed);
    assert!(outcome.folder_removed);
    assert!(outcome.folder_error.is_none());
    assert!(manager.find_pack("old").is_none());
    assert!(!fixture.root().join("old").exists());

    let outcome = manager.remove_pack("old");
    assert!(outcome.was_absent());
}

#[test]
fn test_removed_pack_cannot_be_loaded() {
    let fixture = Fixture::new();
    fixture.write_pack("old", &[], snapshot(&[], &[]));

    let mut manager = fixture.open(MemoryCatalog::new(), ScriptedInstaller::new(), NoHost);
    manager.remove_pack("old");

    let err = manager.load_pack("old").unwrap_err();
    assert!(matches!(err, Error::PackNotFound(_)));
}

#[test]
fn test_invalid_pack_names_rejected() {
    let fixture = Fixture::new();
    fixture.add_live("maps");

    let mut manager = fixture.open(MemoryCatalog::new(), ScriptedInstaller::new(), NoHost);
    for name in ["", "..", "a/b", "mods", ".packshift-holding"] {
        assert!(manager.save_pack(name, "").is_err(), "accepted '{}'", name);
    }
    assert!(manager.list_packs().is_empty());
    assert_eq!(fixture.live_entries(), vec!["maps"]);
}
