// src/lib.rs

//! packshift: named component packs for a host application
//!
//! A pack is a named snapshot of the host's live component directory.
//! packshift saves packs, lists them, removes them, and switches the live
//! directory between them atomically: a failed switch leaves the live
//! directory exactly as it was.
//!
//! # Architecture
//!
//! - Catalog and installer: read-only component lookup and materialization
//! - Resolver: dependency closure over the catalog graph
//! - Packs: folder-per-pack storage with a JSON manifest, plus an in-memory registry
//! - Transaction: the switch engine, a journaled saga with crash recovery
//! - Manager: the list/load/save/remove surface over all of the above

pub mod catalog;
pub mod config;
mod error;
pub mod filesystem;
pub mod host;
pub mod manager;
pub mod pack;
pub mod paths;
pub mod progress;
pub mod resolver;
pub mod transaction;

pub use catalog::{
    Catalog, ComponentDescriptor, ComponentId, DirectoryInstaller, InstallState, Installer,
    JsonCatalog, MemoryCatalog,
};
pub use config::{ConfigError, PackshiftConfig};
pub use error::{Error, Result};
pub use host::{HostMonitor, NoHost, ProcessMonitor};
pub use manager::PackManager;
pub use pack::{InstalledSnapshot, Pack, PackRegistry, PackStore};
pub use progress::{CallbackProgress, LogProgress, ProgressEvent, ProgressTracker, SilentProgress};
pub use resolver::compute_closure;
pub use transaction::{
    RecoveryOutcome, RootLock, SwitchConfig, SwitchEngine, SwitchOutcome, SwitchState,
};
