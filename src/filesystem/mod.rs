// src/filesystem/mod.rs

//! Filesystem operations for packshift
//!
//! This module provides:
//! - Name sanitization for pack and component folders
//! - Stateless directory primitives (recursive copy, move with cross-device
//!   fallback, entry removal and enumeration)

mod ops;
pub mod path;

pub use ops::{
    copy_dir_filtered, copy_dir_recursive, copy_entry, entry_exists, list_entries, move_dir,
    remove_entry,
};
