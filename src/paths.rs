// src/paths.rs
//! Centralized path derivation for packshift working directories
//!
//! Everything the switch engine creates for its own bookkeeping lives
//! directly under the managed root with a `.packshift-` prefix, which keeps
//! it on the same volume as the live directory (renames stay atomic) and out
//! of pack discovery.

use std::path::{Path, PathBuf};

/// Prefix shared by all bookkeeping entries under the managed root
pub const RESERVED_PREFIX: &str = ".packshift-";

/// Where the previous live directory waits while a switch is in flight
pub fn holding_dir(root: &Path) -> PathBuf {
    root.join(".packshift-holding")
}

/// Where the target pack is assembled before it is renamed into place
pub fn incoming_dir(root: &Path) -> PathBuf {
    root.join(".packshift-incoming")
}

/// Where entries pruned from the disabled location wait until commit
pub fn trash_dir(root: &Path) -> PathBuf {
    root.join(".packshift-trash")
}

/// Directory for switch journals
pub fn journal_dir(root: &Path) -> PathBuf {
    root.join(".packshift-journal")
}

/// Advisory lock serializing mutating commands
pub fn lock_path(root: &Path) -> PathBuf {
    root.join(".packshift.lock")
}

/// File recording the name of the last successfully applied pack
pub fn active_marker(root: &Path) -> PathBuf {
    root.join(".packshift-active")
}

/// Whether a root entry name belongs to packshift's own bookkeeping
pub fn is_bookkeeping(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX) || name == ".packshift.lock"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_dirs_share_root() {
        let root = Path::new("/srv/game/packs");
        assert_eq!(holding_dir(root), PathBuf::from("/srv/game/packs/.packshift-holding"));
        assert_eq!(incoming_dir(root), PathBuf::from("/srv/game/packs/.packshift-incoming"));
        assert_eq!(journal_dir(root), PathBuf::from("/srv/game/packs/.packshift-journal"));
        assert_eq!(lock_path(root), PathBuf::from("/srv/game/packs/.packshift.lock"));
    }

    #[test]
    fn test_is_bookkeeping() {
        assert!(is_bookkeeping(".packshift-holding"));
        assert!(is_bookkeeping(".packshift-active"));
        assert!(is_bookkeeping(".packshift.lock"));
        assert!(!is_bookkeeping("survival"));
        assert!(!is_bookkeeping(".hidden-pack"));
    }
}
