// src/filesystem/path.rs

//! Name sanitization for pack and component folders
//!
//! Pack names come from users and component identifiers come from catalogs
//! and manifests. Both end up as a single directory entry under a managed
//! root, so both must be exactly one normal path component.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Validate a name that must map to exactly one directory entry
///
/// # Examples
///
/// ```
/// use packshift::filesystem::path::sanitize_name;
///
/// assert_eq!(sanitize_name("Survival Run").unwrap(), "Survival Run");
/// assert!(sanitize_name("../escape").is_err());
/// assert!(sanitize_name("nested/pack").is_err());
/// assert!(sanitize_name("").is_err());
/// ```
pub fn sanitize_name(name: &str) -> Result<&str> {
    if name.trim().is_empty() || name.contains('\0') {
        return Err(Error::InvalidPackName(name.to_string()));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(Error::PathTraversal(format!(
            "Name contains path separator: {}",
            name
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        (Some(Component::ParentDir), _) | (Some(Component::CurDir), _) => {
            Err(Error::PathTraversal(format!("Invalid name: {}", name)))
        }
        _ => Err(Error::InvalidPackName(name.to_string())),
    }
}

/// Join a root with a sanitized single-component name
///
/// ```
/// use packshift::filesystem::path::safe_join;
/// use std::path::{Path, PathBuf};
///
/// let root = Path::new("/srv/packs");
/// assert_eq!(safe_join(root, "hardcore").unwrap(), PathBuf::from("/srv/packs/hardcore"));
/// assert!(safe_join(root, "..").is_err());
/// ```
pub fn safe_join(root: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
    let name = sanitize_name(name)?;
    Ok(root.as_ref().join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name_normal() {
        assert_eq!(sanitize_name("vanilla").unwrap(), "vanilla");
        assert_eq!(sanitize_name("pack-1.0").unwrap(), "pack-1.0");
        assert_eq!(sanitize_name(".hidden").unwrap(), ".hidden");
    }

    #[test]
    fn test_sanitize_name_traversal_rejected() {
        assert!(matches!(sanitize_name(".."), Err(Error::PathTraversal(_))));
        assert!(matches!(sanitize_name("."), Err(Error::PathTraversal(_))));
        assert!(sanitize_name("a/b").is_err());
        assert!(sanitize_name("a\\b").is_err());
        assert!(sanitize_name("/abs").is_err());
    }

    #[test]
    fn test_sanitize_name_empty_rejected() {
        assert!(matches!(sanitize_name(""), Err(Error::InvalidPackName(_))));
        assert!(matches!(sanitize_name("   "), Err(Error::InvalidPackName(_))));
        assert!(sanitize_name("nul\0byte").is_err());
    }

    #[test]
    fn test_safe_join() {
        let root = PathBuf::from("/tmp/packs");
        assert_eq!(
            safe_join(&root, "speedrun").unwrap(),
            PathBuf::from("/tmp/packs/speedrun")
        );
        assert!(safe_join(&root, "../etc").is_err());
    }
}
