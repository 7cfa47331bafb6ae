// src/config.rs

//! packshift configuration
//!
//! # Example config.toml
//!
//! ```toml
//! # Directory holding the live components folder and every pack folder
//! root = "/home/me/.local/share/game/packs"
//!
//! # Live components folder, relative to root
//! live_dir_name = "mods"
//!
//! # Secondary location for disabled components
//! disabled_dir = "/home/me/.local/share/game/mods-disabled"
//!
//! # Entry in the live/disabled folders that is never pruned
//! housekeeping_name = "mod-list.json"
//!
//! # Executable name of the host application
//! host_process = "game.bin"
//!
//! # Catalog index and local component cache
//! catalog = "/home/me/.cache/packshift/catalog.json"
//! component_cache = "/home/me/.cache/packshift/components"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::paths;

/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "PACKSHIFT_CONFIG";

/// Default live components folder name
pub const DEFAULT_LIVE_DIR_NAME: &str = "mods";

/// Default manifest file name inside a pack folder
pub const DEFAULT_MANIFEST_NAME: &str = "pack.json";

/// Default housekeeping entry that pruning never touches
pub const DEFAULT_HOUSEKEEPING_NAME: &str = "mod-list.json";

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No data directory available; set `root` in the config file")]
    NoDataDir,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackshiftConfig {
    /// Managed root holding the live folder and all pack folders
    pub root: PathBuf,

    #[serde(default = "default_live_dir_name")]
    pub live_dir_name: String,

    /// Disabled components location (default: `<root>/mods-disabled`)
    #[serde(default)]
    pub disabled_dir: Option<PathBuf>,

    #[serde(default = "default_housekeeping_name")]
    pub housekeeping_name: String,

    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Host executable name; no host check when unset
    #[serde(default)]
    pub host_process: Option<String>,

    /// Catalog index (default: `<root>/catalog.json`)
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    /// Local component cache used by the installer (default: `<root>/cache`)
    #[serde(default)]
    pub component_cache: Option<PathBuf>,
}

fn default_live_dir_name() -> String {
    DEFAULT_LIVE_DIR_NAME.to_string()
}

fn default_housekeeping_name() -> String {
    DEFAULT_HOUSEKEEPING_NAME.to_string()
}

fn default_manifest_name() -> String {
    DEFAULT_MANIFEST_NAME.to_string()
}

impl PackshiftConfig {
    /// Defaults rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            live_dir_name: default_live_dir_name(),
            disabled_dir: None,
            housekeeping_name: default_housekeeping_name(),
            manifest_name: default_manifest_name(),
            host_process: None,
            catalog: None,
            component_cache: None,
        }
    }

    /// Parse a config from TOML text
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Resolve configuration: explicit path, then `$PACKSHIFT_CONFIG`, then
    /// the per-user config file, then defaults under the user data dir
    pub fn discover(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            return Self::load_file(Path::new(&env_path));
        }

        if let Some(user_config) = dirs::config_dir().map(|d| d.join("packshift/config.toml"))
            && user_config.exists()
        {
            tracing::debug!("Using config {}", user_config.display());
            return Self::load_file(&user_config);
        }

        let data_dir = dirs::data_local_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(Self::with_root(data_dir.join("packshift")))
    }

    /// Check internal consistency
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("live_dir_name", &self.live_dir_name),
            ("manifest_name", &self.manifest_name),
            ("housekeeping_name", &self.housekeeping_name),
        ] {
            if crate::filesystem::path::sanitize_name(value).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a single path component, got '{}'",
                    field, value
                )));
            }
        }

        if paths::is_bookkeeping(&self.live_dir_name) {
            return Err(ConfigError::Invalid(format!(
                "live_dir_name '{}' collides with packshift bookkeeping",
                self.live_dir_name
            )));
        }

        Ok(())
    }

    /// Live components folder
    pub fn live_dir(&self) -> PathBuf {
        self.root.join(&self.live_dir_name)
    }

    /// Disabled components folder
    pub fn disabled_dir(&self) -> PathBuf {
        self.disabled_dir
            .clone()
            .unwrap_or_else(|| self.root.join(format!("{}-disabled", self.live_dir_name)))
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog
            .clone()
            .unwrap_or_else(|| self.root.join("catalog.json"))
    }

    pub fn component_cache(&self) -> PathBuf {
        self.component_cache
            .clone()
            .unwrap_or_else(|| self.root.join("cache"))
    }

    /// Root entry names that are never packs
    pub fn reserved_names(&self) -> Vec<String> {
        let mut names = vec![self.live_dir_name.clone()];
        for path in [self.disabled_dir(), self.component_cache()] {
            if path.parent() == Some(self.root.as_path())
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                names.push(name.to_string());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PackshiftConfig::with_root("/srv/packs");

        assert_eq!(config.live_dir(), PathBuf::from("/srv/packs/mods"));
        assert_eq!(config.disabled_dir(), PathBuf::from("/srv/packs/mods-disabled"));
        assert_eq!(config.catalog_path(), PathBuf::from("/srv/packs/catalog.json"));
        assert_eq!(config.manifest_name, "pack.json");
        assert_eq!(
            config.reserved_names(),
            vec!["mods".to_string(), "mods-disabled".to_string(), "cache".to_string()]
        );
    }

    #[test]
    fn test_parse_minimal() {
        let config = PackshiftConfig::parse(r#"root = "/srv/packs""#).unwrap();
        assert_eq!(config, PackshiftConfig::with_root("/srv/packs"));
    }

    #[test]
    fn test_parse_full() {
        let toml = r#"
root = "/srv/packs"
live_dir_name = "addons"
disabled_dir = "/srv/disabled"
housekeeping_name = "addons.txt"
host_process = "game.bin"
"#;
        let config = PackshiftConfig::parse(toml).unwrap();

        assert_eq!(config.live_dir(), PathBuf::from("/srv/packs/addons"));
        assert_eq!(config.disabled_dir(), PathBuf::from("/srv/disabled"));
        assert_eq!(config.host_process.as_deref(), Some("game.bin"));
        // Disabled dir outside the root is not a reserved root entry
        assert_eq!(config.reserved_names(), vec!["addons".to_string(), "cache".to_string()]);
    }

    #[test]
    fn test_parse_rejects_nested_live_dir() {
        let err = PackshiftConfig::parse(
            r#"
root = "/srv/packs"
live_dir_name = "a/b"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_rejects_bookkeeping_collision() {
        let err = PackshiftConfig::parse(
            r#"
root = "/srv/packs"
live_dir_name = ".packshift-holding"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = PackshiftConfig::load_file(Path::new("/nonexistent/packshift.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
