// src/error.rs

//! Error types for packshift
//!
//! Errors fall into three groups:
//!
//! - **Pre-check errors** (`PackNotFound`, `HostRunning`, `RecoveryRequired`):
//!   reported before anything on disk changes.
//! - **Mutating-phase errors** (`StagingIo`, `Install`, `PruneIo`): raised
//!   while a switch is in flight. The engine always rolls back and hands the
//!   caller a single `SwitchFailed` wrapping the first cause.
//! - **`RollbackFailure`**: the rollback itself could not restore the old
//!   state. This is the only condition that needs manual recovery.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for packshift operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Requested pack is not in the registry
    #[error("pack not found: {0}")]
    PackNotFound(String),

    /// Host application is running and the user declined to close it
    #[error("host application '{0}' is running and was not closed")]
    HostRunning(String),

    /// Host application could not be terminated
    #[error("failed to terminate host application '{name}': {reason}")]
    HostTerminate { name: String, reason: String },

    /// An interrupted switch left state behind that must be recovered first
    #[error("an interrupted switch needs recovery first: {0}")]
    RecoveryRequired(String),

    /// Filesystem failure while staging or applying a pack
    #[error("staging failed at {path}: {source}")]
    StagingIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Installer failed to materialize a component
    #[error("failed to install component '{component}': {reason}")]
    Install { component: String, reason: String },

    /// Filesystem failure while pruning leftover components
    #[error("failed to prune {path}: {source}")]
    PruneIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pack manifest could not be parsed
    #[error("malformed manifest {path}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    /// Switch failed and was rolled back
    #[error("switch to pack '{pack}' failed and was rolled back: {cause}")]
    SwitchFailed { pack: String, cause: Box<Error> },

    /// Rollback could not restore the previous state
    #[error(
        "switch to pack '{pack}' failed ({cause}) and rollback did not complete: {reason}; manual recovery required"
    )]
    RollbackFailure {
        pack: String,
        cause: Box<Error>,
        reason: String,
    },

    /// Pack name cannot be used as a folder name
    #[error("invalid pack name '{0}'")]
    InvalidPackName(String),

    /// Path contains traversal components
    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    /// Catalog index could not be loaded
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Switch journal problem
    #[error("journal error: {0}")]
    Journal(String),

    /// Another process holds the managed root lock
    #[error("managed root is locked: {0}")]
    Locked(String),

    /// Configuration problem
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// IO error outside the switch phases
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an install error from any displayable reason
    pub fn install(component: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Install {
            component: component.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a staging error for a path
    pub fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StagingIo {
            path: path.into(),
            source,
        }
    }

    /// Build a prune error for a path
    pub fn prune(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PruneIo {
            path: path.into(),
            source,
        }
    }

    /// True when the on-disk state may be inconsistent and needs manual repair
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::RollbackFailure { .. })
    }

    /// True for errors raised before any mutation happened
    pub fn is_precheck(&self) -> bool {
        matches!(
            self,
            Self::PackNotFound(_)
                | Self::HostRunning(_)
                | Self::HostTerminate { .. }
                | Self::RecoveryRequired(_)
        )
    }

    /// Underlying cause for aggregate switch errors, the error itself otherwise
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::SwitchFailed { cause, .. } | Self::RollbackFailure { cause, .. } => {
                cause.root_cause()
            }
            other => other,
        }
    }
}
