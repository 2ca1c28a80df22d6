//! Error types for mirra-sync.

use std::path::PathBuf;

use thiserror::Error;

use mirra_core::error::ConfigError;

/// All errors that can arise from link and version-control operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error loading the manifest or settings.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `git` invocation exited unsuccessfully.
    #[error("git {command} failed: {output}")]
    Git { command: String, output: String },

    /// A `gh` invocation exited unsuccessfully.
    #[error("gh {command} failed: {output}")]
    Hosting { command: String, output: String },

    /// A `git` invocation could not be spawned at all.
    #[error("failed to run git {command}: {source}")]
    GitSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
