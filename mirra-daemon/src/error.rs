use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime, lifecycle and service management.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("config error: {0}")]
    Config(#[from] mirra_core::ConfigError),

    #[error("sync error: {0}")]
    Sync(#[from] mirra_sync::SyncError),

    #[error("daemon is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("failed to signal pid {pid}: {message}")]
    Signal { pid: u32, message: String },

    #[error("service error: {0}")]
    Service(String),

    #[error("{0} task failed: {1}")]
    Join(&'static str, String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
