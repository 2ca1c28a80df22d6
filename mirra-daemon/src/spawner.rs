//! Backgrounding without a service manager.
//!
//! The front end asks a [`ProcessSpawner`] for a detached copy of the daemon;
//! the daemon itself only ever runs in the foreground.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{io_err, DaemonError};
use crate::paths::{logs_dir, stderr_log_path, stdout_log_path};

pub trait ProcessSpawner {
    /// Start a daemon for `config_dir` in the background and return its pid.
    fn spawn_daemon(&self, config_dir: &Path, verbose: bool) -> Result<u32, DaemonError>;
}

/// Re-runs an executable as `daemon start --foreground`, with output
/// appended to the files under `<config_dir>/logs`.
#[derive(Debug, Clone)]
pub struct DetachedSpawner {
    binary: PathBuf,
}

impl DetachedSpawner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Spawner for the running executable.
    pub fn current_exe() -> Result<Self, DaemonError> {
        let binary = std::env::current_exe().map_err(|e| io_err("current executable", e))?;
        Ok(Self::new(binary))
    }
}

impl ProcessSpawner for DetachedSpawner {
    fn spawn_daemon(&self, config_dir: &Path, verbose: bool) -> Result<u32, DaemonError> {
        let logs = logs_dir(config_dir);
        fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;
        let stdout = append(&stdout_log_path(config_dir))?;
        let stderr = append(&stderr_log_path(config_dir))?;

        let mut command = Command::new(&self.binary);
        command
            .args(["daemon", "start", "--foreground", "--config-dir"])
            .arg(config_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        if verbose {
            command.arg("--verbose");
        }
        detach(&mut command);

        let child = command.spawn().map_err(|e| io_err(&self.binary, e))?;
        tracing::info!(pid = child.id(), "spawned background daemon");
        Ok(child.id())
    }
}

fn append(path: &Path) -> Result<fs::File, DaemonError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // Own process group: a Ctrl-C in the launching terminal does not reach it.
    command.process_group(0);
}

#[cfg(not(unix))]
fn detach(_command: &mut Command) {}
