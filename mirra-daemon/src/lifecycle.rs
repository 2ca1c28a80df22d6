//! Single-instance guard backed by `<config_dir>/daemon.pid`.
//!
//! A record whose process no longer exists is stale: every query deletes it
//! and reports the daemon as not running.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{io_err, DaemonError};
use crate::paths::pid_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<u32>,
}

/// Held by the running daemon; removes its record on drop.
#[derive(Debug)]
pub struct PidGuard {
    path: PathBuf,
    pid: u32,
}

impl PidGuard {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        // Leave a record that another instance wrote after us.
        if read_record(&self.path).ok().flatten() == Some(self.pid) {
            if let Err(err) = fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to remove pid file");
            }
        }
    }
}

/// Claim the record for the current process.
pub fn acquire(config_dir: &Path) -> Result<PidGuard, DaemonError> {
    if let Some(pid) = live_pid(config_dir)? {
        return Err(DaemonError::AlreadyRunning { pid });
    }

    let path = pid_path(config_dir);
    fs::create_dir_all(config_dir).map_err(|e| io_err(config_dir, e))?;
    let pid = std::process::id();
    fs::write(&path, format!("{pid}\n")).map_err(|e| io_err(&path, e))?;
    tracing::debug!(pid, path = %path.display(), "wrote pid file");
    Ok(PidGuard { path, pid })
}

pub fn status(config_dir: &Path) -> Result<DaemonStatus, DaemonError> {
    let pid = live_pid(config_dir)?;
    Ok(DaemonStatus {
        running: pid.is_some(),
        pid,
    })
}

/// Ask `pid` to terminate, then remove the record whether or not the
/// signal was delivered.
pub fn stop(config_dir: &Path, pid: u32) -> Result<(), DaemonError> {
    let signalled = terminate(pid);
    remove_record(&pid_path(config_dir))?;
    signalled
}

/// Recorded pid if that process is alive; clears stale records.
fn live_pid(config_dir: &Path) -> Result<Option<u32>, DaemonError> {
    let path = pid_path(config_dir);
    let recorded = match read_record(&path) {
        Ok(recorded) => recorded,
        Err(RecordError::Malformed) => {
            tracing::info!(path = %path.display(), "removing malformed pid file");
            remove_record(&path)?;
            return Ok(None);
        }
        Err(RecordError::Io(err)) => return Err(io_err(&path, err)),
    };

    match recorded {
        Some(pid) if is_alive(pid) => Ok(Some(pid)),
        Some(pid) => {
            tracing::info!(pid, "removing stale pid file");
            remove_record(&path)?;
            Ok(None)
        }
        None => Ok(None),
    }
}

enum RecordError {
    Malformed,
    Io(std::io::Error),
}

fn read_record(path: &Path) -> Result<Option<u32>, RecordError> {
    match fs::read_to_string(path) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| RecordError::Malformed),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(RecordError::Io(err)),
    }
}

fn remove_record(path: &Path) -> Result<(), DaemonError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    // Signal 0 probes existence; EPERM means it exists under another user.
    matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(windows)]
fn is_alive(pid: u32) -> bool {
    use std::process::Command;

    let output = Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/FO", "CSV", "/NH"])
        .output();
    match output {
        // No match prints an INFO line instead of a CSV row.
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).contains(&format!("\"{pid}\""))
        }
        // Cannot tell; keep the record.
        _ => true,
    }
}

/// No liveness probe here: a record is trusted until `stop` removes it.
#[cfg(not(any(unix, windows)))]
fn is_alive(_pid: u32) -> bool {
    true
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<(), DaemonError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| DaemonError::Signal {
        pid,
        message: "pid out of range".to_string(),
    })?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|errno| DaemonError::Signal {
        pid,
        message: errno.desc().to_string(),
    })
}

#[cfg(windows)]
fn terminate(pid: u32) -> Result<(), DaemonError> {
    use std::process::Command;

    let output = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .output()
        .map_err(|e| io_err("taskkill", e))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(DaemonError::Signal {
            pid,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(not(any(unix, windows)))]
fn terminate(pid: u32) -> Result<(), DaemonError> {
    Err(DaemonError::Signal {
        pid,
        message: "signals are not supported on this platform".to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
