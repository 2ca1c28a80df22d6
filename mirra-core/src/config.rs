//! Settings and manifest persistence.
//!
//! # Storage layout
//!
//! ```text
//! ~/.config/mirra/          (config dir, overridable with --config-dir)
//!   mirra.yaml              (local settings)
//!   daemon.pid              (lifecycle record)
//!   logs/                   (daemon stdout / stderr when backgrounded)
//!   repo/                   (canonical directory unless repo_path is set)
//!     mirra.yaml            (manifest: ordered entry list)
//!     <source files>
//! ```
//!
//! Every function takes the config directory explicitly; only
//! [`default_config_dir`] consults the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{io_err, ConfigError};
use crate::paths;
use crate::types::{LocalSettings, Manifest};

pub const SETTINGS_FILE: &str = "mirra.yaml";
pub const MANIFEST_FILE: &str = "mirra.yaml";
pub const PID_FILE: &str = "daemon.pid";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `~/.config/mirra`
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    Ok(paths::home_dir()?.join(".config").join("mirra"))
}

pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE)
}

pub fn pid_path(config_dir: &Path) -> PathBuf {
    config_dir.join(PID_FILE)
}

pub fn logs_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("logs")
}

/// Canonical directory: `settings.repo_path` when set, else `<config_dir>/repo`.
pub fn repo_dir(config_dir: &Path, settings: &LocalSettings) -> PathBuf {
    match settings.repo_path.as_deref() {
        Some(raw) if !raw.trim().is_empty() => paths::expand_path(raw),
        _ => config_dir.join("repo"),
    }
}

pub fn manifest_path(repo_dir: &Path) -> PathBuf {
    repo_dir.join(MANIFEST_FILE)
}

// ---------------------------------------------------------------------------
// 2. Local settings
// ---------------------------------------------------------------------------

/// Load `<config_dir>/mirra.yaml`; a missing file yields defaults.
pub fn load_settings_at(config_dir: &Path) -> Result<LocalSettings, ConfigError> {
    let path = settings_path(config_dir);
    match std::fs::read_to_string(&path) {
        Ok(contents) if contents.trim().is_empty() => Ok(LocalSettings::default()),
        Ok(contents) => {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(LocalSettings::default()),
        Err(err) => Err(io_err(path, err)),
    }
}

pub fn save_settings_at(config_dir: &Path, settings: &LocalSettings) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(settings)?;
    write_atomic(&settings_path(config_dir), &yaml)
}

// ---------------------------------------------------------------------------
// 3. Manifest
// ---------------------------------------------------------------------------

/// Load `<repo_dir>/mirra.yaml`; a missing file yields an empty manifest.
///
/// Rejects manifests in which two entries share a name.
pub fn load_manifest_at(repo_dir: &Path) -> Result<Manifest, ConfigError> {
    let path = manifest_path(repo_dir);
    let manifest: Manifest = match std::fs::read_to_string(&path) {
        Ok(contents) if contents.trim().is_empty() => Manifest::default(),
        Ok(contents) => serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Manifest::default()),
        Err(err) => return Err(io_err(path, err)),
    };

    if let Some(name) = manifest.duplicate_name() {
        return Err(ConfigError::DuplicateEntry {
            name: name.0.clone(),
            path,
        });
    }
    Ok(manifest)
}

pub fn save_manifest_at(repo_dir: &Path, manifest: &Manifest) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(manifest)?;
    write_atomic(&manifest_path(repo_dir), &yaml)
}

// ---------------------------------------------------------------------------
// 4. Poll interval
// ---------------------------------------------------------------------------

pub fn default_poll_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

/// Parse a duration string like `5m`, `90s`, `1h30m` or `250ms`.
///
/// Invalid or zero intervals fall back to [`default_poll_interval`].
pub fn parse_interval(raw: &str) -> Duration {
    match parse_duration(raw.trim()) {
        Some(d) if !d.is_zero() => d,
        _ => default_poll_interval(),
    }
}

fn parse_duration(raw: &str) -> Option<Duration> {
    if raw.is_empty() {
        return None;
    }
    let mut total = Duration::ZERO;
    let mut rest = raw;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60)?),
            "h" => Duration::from_secs(value.checked_mul(3600)?),
            _ => return None,
        };
        total = total.checked_add(unit)?;
        rest = &rest[unit_len..];
    }
    Some(total)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Write flow: `<file>.tmp` sibling → `rename`.
fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| SETTINGS_FILE.to_string());
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, err));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
