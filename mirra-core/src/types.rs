//! Domain types for mirra.
//!
//! Target paths are stored as strings (they may contain `~` or environment
//! placeholders and are only meaningful after [`crate::paths::resolve`]).
//! All types are serializable via serde + serde_yaml.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Unique key of a managed file inside the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryName(pub String);

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EntryName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntryName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Operating-system key used in an entry's target map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
    Other(String),
}

impl Platform {
    /// The platform this binary was built for.
    ///
    /// `macos` is reported as `darwin` so manifests written on any machine
    /// share the same keys.
    pub fn current() -> Self {
        Self::from_key(std::env::consts::OS)
    }

    pub fn from_key(key: &str) -> Self {
        match key {
            "linux" => Platform::Linux,
            "darwin" | "macos" => Platform::Darwin,
            "windows" => Platform::Windows,
            other => Platform::Other(other.to_owned()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
            Platform::Windows => "windows",
            Platform::Other(key) => key,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// A single managed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: EntryName,
    /// File name relative to the canonical directory.
    pub source: PathBuf,
    /// Platform key → target path string.
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
}

impl Entry {
    pub fn new(name: impl Into<EntryName>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            targets: BTreeMap::new(),
        }
    }

    /// Builder-style helper used by the CLI and tests.
    pub fn with_target(mut self, platform: &Platform, target: impl Into<String>) -> Self {
        self.targets.insert(platform.key().to_owned(), target.into());
        self
    }
}

/// Ordered entry list stored inside the canonical directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub files: Vec<Entry>,
}

impl Manifest {
    pub fn find(&self, name: &EntryName) -> Option<&Entry> {
        self.files.iter().find(|e| &e.name == name)
    }

    /// Insert `entry`, or merge its targets into an existing entry of the
    /// same name. Returns `true` when a new entry was appended.
    pub fn upsert(&mut self, entry: Entry) -> bool {
        match self.files.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => {
                existing.targets.extend(entry.targets);
                false
            }
            None => {
                self.files.push(entry);
                true
            }
        }
    }

    /// Remove and return the entry called `name`.
    pub fn remove(&mut self, name: &EntryName) -> Option<Entry> {
        let idx = self.files.iter().position(|e| &e.name == name)?;
        Some(self.files.remove(idx))
    }

    /// First name that appears more than once, if any.
    pub fn duplicate_name(&self) -> Option<&EntryName> {
        let mut seen = std::collections::HashSet::new();
        self.files
            .iter()
            .map(|e| &e.name)
            .find(|name| !seen.insert(*name))
    }
}

// ---------------------------------------------------------------------------
// Local settings
// ---------------------------------------------------------------------------

pub const DEFAULT_POLL_INTERVAL: &str = "5m";

/// Per-machine settings stored next to the canonical directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LocalSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Canonical directory; `<config_dir>/repo` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
    #[serde(default)]
    pub daemon: DaemonSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSettings {
    /// Duration string such as `5m`, `30s` or `1h30m`.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> String {
    DEFAULT_POLL_INTERVAL.to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
