//! Read-only per-entry status, as shown by `mirra list`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use mirra_core::{
    paths,
    types::{Entry, Platform},
};

use crate::link::{classify, LinkState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Target is a link to the canonical file.
    Synced,
    /// Canonical file or target does not exist.
    Missing,
    /// Target exists but is not the expected link.
    Unlinked,
    /// No target for this platform.
    NoTarget,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryStatus::Synced => "synced",
            EntryStatus::Missing => "missing",
            EntryStatus::Unlinked => "unlinked",
            EntryStatus::NoTarget => "no target",
        })
    }
}

pub fn entry_status_at(
    home: &Path,
    entry: &Entry,
    canonical_dir: &Path,
    platform: &Platform,
) -> (Option<PathBuf>, EntryStatus) {
    let target = paths::resolve_at(home, entry, platform);
    let status = status_of(entry, target.as_deref(), canonical_dir);
    (target, status)
}

pub fn entry_status(
    entry: &Entry,
    canonical_dir: &Path,
    platform: &Platform,
) -> (Option<PathBuf>, EntryStatus) {
    let target = paths::resolve(entry, platform);
    let status = status_of(entry, target.as_deref(), canonical_dir);
    (target, status)
}

fn status_of(entry: &Entry, target: Option<&Path>, canonical_dir: &Path) -> EntryStatus {
    let Some(target) = target else {
        return EntryStatus::NoTarget;
    };
    let canonical = paths::normalize(&canonical_dir.join(&entry.source));
    if !canonical.exists() {
        return EntryStatus::Missing;
    }
    match classify(target, &canonical) {
        Ok(LinkState::CorrectLink) => EntryStatus::Synced,
        Ok(LinkState::Absent) => EntryStatus::Missing,
        Ok(LinkState::WrongLink { .. }) | Ok(LinkState::ForeignFile) => EntryStatus::Unlinked,
        Err(err) => {
            tracing::warn!("{}: cannot inspect {}: {}", entry.name, target.display(), err);
            EntryStatus::Missing
        }
    }
}
