//! Reconciliation: make every target a link to its canonical file.
//!
//! ## Per-entry protocol
//!
//! 1. Resolve the target for the running platform → skip when none.
//! 2. Classify the target.
//! 3. `Absent` → create parents, link.
//! 4. `WrongLink` → remove link, link.
//! 5. `ForeignFile` → rename to `<target>.conflict-<YYYYMMDD-HHMMSS>`, link.
//!    A failed rename leaves the file untouched and skips the link.
//!
//! Failures are isolated per entry; the pass always visits every entry.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use mirra_core::{
    paths,
    types::{Entry, EntryName, Platform},
};

use crate::error::{io_err, SyncError};
use crate::link::{self, classify, LinkState};

const CONFLICT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Result of reconciling one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    SkippedNoTarget,
    AlreadyCorrect,
    Created,
    Repaired,
    BackedUpAndRepaired { backup: PathBuf },
    Failed { reason: String },
}

impl LinkOutcome {
    /// Whether this outcome changed anything on disk.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            LinkOutcome::Created | LinkOutcome::Repaired | LinkOutcome::BackedUpAndRepaired { .. }
        )
    }
}

impl fmt::Display for LinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkOutcome::SkippedNoTarget => f.write_str("skipped (no target)"),
            LinkOutcome::AlreadyCorrect => f.write_str("already correct"),
            LinkOutcome::Created => f.write_str("created"),
            LinkOutcome::Repaired => f.write_str("repaired"),
            LinkOutcome::BackedUpAndRepaired { backup } => {
                write!(f, "backed up to {} and repaired", backup.display())
            }
            LinkOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// One line of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub name: EntryName,
    pub target: Option<PathBuf>,
    pub outcome: LinkOutcome,
}

/// Reconcile every entry, resolving `~` against `home`.
pub fn reconcile_all_at(
    home: &Path,
    entries: &[Entry],
    canonical_dir: &Path,
    platform: &Platform,
) -> Vec<EntryReport> {
    entries
        .iter()
        .map(|entry| {
            let target = paths::resolve_at(home, entry, platform);
            reconcile_entry(entry, target, canonical_dir, Local::now)
        })
        .collect()
}

/// `reconcile_all_at` convenience wrapper (uses the user's home directory).
pub fn reconcile_all(
    entries: &[Entry],
    canonical_dir: &Path,
    platform: &Platform,
) -> Vec<EntryReport> {
    entries
        .iter()
        .map(|entry| {
            let target = paths::resolve(entry, platform);
            reconcile_entry(entry, target, canonical_dir, Local::now)
        })
        .collect()
}

fn reconcile_entry(
    entry: &Entry,
    target: Option<PathBuf>,
    canonical_dir: &Path,
    now: impl Fn() -> DateTime<Local>,
) -> EntryReport {
    let Some(target) = target else {
        tracing::debug!("{}: no target for this platform, skipping", entry.name);
        return EntryReport {
            name: entry.name.clone(),
            target: None,
            outcome: LinkOutcome::SkippedNoTarget,
        };
    };

    let canonical = paths::normalize(&canonical_dir.join(&entry.source));
    let outcome = match apply(&target, &canonical, now) {
        Ok(outcome) => {
            match &outcome {
                LinkOutcome::AlreadyCorrect => {
                    tracing::debug!("{}: already linked", entry.name)
                }
                LinkOutcome::BackedUpAndRepaired { backup } => tracing::info!(
                    "{}: backed up conflicting file to {} and linked {}",
                    entry.name,
                    backup.display(),
                    target.display()
                ),
                other => tracing::info!("{}: {} {}", entry.name, other, target.display()),
            }
            outcome
        }
        Err(err) => {
            tracing::error!("{}: link failed: {}", entry.name, err);
            LinkOutcome::Failed {
                reason: err.to_string(),
            }
        }
    };

    EntryReport {
        name: entry.name.clone(),
        target: Some(target),
        outcome,
    }
}

fn apply(
    target: &Path,
    canonical: &Path,
    now: impl Fn() -> DateTime<Local>,
) -> Result<LinkOutcome, SyncError> {
    match classify(target, canonical)? {
        LinkState::CorrectLink => Ok(LinkOutcome::AlreadyCorrect),
        LinkState::Absent => {
            link::create_link(canonical, target)?;
            Ok(LinkOutcome::Created)
        }
        LinkState::WrongLink { .. } => {
            link::remove_link(target)?;
            link::create_link(canonical, target)?;
            Ok(LinkOutcome::Repaired)
        }
        LinkState::ForeignFile => {
            // Same-second conflicts share a name; the later rename replaces
            // the earlier backup.
            let backup = conflict_backup_path(target, now());
            std::fs::rename(target, &backup).map_err(|e| io_err(target, e))?;
            link::create_link(canonical, target)?;
            Ok(LinkOutcome::BackedUpAndRepaired { backup })
        }
    }
}

/// `<target>.conflict-<YYYYMMDD-HHMMSS>`
pub fn conflict_backup_path(target: &Path, at: DateTime<Local>) -> PathBuf {
    let suffix = format!(".conflict-{}", at.format(CONFLICT_TIMESTAMP_FORMAT));
    link::sibling_with_suffix(target, &suffix)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
