//! # mirra-sync
//!
//! Link classification, reconciliation and the version-control collaborator.
//!
//! Call [`reconcile_all`] to bring every target of a manifest in line with
//! the canonical directory, [`entry_status`] for a read-only view, and use a
//! [`VersionControl`] implementation ([`GitCli`]) to move canonical content
//! between machines. [`GhCli`] creates the hosted repository during setup.

pub mod error;
pub mod git;
pub mod github;
pub mod link;
pub mod reconcile;
pub mod status;

pub use error::SyncError;
pub use git::{GitCli, VersionControl};
pub use github::{GhCli, DEFAULT_REPO_NAME};
pub use link::{classify, LinkState};
pub use reconcile::{reconcile_all, reconcile_all_at, EntryReport, LinkOutcome};
pub use status::{entry_status, entry_status_at, EntryStatus};
