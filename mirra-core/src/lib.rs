//! mirra core library: domain types, settings/manifest persistence, path resolution.
//!
//! - [`types`]: entries, manifest, local settings, platform keys
//! - [`config`]: load / save under an explicit config directory
//! - [`paths`]: target resolution and path normalization
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use error::ConfigError;
pub use types::{DaemonSettings, Entry, EntryName, LocalSettings, Manifest, Platform};
