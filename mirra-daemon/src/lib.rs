//! mirra background daemon: change watcher, poll timer and control loop,
//! plus the single-instance guard and auto-start units.

mod error;
pub mod lifecycle;
pub mod paths;
mod runtime;
pub mod service;
pub mod spawner;
pub mod watcher;

pub use error::DaemonError;
pub use lifecycle::{DaemonStatus, PidGuard};
pub use runtime::{init_tracing, run, run_until, start_blocking, DaemonContext, LogOptions};
pub use service::{installer_for, ServiceInstaller, ServiceSpec};
pub use spawner::{DetachedSpawner, ProcessSpawner};
pub use watcher::ChangeWatcher;
