use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{Instrument, Span};

use mirra_core::{
    config, paths,
    types::{Entry, Platform},
};
use mirra_sync::{reconcile_all_at, GitCli, LinkOutcome, SyncError, VersionControl};

use crate::error::{io_err, DaemonError};
use crate::lifecycle;
use crate::paths::{AUTO_SYNC_MESSAGE, DEBOUNCE_WINDOW};
use crate::watcher::ChangeWatcher;

/// Everything the control loop reads; assembled once at startup.
pub struct DaemonContext {
    pub config_dir: PathBuf,
    pub repo_dir: PathBuf,
    pub home: PathBuf,
    pub platform: Platform,
    pub entries: Vec<Entry>,
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub vcs: Arc<dyn VersionControl>,
    pub span: Span,
}

impl DaemonContext {
    /// Read settings and manifest from `config_dir`.
    pub fn load(config_dir: &Path, vcs: Arc<dyn VersionControl>) -> Result<Self, DaemonError> {
        let settings = config::load_settings_at(config_dir)?;
        let repo_dir = config::repo_dir(config_dir, &settings);
        // A broken manifest can be fixed remotely; the next pull reloads it.
        let entries = match config::load_manifest_at(&repo_dir) {
            Ok(manifest) => manifest.files,
            Err(err) => {
                tracing::warn!(error = %err, "manifest unreadable; starting with no entries");
                Vec::new()
            }
        };
        let poll_interval = config::parse_interval(&settings.daemon.poll_interval);

        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            repo_dir,
            home: paths::home_dir()?,
            platform: Platform::current(),
            entries,
            poll_interval,
            debounce: DEBOUNCE_WINDOW,
            vcs,
            span: tracing::info_span!("daemon", config = %config_dir.display()),
        })
    }

    /// Canonical files plus the targets resolved for this platform.
    fn tracked_paths(&self, entries: &[Entry]) -> Vec<PathBuf> {
        entries
            .iter()
            .flat_map(|entry| {
                let canonical = paths::normalize(&self.repo_dir.join(&entry.source));
                let target = paths::resolve_at(&self.home, entry, &self.platform);
                std::iter::once(canonical).chain(target)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    /// Force `debug` regardless of `RUST_LOG`.
    pub verbose: bool,
    /// One JSON object per line.
    pub json: bool,
}

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(config_dir: &Path, logging: LogOptions) -> Result<(), DaemonError> {
    init_tracing("info", logging);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config_dir.to_path_buf()))
}

/// Run the daemon until SIGINT or SIGTERM.
pub async fn run(config_dir: PathBuf) -> Result<(), DaemonError> {
    let guard = lifecycle::acquire(&config_dir)?;
    let ctx = DaemonContext::load(&config_dir, Arc::new(GitCli::new()))?;
    tracing::info!(
        pid = guard.pid(),
        repo = %ctx.repo_dir.display(),
        entries = ctx.entries.len(),
        poll_secs = ctx.poll_interval.as_secs(),
        "mirra daemon started",
    );

    let result = run_until(ctx, shutdown_signal()).await;
    drop(guard);
    result
}

/// The control loop: poll timer, debounced changes and `shutdown`, one at a
/// time.
///
/// Collaborator calls are awaited inside the loop, so a pull and a push never
/// overlap and shutdown waits for the call in flight.
pub async fn run_until<F>(ctx: DaemonContext, shutdown: F) -> Result<(), DaemonError>
where
    F: Future<Output = ()>,
{
    let span = ctx.span.clone();
    async move {
        let (watcher, mut changes) = ChangeWatcher::start(ctx.debounce, ctx.span.clone())?;
        let mut entries = ctx.entries.clone();
        let watched = watcher.watch_paths(&ctx.tracked_paths(&entries));
        tracing::debug!(directories = watched, "watch set initialized");

        let mut ticker = interval_at(Instant::now() + ctx.poll_interval, ctx.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("shutting down");
                    break;
                }
                _ = ticker.tick() => on_tick(&ctx, &watcher, &mut entries).await,
                Some(()) = changes.recv() => on_change(&ctx).await,
            }
        }
        Ok(())
    }
    .instrument(span)
    .await
}

async fn on_tick(ctx: &DaemonContext, watcher: &ChangeWatcher, entries: &mut Vec<Entry>) {
    let vcs = Arc::clone(&ctx.vcs);
    let repo = ctx.repo_dir.clone();
    match blocking("pull", move || vcs.pull(&repo)).await {
        Ok(false) => {
            tracing::debug!("remote unchanged");
            return;
        }
        Ok(true) => tracing::info!("pulled remote changes"),
        Err(err) => {
            tracing::warn!(error = %err, "pull failed; retrying next tick");
            return;
        }
    }

    match config::load_manifest_at(&ctx.repo_dir) {
        Ok(manifest) => *entries = manifest.files,
        Err(err) => tracing::warn!(error = %err, "keeping previous entry list"),
    }

    let home = ctx.home.clone();
    let repo = ctx.repo_dir.clone();
    let platform = ctx.platform.clone();
    let snapshot = entries.clone();
    let reconciled = blocking("reconcile", move || {
        Ok::<_, SyncError>(reconcile_all_at(&home, &snapshot, &repo, &platform))
    })
    .await;
    match reconciled {
        Ok(reports) => {
            let changed = reports.iter().filter(|r| r.outcome.is_mutation()).count();
            let failed = reports
                .iter()
                .filter(|r| matches!(r.outcome, LinkOutcome::Failed { .. }))
                .count();
            tracing::info!(entries = reports.len(), changed, failed, "reconciled links");
        }
        Err(err) => tracing::error!(error = %err, "reconcile task failed"),
    }

    let added = watcher.watch_paths(&ctx.tracked_paths(entries));
    tracing::debug!(directories = added, "watch set extended");
}

async fn on_change(ctx: &DaemonContext) {
    let vcs = Arc::clone(&ctx.vcs);
    let repo = ctx.repo_dir.clone();
    match blocking("commit", move || vcs.commit_and_push(&repo, AUTO_SYNC_MESSAGE)).await {
        Ok(true) => tracing::info!("pushed local changes"),
        Ok(false) => tracing::debug!("nothing to push"),
        Err(err) => tracing::warn!(error = %err, "auto-sync failed"),
    }
}

/// Run a blocking collaborator call off the runtime threads, inside the
/// caller's span.
async fn blocking<T, F>(task: &'static str, f: F) -> Result<T, DaemonError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(f))
        .await
        .map_err(|err| DaemonError::Join(task, err.to_string()))?
        .map_err(DaemonError::from)
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => tracing::info!("received interrupt"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}

/// Install the global subscriber; later calls are no-ops.
///
/// `RUST_LOG` overrides `default_level` unless `verbose` is set.
pub fn init_tracing(default_level: &str, options: LogOptions) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if options.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if options.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
