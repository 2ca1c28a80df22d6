//! Change watcher: directory subscriptions plus the debounce actor.
//!
//! ```text
//! notify thread ──event──▶ unbounded channel ──▶ debounce actor ──()──▶ change channel (cap 1)
//! ```
//!
//! The actor is the only owner of the debounce deadline, so arming and
//! firing are serialized by construction. The change channel holds at most
//! one pending signal; a second expiry while one is still queued coalesces
//! into it.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{sleep_until, Instant};
use tracing::{Instrument, Span};

use crate::error::DaemonError;

struct WatchSet {
    watcher: RecommendedWatcher,
    dirs: HashSet<PathBuf>,
}

/// Owns the OS watcher and the set of subscribed directories.
///
/// Dropping it closes the event stream, which ends the debounce actor.
pub struct ChangeWatcher {
    inner: Mutex<WatchSet>,
    span: Span,
}

impl ChangeWatcher {
    /// Create the notification subsystem and spawn the debounce actor.
    ///
    /// Returns the watcher and the receiving end of the debounced change
    /// signal. Must be called from inside a tokio runtime.
    pub fn start(quiet: Duration, span: Span) -> Result<(Self, mpsc::Receiver<()>), DaemonError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let watcher = recommended_watcher(move |event| {
            let _ = event_tx.send(event);
        })?;

        let (change_tx, change_rx) = mpsc::channel::<()>(1);
        tokio::spawn(debounce_loop(event_rx, quiet, change_tx).instrument(span.clone()));

        let inner = Mutex::new(WatchSet {
            watcher,
            dirs: HashSet::new(),
        });
        Ok((Self { inner, span }, change_rx))
    }

    /// Subscribe to the parent directory of every path not already covered.
    ///
    /// A directory that cannot be watched (missing, not a directory, watch
    /// limit reached) is logged and skipped; a later call retries it.
    /// Returns the number of new subscriptions.
    pub fn watch_paths(&self, paths: &[PathBuf]) -> usize {
        let _entered = self.span.enter();
        let mut set = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut added = 0;
        for dir in parent_dirs(paths) {
            // FSEvents reports real paths (/private/var/... on macOS).
            let dir = match fs::canonicalize(&dir) {
                Ok(dir) => dir,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    tracing::warn!(path = %dir.display(), "not watching missing directory");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "cannot resolve directory");
                    continue;
                }
            };
            if set.dirs.contains(&dir) {
                continue;
            }
            if let Err(err) = set.watcher.watch(&dir, RecursiveMode::NonRecursive) {
                tracing::warn!(path = %dir.display(), error = %err, "failed to watch directory");
                continue;
            }
            tracing::debug!(path = %dir.display(), "watching directory");
            set.dirs.insert(dir);
            added += 1;
        }
        added
    }

    /// Snapshot of the subscribed directories.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let set = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut dirs: Vec<_> = set.dirs.iter().cloned().collect();
        dirs.sort();
        dirs
    }
}

fn parent_dirs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = paths
        .iter()
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    dirs.sort();
    dirs.dedup();
    dirs
}

/// Creates and content writes. Metadata-only changes (chmod, touch) are not
/// edits.
fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Any | ModifyKind::Data(_) | ModifyKind::Name(_))
    )
}

/// Collapse qualifying events into one signal per quiet period.
pub(crate) async fn debounce_loop(
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    quiet: Duration,
    changes: mpsc::Sender<()>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            event = events.recv() => {
                // Closed: the watcher was dropped during shutdown.
                let Some(event) = event else { break };
                match event {
                    Ok(event) if is_relevant_event_kind(&event.kind) => {
                        deadline = Some(Instant::now() + quiet);
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "watcher event error"),
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                match changes.try_send(()) {
                    Ok(()) => tracing::debug!("change detected"),
                    Err(TrySendError::Full(())) => {}
                    Err(TrySendError::Closed(())) => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use tempfile::TempDir;
    use tokio::time::{sleep, timeout};

    const QUIET: Duration = Duration::from_secs(2);

    fn write_event() -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)))
            .add_path(PathBuf::from("/home/tester/.vimrc")))
    }

    fn spawn_actor() -> (
        mpsc::UnboundedSender<notify::Result<Event>>,
        mpsc::Receiver<()>,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (change_tx, change_rx) = mpsc::channel(1);
        tokio::spawn(debounce_loop(event_rx, QUIET, change_tx));
        (event_tx, change_rx)
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn burst_within_quiet_period_fires_once() {
        let (event_tx, mut change_rx) = spawn_actor();
        let started = Instant::now();

        for _ in 0..5 {
            event_tx.send(write_event()).expect("send");
            sleep(Duration::from_millis(100)).await;
        }

        change_rx.recv().await.expect("one signal");
        let elapsed = started.elapsed();
        // Last event at 400ms, so the quiet period ends at 2.4s.
        assert!(elapsed >= Duration::from_millis(2400), "fired early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(2500), "fired late: {elapsed:?}");

        assert!(
            timeout(Duration::from_secs(10), change_rx.recv()).await.is_err(),
            "burst must produce exactly one signal"
        );
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn separated_events_fire_once_each() {
        let (event_tx, mut change_rx) = spawn_actor();

        event_tx.send(write_event()).expect("send");
        change_rx.recv().await.expect("first signal");

        sleep(Duration::from_secs(3)).await;
        event_tx
            .send(Ok(Event::new(EventKind::Create(CreateKind::File))))
            .expect("send");
        change_rx.recv().await.expect("second signal");

        assert!(timeout(Duration::from_secs(10), change_rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn removals_do_not_arm_the_timer() {
        let (event_tx, mut change_rx) = spawn_actor();
        event_tx
            .send(Ok(Event::new(EventKind::Remove(RemoveKind::File))))
            .expect("send");
        event_tx
            .send(Err(notify::Error::generic("boom")))
            .expect("send");
        assert!(timeout(Duration::from_secs(10), change_rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn metadata_changes_do_not_arm_the_timer() {
        let (event_tx, mut change_rx) = spawn_actor();
        for kind in [MetadataKind::Permissions, MetadataKind::WriteTime] {
            event_tx
                .send(Ok(Event::new(EventKind::Modify(ModifyKind::Metadata(kind)))))
                .expect("send");
        }
        assert!(timeout(Duration::from_secs(10), change_rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn pending_signal_coalesces_later_expiries() {
        let (event_tx, mut change_rx) = spawn_actor();

        // Two full quiet periods pass without the receiver draining.
        event_tx.send(write_event()).expect("send");
        sleep(Duration::from_secs(3)).await;
        event_tx.send(write_event()).expect("send");
        sleep(Duration::from_secs(3)).await;

        change_rx.recv().await.expect("queued signal");
        assert!(change_rx.try_recv().is_err(), "second expiry coalesced");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn closed_event_stream_ends_actor() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (change_tx, mut change_rx) = mpsc::channel(1);
        let actor = tokio::spawn(debounce_loop(event_rx, QUIET, change_tx));

        event_tx.send(write_event()).expect("send");
        drop(event_tx);

        actor.await.expect("actor exits cleanly");
        assert!(change_rx.recv().await.is_none(), "no signal after close");
    }

    #[tokio::test]
    async fn watch_set_grows_monotonically() {
        let dir = TempDir::new().expect("tempdir");
        let home = dir.path().join("home");
        let repo = dir.path().join("repo");
        fs::create_dir_all(&home).expect("mkdir");
        fs::create_dir_all(&repo).expect("mkdir");

        let (watcher, _changes) = ChangeWatcher::start(QUIET, Span::none()).expect("watcher");
        let first = vec![home.join(".vimrc"), repo.join("vimrc"), repo.join("zshrc")];
        assert_eq!(watcher.watch_paths(&first), 2);
        assert_eq!(watcher.watch_paths(&first), 0);

        // Missing directories are skipped rather than failing.
        let missing = vec![dir.path().join("nowhere").join("file")];
        assert_eq!(watcher.watch_paths(&missing), 0);

        // A shorter list never unsubscribes anything.
        assert_eq!(watcher.watch_paths(&[repo.join("vimrc")]), 0);
        assert_eq!(watcher.watched_dirs().len(), 2);
    }

    #[tokio::test]
    async fn unwatchable_directory_is_skipped_not_fatal() {
        let dir = TempDir::new().expect("tempdir");
        let home = dir.path().join("home");
        let repo = dir.path().join("repo");
        fs::create_dir_all(&home).expect("mkdir");
        fs::create_dir_all(&repo).expect("mkdir");
        fs::write(home.join("blocker"), "a file").expect("write blocker");

        let (watcher, _changes) = ChangeWatcher::start(QUIET, Span::none()).expect("watcher");
        // Sorts before `repo/`, so a bail-out would leave the repo unwatched.
        let paths = vec![home.join("blocker").join("nested").join("vimrc"), repo.join("vimrc")];
        assert_eq!(watcher.watch_paths(&paths), 1);
        assert_eq!(
            watcher.watched_dirs(),
            vec![fs::canonicalize(&repo).expect("canonical repo")]
        );
    }

    #[tokio::test]
    async fn write_in_watched_dir_signals_change() {
        let dir = TempDir::new().expect("tempdir");
        let (watcher, mut changes) =
            ChangeWatcher::start(Duration::from_millis(200), Span::none()).expect("watcher");
        let file = dir.path().join("vimrc");
        assert_eq!(watcher.watch_paths(&[file.clone()]), 1);

        fs::write(&file, "set number\n").expect("write");

        timeout(Duration::from_secs(10), changes.recv())
            .await
            .expect("signal within timeout")
            .expect("channel open");
    }
}
