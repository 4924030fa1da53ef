//! Directory watcher with async notification streaming.
//!
//! This module provides the [`DirectoryWatcher`] type that bridges the
//! synchronous `notify` file watching crate to the async tokio runtime,
//! and the [`WatcherHandle`] through which request handlers grow the
//! watched-directory set at runtime.
//!
//! # Lifecycle
//!
//! 1. **Creation**: [`DirectoryWatcher::new`] starts the OS primitive,
//!    registers the root directory, and spawns the async watch loop.
//!
//! 2. **Growth**: any number of tasks call
//!    [`WatcherHandle::add_directory`] concurrently; each directory is
//!    registered with the OS at most once.
//!
//! 3. **Consumption**: the [`WatcherChannels`] returned at creation carry
//!    reload notifications and watcher errors to the serving layer.
//!
//! 4. **Shutdown**: [`DirectoryWatcher::shutdown`] (or dropping the
//!    watcher) stops the loop and releases the OS primitive.

use std::fmt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use lm_core::{FxHashSet, WatchConfig};

use crate::debounce::{DebounceDecision, Debouncer};
use crate::error::WatchError;
use crate::events::{ChangeEvent, ChangeKind, Notification};
use crate::filter::PathFilter;

/// Capacity of the outbound notification channel.
///
/// One slot is enough: a notification is an opaque "refresh" and coalescing
/// at the channel is harmless while a consumer catches up.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 1;

/// Capacity of the outbound error channel.
const ERROR_CHANNEL_CAPACITY: usize = 16;

/// The watcher handle plus the set of directories registered with it.
///
/// Both live behind one mutex so membership insert and OS registration are
/// atomic with respect to concurrent `add_directory` callers. `watcher` is
/// `None` after close; dropping it releases the OS primitive.
struct WatchSet {
    watcher: Option<RecommendedWatcher>,
    dirs: FxHashSet<Utf8PathBuf>,
}

/// A cheap, cloneable handle for growing and closing the watched set.
///
/// Safe to share across any number of concurrent request-handling tasks.
#[derive(Clone)]
pub struct WatcherHandle {
    shared: Arc<Mutex<WatchSet>>,
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = self.shared.lock();
        f.debug_struct("WatcherHandle")
            .field("watched_dirs", &set.dirs.len())
            .field("closed", &set.watcher.is_none())
            .finish()
    }
}

impl WatcherHandle {
    /// Registers `dir` (the directory itself, not its subtree) with the OS
    /// notification primitive.
    ///
    /// Idempotent: an already-tracked directory returns `Ok` without a
    /// second OS-level registration, no matter how many callers race on it.
    /// Paths are normalized (canonicalized) before registration so aliases
    /// of the same directory collapse to one entry.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotInitialized`] after [`close`](Self::close),
    /// or [`WatchError::AddDirectory`] when the path cannot be resolved or
    /// the OS registration fails. A failed registration is rolled back so a
    /// later retry can attempt it again.
    pub fn add_directory(&self, dir: &Utf8Path) -> Result<(), WatchError> {
        let canonical = dir
            .canonicalize_utf8()
            .map_err(|e| WatchError::AddDirectory {
                path: dir.to_owned(),
                source: notify::Error::io(e),
            })?;

        let mut set = self.shared.lock();
        let WatchSet { watcher, dirs } = &mut *set;
        let Some(watcher) = watcher.as_mut() else {
            return Err(WatchError::NotInitialized);
        };

        if !dirs.insert(canonical.clone()) {
            // Already watching this directory
            return Ok(());
        }

        if let Err(source) = watcher.watch(canonical.as_std_path(), RecursiveMode::NonRecursive) {
            // Roll back the set if the OS registration failed
            dirs.remove(&canonical);
            return Err(WatchError::AddDirectory {
                path: canonical,
                source,
            });
        }

        tracing::info!(dir = %canonical, "watching directory for changes");

        Ok(())
    }

    /// Returns `true` if `dir` is currently registered.
    #[must_use]
    pub fn is_watching(&self, dir: &Utf8Path) -> bool {
        dir.canonicalize_utf8()
            .map(|canonical| self.shared.lock().dirs.contains(&canonical))
            .unwrap_or(false)
    }

    /// Returns the number of registered directories.
    #[must_use]
    pub fn watched_count(&self) -> usize {
        self.shared.lock().dirs.len()
    }

    /// Releases the OS notification primitive.
    ///
    /// Idempotent best-effort: later calls are no-ops, and later
    /// [`add_directory`](Self::add_directory) calls fail with
    /// [`WatchError::NotInitialized`].
    pub fn close(&self) -> Result<(), WatchError> {
        let mut set = self.shared.lock();
        if set.watcher.take().is_some() {
            tracing::debug!("watcher closed");
        }
        set.dirs.clear();
        Ok(())
    }
}

/// The outbound channels of a [`DirectoryWatcher`].
///
/// `notifications` carries one [`Notification::Reload`] per detected burst;
/// `errors` carries runtime watcher errors. Both are consumed by the
/// serving layer, which decides delivery and error policy.
#[derive(Debug)]
pub struct WatcherChannels {
    /// Debounced reload notifications.
    pub notifications: mpsc::Receiver<Notification>,

    /// Runtime errors from the OS event stream.
    pub errors: mpsc::Receiver<WatchError>,
}

/// A directory watcher streaming debounced reload notifications.
///
/// `DirectoryWatcher` owns the raw OS event stream and the async watch
/// loop. The loop applies the ignore filter, classifies event kinds, runs
/// the cooldown state machine, and forwards the results on the
/// [`WatcherChannels`] returned at construction.
///
/// # Thread Safety
///
/// The watcher itself stays with whoever started it; concurrent callers
/// interact through cloned [`WatcherHandle`]s only.
pub struct DirectoryWatcher {
    /// Shutdown signal sender; `None` once shutdown is initiated.
    shutdown_tx: Option<oneshot::Sender<()>>,

    /// Handle to the watch loop task, awaited during shutdown.
    task_handle: Option<JoinHandle<()>>,

    /// Shared handle for directory registration.
    handle: WatcherHandle,

    /// The initial root directory.
    root: Utf8PathBuf,
}

impl fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("root", &self.root)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    /// Creates a watcher rooted at `root` and spawns its watch loop.
    ///
    /// The root is registered immediately; further directories join via
    /// [`WatcherHandle::add_directory`].
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the root doesn't exist,
    /// [`WatchError::Init`] if the OS primitive cannot start, or
    /// [`WatchError::AddDirectory`] if the root cannot be registered.
    #[allow(clippy::unused_async)] // Async for API consistency with shutdown()
    pub async fn new<F: PathFilter>(
        root: &Utf8Path,
        config: &WatchConfig,
        filter: F,
    ) -> Result<(Self, WatcherChannels), WatchError> {
        if !root.exists() {
            return Err(WatchError::PathNotFound(root.to_owned()));
        }

        let (raw_tx, raw_rx) = mpsc::channel(config.event_channel_capacity);

        // The handler runs on the notify thread; blocking_send applies
        // backpressure there, never on the async runtime.
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = raw_tx.blocking_send(res);
        })
        .map_err(WatchError::Init)?;

        let handle = WatcherHandle {
            shared: Arc::new(Mutex::new(WatchSet {
                watcher: Some(watcher),
                dirs: FxHashSet::default(),
            })),
        };
        handle.add_directory(root)?;

        let (notification_tx, notification_rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task_handle = tokio::spawn(run_watch_loop(
            raw_rx,
            notification_tx,
            error_tx,
            Debouncer::new(config.debounce_window()),
            Box::new(filter),
            shutdown_rx,
        ));

        Ok((
            Self {
                shutdown_tx: Some(shutdown_tx),
                task_handle: Some(task_handle),
                handle,
                root: root.to_owned(),
            },
            WatcherChannels {
                notifications: notification_rx,
                errors: error_rx,
            },
        ))
    }

    /// Returns a cloneable handle for registering further directories.
    #[must_use]
    pub fn handle(&self) -> WatcherHandle {
        self.handle.clone()
    }

    /// Returns the initial root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns `true` if the watch loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Gracefully shuts down the watcher.
    ///
    /// Signals the watch loop, awaits its exit, and releases the OS
    /// primitive.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Ignore error if the loop already exited
            let _ = tx.send(());
        }

        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }

        self.handle.close()
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        // Send shutdown signal on drop; the loop stops when it receives it.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// The async watch loop: raw events in, debounced notifications out.
///
/// Exits when the shutdown signal fires, when the raw stream ends (the OS
/// primitive was closed), or when the notification consumer goes away.
async fn run_watch_loop(
    mut raw_rx: mpsc::Receiver<notify::Result<notify::Event>>,
    notifications: mpsc::Sender<Notification>,
    errors: mpsc::Sender<WatchError>,
    mut debouncer: Debouncer,
    filter: Box<dyn PathFilter>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            raw = raw_rx.recv() => match raw {
                Some(Ok(event)) => {
                    let open = process_event(&event, &mut debouncer, &filter, &notifications).await;
                    if !open {
                        tracing::debug!("notification channel closed, stopping watch loop");
                        return;
                    }
                }
                Some(Err(error)) => {
                    // Runtime stream errors are forwarded; the loop keeps going.
                    tracing::error!(%error, "filesystem watcher error");
                    if errors.send(WatchError::Stream(error)).await.is_err() {
                        tracing::debug!("error channel closed, dropping watcher error");
                    }
                }
                None => {
                    tracing::debug!("raw event stream ended, stopping watch loop");
                    return;
                }
            },
            _ = &mut shutdown_rx => return,
        }
    }
}

/// Feeds one raw event through the filter and the debouncer.
///
/// Returns `false` when the notification channel is closed.
async fn process_event(
    event: &notify::Event,
    debouncer: &mut Debouncer,
    filter: &dyn PathFilter,
    notifications: &mpsc::Sender<Notification>,
) -> bool {
    let kind = ChangeKind::from(&event.kind);
    if !kind.qualifies() {
        return true;
    }

    for raw_path in &event.paths {
        let Ok(path) = Utf8PathBuf::try_from(raw_path.clone()) else {
            tracing::warn!(
                path = %raw_path.display(),
                "skipping non-UTF-8 path in change event"
            );
            continue;
        };

        let change = ChangeEvent::new(path, kind);

        if !filter.should_notify(&change.path) {
            tracing::debug!(path = %change.path, "change from ignored file");
            continue;
        }

        match debouncer.observe(change.timestamp) {
            DebounceDecision::Emit => {
                tracing::info!(path = %change.path, "change detected, notifying");
                if notifications.send(Notification::Reload).await.is_err() {
                    return false;
                }
            }
            DebounceDecision::Suppress => {
                tracing::debug!(
                    path = %change.path,
                    kind = ?change.kind,
                    "change suppressed during cooldown"
                );
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{AcceptAllFilter, EditorArtifactFilter};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn create_temp_dir() -> TempDir {
        TempDir::new().expect("Failed to create temp directory")
    }

    fn utf8_path(dir: &TempDir) -> &Utf8Path {
        Utf8Path::from_path(dir.path()).expect("Invalid path")
    }

    /// Counts notifications until `quiet` passes without one.
    async fn drain(rx: &mut mpsc::Receiver<Notification>, quiet: Duration) -> usize {
        let mut count = 0;
        while timeout(quiet, rx.recv()).await.ok().flatten().is_some() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp_dir = create_temp_dir();
        let (watcher, _channels) =
            DirectoryWatcher::new(utf8_path(&temp_dir), &WatchConfig::default(), AcceptAllFilter)
                .await
                .expect("Failed to create watcher");

        assert!(watcher.is_running());
        assert_eq!(watcher.handle().watched_count(), 1);
        assert!(watcher.handle().is_watching(utf8_path(&temp_dir)));
    }

    #[tokio::test]
    async fn test_watcher_path_not_found() {
        let result = DirectoryWatcher::new(
            Utf8Path::new("/nonexistent/path/that/does/not/exist"),
            &WatchConfig::default(),
            AcceptAllFilter,
        )
        .await;

        match result {
            Err(WatchError::PathNotFound(_)) => {}
            other => panic!("Expected PathNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_add_directory_is_idempotent() {
        let temp_dir = create_temp_dir();
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).expect("Failed to create subdir");

        let (watcher, _channels) =
            DirectoryWatcher::new(utf8_path(&temp_dir), &WatchConfig::default(), AcceptAllFilter)
                .await
                .expect("Failed to create watcher");

        let handle = watcher.handle();
        let sub_path = Utf8Path::from_path(&sub).expect("Invalid path");

        handle.add_directory(sub_path).expect("First add failed");
        handle.add_directory(sub_path).expect("Second add failed");

        // Root + sub, the duplicate add registered nothing new
        assert_eq!(handle.watched_count(), 2);
    }

    #[tokio::test]
    async fn test_add_directory_concurrent_callers() {
        let temp_dir = create_temp_dir();
        let sub = temp_dir.path().join("shared");
        fs::create_dir(&sub).expect("Failed to create subdir");

        let (watcher, _channels) =
            DirectoryWatcher::new(utf8_path(&temp_dir), &WatchConfig::default(), AcceptAllFilter)
                .await
                .expect("Failed to create watcher");

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let handle = watcher.handle();
            let path = Utf8Path::from_path(&sub).expect("Invalid path").to_owned();
            tasks.push(tokio::spawn(async move { handle.add_directory(&path) }));
        }

        for task in tasks {
            task.await.expect("Task panicked").expect("Add failed");
        }

        assert_eq!(watcher.handle().watched_count(), 2);
    }

    #[tokio::test]
    async fn test_add_directory_after_close() {
        let temp_dir = create_temp_dir();
        let (watcher, _channels) =
            DirectoryWatcher::new(utf8_path(&temp_dir), &WatchConfig::default(), AcceptAllFilter)
                .await
                .expect("Failed to create watcher");

        let handle = watcher.handle();
        handle.close().expect("Close failed");

        match handle.add_directory(utf8_path(&temp_dir)) {
            Err(WatchError::NotInitialized) => {}
            other => panic!("Expected NotInitialized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let temp_dir = create_temp_dir();
        let (watcher, _channels) =
            DirectoryWatcher::new(utf8_path(&temp_dir), &WatchConfig::default(), AcceptAllFilter)
                .await
                .expect("Failed to create watcher");

        let handle = watcher.handle();
        handle.close().expect("First close failed");
        handle.close().expect("Second close failed");
        assert_eq!(handle.watched_count(), 0);
    }

    #[tokio::test]
    async fn test_add_directory_nonexistent_path() {
        let temp_dir = create_temp_dir();
        let (watcher, _channels) =
            DirectoryWatcher::new(utf8_path(&temp_dir), &WatchConfig::default(), AcceptAllFilter)
                .await
                .expect("Failed to create watcher");

        let gone = utf8_path(&temp_dir).join("never-created");
        match watcher.handle().add_directory(&gone) {
            Err(WatchError::AddDirectory { .. }) => {}
            other => panic!("Expected AddDirectory, got {other:?}"),
        }
        // The failed registration must not leak into the set
        assert_eq!(watcher.handle().watched_count(), 1);
    }

    #[tokio::test]
    async fn test_create_emits_one_notification() {
        let temp_dir = create_temp_dir();
        let (watcher, mut channels) = DirectoryWatcher::new(
            utf8_path(&temp_dir),
            &WatchConfig::default(),
            EditorArtifactFilter,
        )
        .await
        .expect("Failed to create watcher");

        fs::write(temp_dir.path().join("test.txt"), "hello").expect("Failed to write file");

        let first = timeout(Duration::from_secs(1), channels.notifications.recv()).await;
        assert!(matches!(first, Ok(Some(Notification::Reload))));

        // The create/write burst collapses; nothing trails the cooldown
        let extra = drain(&mut channels.notifications, Duration::from_millis(300)).await;
        assert_eq!(extra, 0);

        watcher.shutdown().await.expect("Shutdown failed");
    }

    #[tokio::test]
    async fn test_overwrite_emits_one_notification() {
        let temp_dir = create_temp_dir();
        let file_path = temp_dir.path().join("test.md");
        fs::write(&file_path, "# before").expect("Failed to write file");

        let (watcher, mut channels) = DirectoryWatcher::new(
            utf8_path(&temp_dir),
            &WatchConfig::default(),
            EditorArtifactFilter,
        )
        .await
        .expect("Failed to create watcher");

        fs::write(&file_path, "# after").expect("Failed to overwrite file");

        let first = timeout(Duration::from_secs(1), channels.notifications.recv()).await;
        assert!(matches!(first, Ok(Some(Notification::Reload))));

        watcher.shutdown().await.expect("Shutdown failed");
    }

    #[tokio::test]
    async fn test_burst_writes_collapse() {
        let temp_dir = create_temp_dir();
        let file_path = temp_dir.path().join("burst.md");
        fs::write(&file_path, "0").expect("Failed to write file");

        let (watcher, mut channels) = DirectoryWatcher::new(
            utf8_path(&temp_dir),
            &WatchConfig::default(),
            EditorArtifactFilter,
        )
        .await
        .expect("Failed to create watcher");

        // 5 writes spaced 10ms apart, all inside one 100ms cooldown window
        for i in 0..5 {
            fs::write(&file_path, format!("{i}")).expect("Failed to write file");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let count = drain(&mut channels.notifications, Duration::from_millis(500)).await;
        assert!(
            (1..=5).contains(&count),
            "expected 1..=5 notifications, got {count}"
        );

        watcher.shutdown().await.expect("Shutdown failed");
    }

    #[tokio::test]
    async fn test_ignored_files_never_notify() {
        let temp_dir = create_temp_dir();
        let (watcher, mut channels) = DirectoryWatcher::new(
            utf8_path(&temp_dir),
            &WatchConfig::default(),
            EditorArtifactFilter,
        )
        .await
        .expect("Failed to create watcher");

        for name in ["foo.swp", "bar~", ".DS_Store", "4913"] {
            fs::write(temp_dir.path().join(name), "noise").expect("Failed to write file");
        }

        let count = drain(&mut channels.notifications, Duration::from_millis(400)).await;
        assert_eq!(count, 0, "editor artifacts must never notify");

        watcher.shutdown().await.expect("Shutdown failed");
    }

    #[tokio::test]
    async fn test_watcher_shutdown() {
        let temp_dir = create_temp_dir();
        let (watcher, _channels) =
            DirectoryWatcher::new(utf8_path(&temp_dir), &WatchConfig::default(), AcceptAllFilter)
                .await
                .expect("Failed to create watcher");

        watcher.shutdown().await.expect("Shutdown failed");
    }
}
