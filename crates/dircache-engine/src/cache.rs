//! Polling directory cache.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use dircache_core::{CacheConfig, CacheError, CacheState, Directory, NameFilter};
use dircache_walk::Walker;

use crate::event::CacheEvent;

/// Capacity of the event channel; slow subscribers see `Lagged`.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Change notification registered with [`DirCache::set_callback`].
pub type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

/// The currently published tree and when it was last confirmed.
#[derive(Default)]
struct Published {
    root: Option<Arc<Directory>>,
    last_walk: Option<SystemTime>,
}

/// State shared between the cache handle and its worker thread.
struct Shared {
    walker: Walker,
    /// Held while checking the state, publishing and notifying. Re-entrant so
    /// a callback may call `stop()` on its own cache.
    lifecycle: ReentrantMutex<Cell<CacheState>>,
    /// Serialises walks; at most one is ever in flight.
    walk_lock: ReentrantMutex<()>,
    published: RwLock<Published>,
    callback: Mutex<Option<Callback>>,
    events: broadcast::Sender<CacheEvent>,
}

impl Shared {
    fn state(&self) -> CacheState {
        self.lifecycle.lock().get()
    }

    fn root_path(&self) -> &Path {
        &self.walker.config().root
    }

    /// Walk, compare, publish, notify.
    ///
    /// Returns whether a new tree was published. Walk failures are logged and
    /// broadcast before being returned.
    fn tick(&self, reason: &'static str) -> Result<bool, CacheError> {
        let _walking = self.walk_lock.lock();
        trace!(root = %self.root_path().display(), reason, "walking");

        let snapshot = match self.walker.walk() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    root = %self.root_path().display(),
                    reason,
                    error = %err,
                    "walk failed, keeping previous snapshot"
                );
                let _ = self.events.send(CacheEvent::WalkFailed {
                    root: self.root_path().to_path_buf(),
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        // Only this thread publishes while `walk_lock` is held, so comparing
        // outside the write lock is safe.
        let current = self.published.read().root.clone();
        let changed = current.as_deref() != Some(&snapshot.root);
        let walked_at = snapshot.walked_at;
        let stats = snapshot.stats.clone();

        let lifecycle = self.lifecycle.lock();
        if lifecycle.get() != CacheState::Running {
            debug!(root = %self.root_path().display(), reason, "cache stopped, discarding walk");
            return Ok(false);
        }

        {
            let mut published = self.published.write();
            if changed {
                published.root = Some(Arc::new(snapshot.into_root()));
            }
            published.last_walk = Some(walked_at);
        }

        if changed {
            debug!(
                root = %self.root_path().display(),
                reason,
                files = stats.files,
                dirs = stats.dirs,
                "published new snapshot"
            );
            let _ = self.events.send(CacheEvent::Changed { walked_at, stats });
            self.notify();
        } else {
            trace!(root = %self.root_path().display(), reason, "snapshot unchanged");
            let _ = self.events.send(CacheEvent::Unchanged { walked_at });
        }

        drop(lifecycle);
        Ok(changed)
    }

    /// Run the registered callback, containing any panic.
    fn notify(&self) {
        let callback = self.callback.lock().clone();
        let Some(callback) = callback else {
            return;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(root = %self.root_path().display(), %message, "change callback panicked");
        }
    }
}

/// Drive ticks until cancelled.
async fn run_schedule(shared: Arc<Shared>, cancel: CancellationToken) {
    let period = shared.walker.config().interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                // Failures are already logged and broadcast; keep polling
                let _ = shared.tick("poll");
            }
        }
    }

    debug!(root = %shared.root_path().display(), "scheduler exited");
}

/// Body of the worker thread. The runtime lives and dies on this thread.
fn run_worker(shared: Arc<Shared>, cancel: CancellationToken) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(
                root = %shared.root_path().display(),
                error = %CacheError::Runtime { source: err },
                "scheduler could not start, stopping cache"
            );
            shared.lifecycle.lock().set(CacheState::Stopped);
            return;
        }
    };
    runtime.block_on(run_schedule(shared, cancel));
}

/// Handle to the background worker of a running cache.
struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// An in-memory snapshot of a directory tree, refreshed on a fixed interval.
///
/// A cache is created stopped so a callback can be registered before the
/// first notification can fire:
///
/// ```rust,no_run
/// use std::time::Duration;
/// use dircache_engine::{DirCache, NameFilter};
///
/// let cache = DirCache::cache("/srv/docs", Duration::from_secs(2), NameFilter::all()).unwrap();
/// cache.set_callback(|| println!("docs changed"));
/// cache.start().unwrap();
///
/// if let Some(root) = cache.root() {
///     println!("{} files", root.file_count());
/// }
/// cache.close();
/// ```
///
/// Every method takes `&self` and may be called from any thread.
pub struct DirCache {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for DirCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirCache").finish_non_exhaustive()
    }
}

impl DirCache {
    /// Create a stopped cache from a configuration.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        let walker = Walker::new(config)?;
        Ok(Self::from_walker(walker))
    }

    /// Create a stopped cache of `root`, refreshed every `interval`,
    /// keeping only entries accepted by `filter`.
    pub fn cache(
        root: impl Into<PathBuf>,
        interval: Duration,
        filter: NameFilter,
    ) -> Result<Self, CacheError> {
        let mut config = CacheConfig::new(root);
        config.interval = interval;
        config.patterns = filter.patterns().to_vec();
        config.filter_mode = filter.mode();
        config.validate()?;
        Ok(Self::from_walker(Walker::with_filter(config, filter)))
    }

    fn from_walker(walker: Walker) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            shared: Arc::new(Shared {
                walker,
                lifecycle: ReentrantMutex::new(Cell::new(CacheState::Created)),
                walk_lock: ReentrantMutex::new(()),
                published: RwLock::new(Published::default()),
                callback: Mutex::new(None),
                events,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start refreshing.
    ///
    /// The first walk runs on the calling thread, so [`root`](Self::root) is
    /// populated when this returns (unless that walk failed). Later walks run
    /// on a background thread every interval.
    pub fn start(&self) -> Result<&Self, CacheError> {
        {
            let lifecycle = self.shared.lifecycle.lock();
            match lifecycle.get() {
                CacheState::Created => lifecycle.set(CacheState::Running),
                state => {
                    return Err(CacheError::IllegalState {
                        operation: "start",
                        state,
                    });
                }
            }
        }

        info!(
            root = %self.shared.root_path().display(),
            interval_ms = self.interval().as_millis() as u64,
            "starting directory cache"
        );

        // Failures are logged and broadcast; the schedule starts regardless
        let _ = self.shared.tick("startup");

        // Lock order is lifecycle then worker slot, matching a callback that
        // closes its own cache.
        let lifecycle = self.shared.lifecycle.lock();
        if lifecycle.get() != CacheState::Running {
            // Stopped from the startup callback or another thread
            return Ok(self);
        }
        let mut slot = self.worker.lock();

        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let token = cancel.clone();
        let spawned = thread::Builder::new()
            .name(format!("dircache:{}", self.shared.root_path().display()))
            .spawn(move || run_worker(shared, token));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(source) => {
                lifecycle.set(CacheState::Stopped);
                return Err(CacheError::Runtime { source });
            }
        };

        *slot = Some(Worker { cancel, handle });
        Ok(self)
    }

    /// Stop refreshing.
    ///
    /// Once this returns no further tree is published and the callback is
    /// not invoked again. A walk already in progress runs to completion and
    /// its result is discarded. Calling it again has no effect.
    pub fn stop(&self) -> &Self {
        let previous = {
            let lifecycle = self.shared.lifecycle.lock();
            lifecycle.replace(CacheState::Stopped)
        };

        if let Some(worker) = self.worker.lock().as_ref() {
            worker.cancel.cancel();
        }

        if previous == CacheState::Running {
            info!(root = %self.shared.root_path().display(), "stopped directory cache");
        }
        self
    }

    /// Stop and wait for the background thread to exit.
    ///
    /// Safe to call repeatedly and from within the callback.
    pub fn close(&self) {
        self.stop();

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        if worker.handle.thread().id() == thread::current().id() {
            // Called from our own callback; the loop exits once it returns
            return;
        }
        if self.shared.walk_lock.is_owned_by_current_thread() {
            // Called from a callback run by `refresh()`. The worker may be
            // waiting for this walk to finish, so it is left to exit alone.
            debug!(root = %self.shared.root_path().display(), "detaching scheduler thread");
            return;
        }
        if worker.handle.join().is_err() {
            error!(root = %self.shared.root_path().display(), "scheduler thread panicked");
        }
    }

    /// Walk now on the calling thread instead of waiting for the next tick.
    ///
    /// Returns `Ok(true)` if a new tree was published. Unlike timer ticks,
    /// walk failures are returned to the caller.
    pub fn refresh(&self) -> Result<bool, CacheError> {
        match self.shared.state() {
            CacheState::Running => self.shared.tick("manual refresh"),
            state => Err(CacheError::IllegalState {
                operation: "refresh",
                state,
            }),
        }
    }

    /// The most recently published tree, if any walk has succeeded yet.
    pub fn root(&self) -> Option<Arc<Directory>> {
        self.shared.published.read().root.clone()
    }

    /// When the most recent successful walk began, changed or not.
    pub fn last_walk_time(&self) -> Option<SystemTime> {
        self.shared.published.read().last_walk
    }

    /// Replace the change notification.
    pub fn set_callback<F>(&self, callback: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.callback.lock() = Some(Arc::new(callback));
        self
    }

    /// Remove the change notification.
    pub fn clear_callback(&self) -> &Self {
        *self.shared.callback.lock() = None;
        self
    }

    /// Subscribe to the outcome of every subsequent walk.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.shared.events.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CacheState {
        self.shared.state()
    }

    /// Root directory being cached.
    pub fn root_path(&self) -> &Path {
        self.shared.root_path()
    }

    /// Time between refreshes.
    pub fn interval(&self) -> Duration {
        self.shared.walker.config().interval
    }

    /// Configuration the cache was built from.
    pub fn config(&self) -> &CacheConfig {
        self.shared.walker.config()
    }
}

impl Drop for DirCache {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn cache_of(temp: &TempDir) -> DirCache {
        DirCache::cache(temp.path(), Duration::from_secs(3600), NameFilter::all()).unwrap()
    }

    #[test]
    fn test_created_cache_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache = cache_of(&temp);

        assert_eq!(cache.state(), CacheState::Created);
        assert!(cache.root().is_none());
        assert!(cache.last_walk_time().is_none());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let temp = TempDir::new().unwrap();
        let result = DirCache::cache(temp.path(), Duration::ZERO, NameFilter::all());
        assert!(matches!(result, Err(CacheError::InvalidConfig { .. })));
    }

    #[test]
    fn test_start_populates_root() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "hello").unwrap();
        let cache = cache_of(&temp);

        cache.start().unwrap();

        assert_eq!(cache.state(), CacheState::Running);
        let root = cache.root().unwrap();
        assert_eq!(root.get_file("a.txt").unwrap().size(), 5);
        assert!(cache.last_walk_time().is_some());
        cache.close();
    }

    #[test]
    fn test_refresh_requires_running() {
        let temp = TempDir::new().unwrap();
        let cache = cache_of(&temp);

        assert!(matches!(
            cache.refresh(),
            Err(CacheError::IllegalState {
                state: CacheState::Created,
                ..
            })
        ));

        cache.start().unwrap();
        cache.close();
        assert!(matches!(
            cache.refresh(),
            Err(CacheError::IllegalState {
                state: CacheState::Stopped,
                ..
            })
        ));
    }

    #[test]
    fn test_start_and_close_inside_runtime() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        let cache = cache_of(&temp);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async {
            cache.start().unwrap();
            assert!(cache.root().unwrap().get("a.txt").is_some());
            cache.close();
        });
        assert_eq!(cache.state(), CacheState::Stopped);
    }

    #[test]
    fn test_callback_panic_is_contained() {
        let temp = TempDir::new().unwrap();
        let cache = cache_of(&temp);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        cache.set_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("callback failure");
        });

        cache.start().unwrap();
        fs::write(temp.path().join("new.txt"), "x").unwrap();
        assert!(cache.refresh().unwrap());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.state(), CacheState::Running);
        cache.close();
    }

    #[test]
    fn test_stop_from_callback() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(cache_of(&temp));
        let weak = Arc::downgrade(&cache);
        cache.set_callback(move || {
            if let Some(cache) = weak.upgrade() {
                cache.close();
            }
        });

        cache.start().unwrap();

        assert_eq!(cache.state(), CacheState::Stopped);
        assert!(cache.worker.lock().is_none());
    }
}
