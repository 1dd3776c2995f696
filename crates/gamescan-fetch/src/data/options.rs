use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::progress::DownloadProgress;

/// Largest byte range a single chunk covers (10 MiB).
pub const DEFAULT_CHUNK_SIZE_LIMIT: u64 = 10 * 1024 * 1024;

/// Default number of concurrent chunk workers per download.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Callback receiving aggregated progress snapshots.
pub type ProgressCallback = Arc<dyn Fn(&DownloadProgress) + Send + Sync>;

/// Worker-pool configuration for one chunked download.
///
/// # Examples
///
/// ```
/// use gamescan_fetch::SchedulerOptions;
/// use std::time::Duration;
///
/// let options = SchedulerOptions::default()
///     .max_workers(4)
///     .chunk_retries(2)
///     .retry_backoff(Duration::from_millis(200));
/// assert_eq!(options.max_workers, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Upper bound on concurrent chunk workers.
    ///
    /// The pool never grows past the number of chunks in the job.
    ///
    /// Default: 10
    pub max_workers: usize,

    /// Additional attempts per chunk after a transport failure.
    ///
    /// `0` keeps the strict mode where the first failing chunk fails the
    /// whole job. Retries resume from the bytes already on disk.
    ///
    /// Default: 0
    pub chunk_retries: u32,

    /// Base delay for exponential backoff between chunk retries.
    ///
    /// Default: 100ms
    pub retry_backoff: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_workers:   DEFAULT_MAX_WORKERS,
            chunk_retries: 0,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

impl SchedulerOptions {
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn chunk_retries(mut self, chunk_retries: u32) -> Self {
        self.chunk_retries = chunk_retries;
        self
    }

    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }
}

/// Configuration for a [`DownloadEngine`](crate::DownloadEngine) and the job it drives.
#[derive(Clone)]
pub struct EngineOptions {
    /// Maximum size of one chunk. Must be non-zero.
    ///
    /// Default: 10 MiB
    pub chunk_size_limit: u64,

    /// Root under which per-job cache directories are created.
    ///
    /// Default: `<system temp>/gamescan/Cache`
    pub cache_root: PathBuf,

    /// Worker pool settings.
    pub scheduler: SchedulerOptions,

    /// Interval between progress snapshots.
    ///
    /// Default: 500ms
    pub tick_interval: Duration,

    /// Progress callback, invoked from the ticker task and once more when
    /// the engine settles.
    ///
    /// Default: None
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("chunk_size_limit", &self.chunk_size_limit)
            .field("cache_root", &self.cache_root)
            .field("scheduler", &self.scheduler)
            .field("tick_interval", &self.tick_interval)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chunk_size_limit: DEFAULT_CHUNK_SIZE_LIMIT,
            cache_root:       std::env::temp_dir().join("gamescan").join("Cache"),
            scheduler:        SchedulerOptions::default(),
            tick_interval:    Duration::from_millis(500),
            on_progress:      None,
        }
    }
}

impl EngineOptions {
    pub fn chunk_size_limit(mut self, limit: u64) -> Self {
        self.chunk_size_limit = limit;
        self
    }

    pub fn cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    pub fn scheduler(mut self, scheduler: SchedulerOptions) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.scheduler.max_workers = max_workers;
        self
    }

    pub fn chunk_retries(mut self, chunk_retries: u32) -> Self {
        self.scheduler.chunk_retries = chunk_retries;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(&DownloadProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub(crate) fn report(&self, progress: &DownloadProgress) {
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::data::EngineState;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.chunk_size_limit, 10 * 1024 * 1024);
        assert_eq!(options.scheduler.max_workers, 10);
        assert_eq!(options.scheduler.chunk_retries, 0);
        assert!(options.on_progress.is_none());
        assert!(options.cache_root.ends_with("Cache"));
    }

    #[test]
    fn test_builder_chain() {
        let options = EngineOptions::default()
            .chunk_size_limit(1024)
            .max_workers(3)
            .chunk_retries(1)
            .tick_interval(Duration::from_millis(10))
            .cache_root("/tmp/cache");
        assert_eq!(options.chunk_size_limit, 1024);
        assert_eq!(options.scheduler.max_workers, 3);
        assert_eq!(options.scheduler.chunk_retries, 1);
        assert_eq!(options.tick_interval, Duration::from_millis(10));
        assert_eq!(options.cache_root, PathBuf::from("/tmp/cache"));
    }

    #[test]
    fn test_report_invokes_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let options = EngineOptions::default().on_progress(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        options.report(&DownloadProgress::new(EngineState::Download, 0, 10, 0.0));
        options.report(&DownloadProgress::new(EngineState::Download, 5, 10, 0.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(format!("{options:?}").contains("<callback>"));
    }
}
