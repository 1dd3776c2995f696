//! The scan-and-repair orchestrator.

use std::sync::{Arc, OnceLock, PoisonError};

use futures_util::{StreamExt, stream};
use gamescan_archive::Codec;
use gamescan_fetch::HttpClient;
use gamescan_fs::clean_dir;
use gamescan_verify::{full_check, quick_check};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::error::{Error, Result};
use crate::manifest::{GameFileInfo, GameFilesInfo};
use crate::observer::{NoopObserver, RepairObserver};
use crate::pipeline::{FileRepair, RepairOutcome, blocking};
use crate::progress::{ScanProgress, weighted_percent};

/// How [`GameScanner::scan`] checks files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Existence and size only, many files at a time.
    #[default]
    Quick,
    /// Size and checksum, one file at a time.
    Full,
}

/// Counts from a finished repair run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairSummary {
    pub checked:  usize,
    pub repaired: usize,
}

/// Checks an install against its manifest and repairs what does not match.
///
/// One scan or repair runs at a time; a second call while one is running
/// fails with [`Error::AlreadyRunning`] instead of waiting. [`abort`] may be
/// called from any task.
///
/// [`abort`]: GameScanner::abort
pub struct GameScanner<C, K> {
    client:   Arc<C>,
    codec:    Arc<K>,
    config:   ScannerConfig,
    observer: Arc<dyn RepairObserver>,
    files:    OnceLock<Vec<GameFileInfo>>,
    running:  Mutex<()>,
    cancel:   std::sync::Mutex<CancellationToken>,
}

impl<C, K> GameScanner<C, K>
where
    C: HttpClient + 'static,
    K: Codec + 'static,
{
    pub fn new(client: Arc<C>, codec: K, config: ScannerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            codec: Arc::new(codec),
            config,
            observer: Arc::new(NoopObserver),
            files: OnceLock::new(),
            running: Mutex::new(()),
            cancel: std::sync::Mutex::new(CancellationToken::new()),
        })
    }

    pub fn observer(mut self, observer: impl RepairObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn config(&self) -> &ScannerConfig { &self.config }

    /// Files loaded by [`initialize`](GameScanner::initialize).
    pub fn files(&self) -> Option<&[GameFileInfo]> { self.files.get().map(Vec::as_slice) }

    pub fn is_running(&self) -> bool { self.running.try_lock().is_err() }

    /// Loads the file list. Can only be done once per scanner.
    pub async fn initialize(&self, manifest: GameFilesInfo) -> Result<()> {
        if self.files.get().is_some() {
            return Err(Error::AlreadyInitialized);
        }
        if manifest.is_empty() {
            return Err(Error::InvalidArgument("game files info is empty".into()));
        }
        self.clean_temp().await?;

        info!(version = %manifest.version(), files = manifest.len(), "manifest loaded");
        self.files.set(manifest.into_files()).map_err(|_| Error::AlreadyInitialized)
    }

    /// Checks every file. Returns `false` as soon as one file fails.
    ///
    /// # Errors
    ///
    /// In [`ScanMode::Full`], the first I/O failure while hashing. Missing or
    /// mismatching files are not errors in either mode.
    pub async fn scan(&self, mode: ScanMode) -> Result<bool> {
        let (files, _guard, cancel) = self.begin()?;
        let total_size = files.iter().map(|f| f.size).sum::<u64>();
        self.observer.on_scan_progress(&ScanProgress::new("", 0.0, 0, files.len()));

        let passed = match mode {
            ScanMode::Quick => self.quick_scan(files, total_size, &cancel).await?,
            ScanMode::Full => self.full_scan(files, total_size, &cancel).await?,
        };
        debug!(?mode, passed, "scan finished");
        Ok(passed)
    }

    /// Repairs every file that fails a full check, one file at a time.
    ///
    /// Files below a directory go first, then top-level files, each group
    /// by name. The first failure stops the run; files repaired before it
    /// stay repaired.
    pub async fn scan_and_repair(&self) -> Result<RepairSummary> {
        let (files, _guard, cancel) = self.begin()?;
        self.clean_temp().await?;

        let result = self.repair_all(files, &cancel).await;
        if let Err(e) = self.clean_temp().await {
            warn!(error = %e, "failed to clean temp folder");
        }
        match &result {
            Ok(summary) => info!(checked = summary.checked, repaired = summary.repaired, "repair finished"),
            Err(e) if e.is_cancelled() => info!("repair aborted"),
            Err(e) => warn!(error = %e, "repair failed"),
        }
        result
    }

    /// Cancels the running scan or repair. Does nothing when idle.
    pub fn abort(&self) {
        if !self.is_running() {
            return;
        }
        debug!("aborting scan");
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner).cancel();
    }

    fn begin(&self) -> Result<(&[GameFileInfo], MutexGuard<'_, ()>, CancellationToken)> {
        let files = self.files().filter(|f| !f.is_empty()).ok_or(Error::NotInitialized)?;
        let guard = self.running.try_lock().map_err(|_| Error::AlreadyRunning)?;

        let cancel = CancellationToken::new();
        let previous = std::mem::replace(
            &mut *self.cancel.lock().unwrap_or_else(PoisonError::into_inner),
            cancel.clone(),
        );
        previous.cancel();
        Ok((files, guard, cancel))
    }

    async fn quick_scan(&self, files: &[GameFileInfo], total_size: u64, cancel: &CancellationToken) -> Result<bool> {
        let root = &self.config.files_root;
        let mut checks = stream::iter(files)
            .map(|file| async move { (file, quick_check(&root.join(file.relative_path()), file.size).await) })
            .buffer_unordered(self.config.quick_scan_parallelism.max(1));

        let (mut index, mut done) = (0, 0);
        while let Some((file, ok)) = checks.next().await {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if !ok {
                debug!(file = %file.file_name, "quick check failed");
                return Ok(false);
            }
            index += 1;
            done += file.size;
            let percent = weighted_percent(done, total_size, index, files.len());
            self.observer
                .on_scan_progress(&ScanProgress::new(&file.file_name, percent, index, files.len()));
        }
        Ok(true)
    }

    async fn full_scan(&self, files: &[GameFileInfo], total_size: u64, cancel: &CancellationToken) -> Result<bool> {
        let mut done = 0;
        for (i, file) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let path = self.config.files_root.join(file.relative_path());
            if !full_check(&path, file.size, file.crc32, cancel, None).await? {
                debug!(file = %file.file_name, "full check failed");
                return Ok(false);
            }
            done += file.size;
            let percent = weighted_percent(done, total_size, i + 1, files.len());
            self.observer
                .on_scan_progress(&ScanProgress::new(&file.file_name, percent, i + 1, files.len()));
        }
        Ok(true)
    }

    async fn repair_all(&self, files: &[GameFileInfo], cancel: &CancellationToken) -> Result<RepairSummary> {
        let mut ordered: Vec<&GameFileInfo> = files.iter().collect();
        ordered.sort_by(|a, b| {
            b.is_nested()
                .cmp(&a.is_nested())
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

        let count = ordered.len();
        let total_size = ordered.iter().map(|f| f.bin_size).sum::<u64>();
        let repair = FileRepair {
            client: &self.client,
            codec: &self.codec,
            config: &self.config,
            observer: &self.observer,
            cancel,
        };

        let mut summary = RepairSummary::default();
        let mut done = 0;
        for (index, file) in ordered.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let percent = weighted_percent(done, total_size, index, count);
            self.observer
                .on_scan_progress(&ScanProgress::new(&file.file_name, percent, index, count));

            let outcome = repair.run(file).await.map_err(|e| Error::File {
                file_name: file.file_name.clone(),
                source:    Box::new(e),
            })?;
            summary.checked += 1;
            if outcome == RepairOutcome::Repaired {
                summary.repaired += 1;
                self.observer.on_file_repaired(file);
            }
            done += file.bin_size;
        }
        self.observer.on_scan_progress(&ScanProgress::new("", 100.0, count, count));
        Ok(summary)
    }

    async fn clean_temp(&self) -> Result<()> {
        let root = self.config.temp_root.clone();
        blocking(&self.config.temp_root, move || Ok(clean_dir(root)?)).await
    }
}

impl<C, K> Drop for GameScanner<C, K> {
    fn drop(&mut self) { self.cancel.lock().unwrap_or_else(PoisonError::into_inner).cancel(); }
}
