use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::assemble::assemble;
use super::http::HttpClient;
use super::scheduler;
use super::status::{Status, StatusCell};
use crate::core::ProgressAggregator;
use crate::data::{DownloadProgress, EngineOptions, EngineState};
use crate::error::{Error, Result};
use crate::job::DownloadJob;

/// The contract shared by the chunked engine and the single-stream downloader.
pub trait FileDownloader: Send + Sync {
    /// Last published progress snapshot.
    fn progress(&self) -> DownloadProgress;

    fn state(&self) -> EngineState;

    /// The fault that moved the downloader to [`EngineState::Error`].
    fn error(&self) -> Option<Error>;

    /// Runs the download to the end, aborting it when `cancel` fires.
    fn download(&self, cancel: &CancellationToken) -> impl Future<Output = Result<()>> + Send;
}

struct Run {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// State machine driving one chunked download.
///
/// A run goes `Idle → Start → Download → Append → Complete`. [`abort`]
/// cancels the workers, waits for all of them and leaves the engine `Idle`;
/// a later [`start`] resumes over the same job and reuses every chunk byte
/// already on disk. A failure leaves the engine in `Error` with the fault
/// captured until the next `start`.
///
/// [`abort`]: DownloadEngine::abort
/// [`start`]: DownloadEngine::start
pub struct DownloadEngine<C: HttpClient + 'static> {
    client:  Arc<C>,
    job:     Arc<DownloadJob>,
    target:  PathBuf,
    options: EngineOptions,
    cell:    Arc<StatusCell>,
    run:     Mutex<Option<Run>>,
}

impl<C: HttpClient + 'static> DownloadEngine<C> {
    /// Wraps `job` in an engine that will write the assembled file to `target`.
    pub fn new(client: Arc<C>, job: DownloadJob, target: impl Into<PathBuf>, options: EngineOptions) -> Self {
        let cell = Arc::new(StatusCell::new());
        cell.set(EngineState::Create, false);
        cell.set_progress(DownloadProgress::new(EngineState::Create, 0, job.total_size(), 0.0));
        cell.set(EngineState::Idle, true);
        Self {
            client,
            job: Arc::new(job),
            target: target.into(),
            options,
            cell,
            run: Mutex::new(None),
        }
    }

    /// Discovers size and range support of `url`, then builds an engine for it.
    pub async fn discover(
        client: Arc<C>,
        url: &str,
        expected_size: Option<u64>,
        target: impl Into<PathBuf>,
        options: EngineOptions,
    ) -> Result<Self> {
        let job = DownloadJob::discover(client.as_ref(), url, expected_size, &options).await?;
        Ok(Self::new(client, job, target, options))
    }

    pub fn job(&self) -> &DownloadJob { &self.job }

    pub fn target(&self) -> &Path { &self.target }

    /// Whether the current state's work has finished.
    ///
    /// Derived values such as progress are only authoritative while this is set.
    pub fn is_state_completed(&self) -> bool { self.cell.status().completed }

    /// Receiver of every state transition.
    pub fn subscribe(&self) -> watch::Receiver<Status> { self.cell.subscribe() }

    /// Launches a run in the background.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless the engine is `Idle` or `Error`.
    pub fn start(&self) -> Result<()> {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        let state = self.cell.status().state;
        if !state.can_start() {
            return Err(Error::InvalidState(format!("cannot start a download in state {state}")));
        }

        self.cell.set_error(None);
        self.job.rewind();
        self.cell.set(EngineState::Start, false);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drive(
            self.client.clone(),
            self.job.clone(),
            self.target.clone(),
            self.options.clone(),
            self.cell.clone(),
            cancel.clone(),
        ));
        *run = Some(Run { cancel, handle });
        Ok(())
    }

    /// Cancels the current run and waits until every worker has exited.
    ///
    /// Idempotent. Returns the settled state: `Idle` after a cancelled run,
    /// or the outcome of a run that finished before the signal arrived.
    pub async fn abort(&self) -> EngineState {
        let run = self.run.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(run) = run {
            run.cancel.cancel();
            if let Err(e) = run.handle.await {
                warn!(error = %e, "download task ended abnormally");
                self.cell.set(EngineState::Abort, false);
                self.cell.set(EngineState::Idle, true);
            }
        }
        self.cell.settled().await
    }

    /// Waits for the current run to settle.
    pub async fn wait(&self) -> Result<()> {
        let state = self.cell.settled().await;
        self.cell.outcome(state)
    }
}

impl<C: HttpClient + 'static> FileDownloader for DownloadEngine<C> {
    fn progress(&self) -> DownloadProgress { self.cell.progress() }

    fn state(&self) -> EngineState { self.cell.status().state }

    fn error(&self) -> Option<Error> { self.cell.error() }

    async fn download(&self, cancel: &CancellationToken) -> Result<()> {
        self.start()?;
        tokio::select! {
            _ = cancel.cancelled() => {
                let state = self.abort().await;
                self.cell.outcome(state)
            }
            result = self.wait() => result,
        }
    }
}

impl<C: HttpClient + 'static> Drop for DownloadEngine<C> {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            run.cancel.cancel();
        }
    }
}

/// Body of one run: schedule, assemble, settle.
async fn drive<C: HttpClient + 'static>(
    client: Arc<C>,
    job: Arc<DownloadJob>,
    target: PathBuf,
    options: EngineOptions,
    cell: Arc<StatusCell>,
    cancel: CancellationToken,
) {
    cell.set(EngineState::Download, false);
    let stop_ticker = CancellationToken::new();
    let ticker = tokio::spawn(tick(job.clone(), options.clone(), cell.clone(), stop_ticker.clone()));

    let result = async {
        scheduler::run(client, job.clone(), &options.scheduler, &cancel).await?;
        cell.set(EngineState::Append, false);
        assemble(&job, &target, &cancel).await
    }
    .await;

    stop_ticker.cancel();
    let mut aggregator = ticker.await.unwrap_or_default();

    let settled = match &result {
        Ok(()) => EngineState::Complete,
        Err(Error::Cancelled) => EngineState::Idle,
        Err(_) => EngineState::Error,
    };
    let last = aggregator.tick(&job, if settled == EngineState::Complete { settled } else { EngineState::Download });
    let last = DownloadProgress { state: settled, ..last };
    cell.set_progress(last.clone());
    options.report(&last);

    match result {
        Ok(()) => {
            info!(url = job.url(), target = %target.display(), bytes = job.total_size(), "download complete");
            cell.set(EngineState::Complete, true);
        }
        Err(Error::Cancelled) => {
            debug!(url = job.url(), "download aborted");
            cell.set(EngineState::Abort, false);
            cell.set(EngineState::Idle, true);
        }
        Err(error) => {
            warn!(url = job.url(), %error, "download failed");
            cell.set_error(Some(error));
            cell.set(EngineState::Abort, false);
            cell.set(EngineState::Error, true);
        }
    }
}

/// Publishes progress snapshots on a fixed interval until `stop` fires.
async fn tick(
    job: Arc<DownloadJob>,
    options: EngineOptions,
    cell: Arc<StatusCell>,
    stop: CancellationToken,
) -> ProgressAggregator {
    let mut aggregator = ProgressAggregator::new();
    let mut interval = tokio::time::interval(options.tick_interval.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {
                let snapshot = aggregator.tick(&job, cell.status().state);
                cell.set_progress(snapshot.clone());
                options.report(&snapshot);
            }
        }
    }
    aggregator
}
