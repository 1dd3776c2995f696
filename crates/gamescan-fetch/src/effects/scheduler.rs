use std::sync::{Arc, OnceLock};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::http::HttpClient;
use super::worker::download_chunk;
use crate::core::retry_delay;
use crate::data::SchedulerOptions;
use crate::error::{Error, Result};
use crate::job::DownloadJob;

/// Downloads every chunk of `job` with a bounded pool of workers.
///
/// Spawns `min(max_workers, chunk_count)` tasks that claim chunk indices
/// from the job's shared counter until none are left. The first failure is
/// kept (later ones are dropped) and stops the other workers from claiming
/// further chunks. Returns once every worker has exited.
///
/// # Errors
///
/// The first chunk error, or [`Error::Cancelled`] when `cancel` fired and
/// no chunk failed.
pub async fn run<C>(client: Arc<C>, job: Arc<DownloadJob>, options: &SchedulerOptions, cancel: &CancellationToken) -> Result<()>
where
    C: HttpClient + 'static,
{
    let workers = options.max_workers.max(1).min(job.chunk_count());
    if workers == 0 {
        return Ok(());
    }
    debug!(workers, chunks = job.chunk_count(), url = job.url(), "starting chunk workers");

    let halt = cancel.child_token();
    let first_error = Arc::new(OnceLock::new());
    let mut set = JoinSet::new();

    for worker in 0..workers {
        set.spawn(worker_loop(
            worker,
            client.clone(),
            job.clone(),
            options.clone(),
            halt.clone(),
            first_error.clone(),
        ));
    }

    while let Some(joined) = set.join_next().await {
        if let Err(join_error) = joined {
            let _ = first_error.set(Error::InvalidState(format!("chunk worker failed: {join_error}")));
            halt.cancel();
        }
    }

    match first_error.get() {
        Some(error) => Err(error.clone()),
        None if cancel.is_cancelled() => Err(Error::Cancelled),
        None => Ok(()),
    }
}

async fn worker_loop<C: HttpClient>(
    worker: usize,
    client: Arc<C>,
    job: Arc<DownloadJob>,
    options: SchedulerOptions,
    halt: CancellationToken,
    first_error: Arc<OnceLock<Error>>,
) {
    while !halt.is_cancelled() {
        let Some(index) = job.claim_next() else { break };
        if let Err(error) = download_with_retry(client.as_ref(), &job, index, &options, &halt).await {
            if !error.is_cancelled() {
                warn!(worker, index, %error, "chunk failed");
            }
            record_failure(&first_error, &halt, error);
            break;
        }
    }
    debug!(worker, "chunk worker exited");
}

/// Keeps `error` if it is the first real failure of the run and halts the
/// other workers. Cancellations are never recorded. Returns whether `error`
/// was stored.
fn record_failure(first_error: &OnceLock<Error>, halt: &CancellationToken, error: Error) -> bool {
    if error.is_cancelled() {
        return false;
    }
    let stored = first_error.set(error).is_ok();
    halt.cancel();
    stored
}

async fn download_with_retry<C: HttpClient>(
    client: &C,
    job: &DownloadJob,
    index: usize,
    options: &SchedulerOptions,
    halt: &CancellationToken,
) -> Result<()> {
    let mut attempt = 0;
    loop {
        match download_chunk(client, job, index, halt).await {
            Ok(_) => return Ok(()),
            Err(error) if error.is_transient() && attempt < options.chunk_retries => {
                let delay = retry_delay(attempt, options.retry_backoff);
                debug!(index, attempt, ?delay, %error, "retrying chunk");
                attempt += 1;
                tokio::select! {
                    _ = halt.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(error) => return Err(error),
        }
    }
}
