use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::engine::FileDownloader;
use super::http::HttpClient;
use super::status::StatusCell;
use crate::data::{DownloadProgress, EngineOptions, EngineState};
use crate::error::{Error, Result};

/// Whole-file `GET` written straight to the target.
///
/// Used for small files where splitting into ranges costs more than it
/// saves. Progress is published on the same interval as the chunked engine,
/// measured between reads instead of by a ticker task.
pub struct SingleStreamDownloader<C: HttpClient> {
    client:        Arc<C>,
    url:           String,
    target:        PathBuf,
    expected_size: Option<u64>,
    options:       EngineOptions,
    cell:          StatusCell,
}

impl<C: HttpClient> SingleStreamDownloader<C> {
    pub fn new(
        client: Arc<C>,
        url: impl Into<String>,
        target: impl Into<PathBuf>,
        expected_size: Option<u64>,
        options: EngineOptions,
    ) -> Self {
        let cell = StatusCell::new();
        cell.set(EngineState::Create, true);
        Self {
            client,
            url: url.into(),
            target: target.into(),
            expected_size,
            options,
            cell,
        }
    }

    pub fn target(&self) -> &Path { &self.target }

    fn publish(&self, state: EngineState, bytes: u64, speed: f64) {
        let total = self.expected_size.unwrap_or(bytes);
        let progress = DownloadProgress::new(state, bytes, total, speed);
        self.cell.set_progress(progress.clone());
        self.options.report(&progress);
    }

    async fn transfer(&self, cancel: &CancellationToken) -> Result<u64> {
        if let Some(parent) = self.target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| Error::io(parent, e))?;
        }
        let mut file = File::create(&self.target).await.map_err(|e| Error::io(&self.target, e))?;

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            opened = self.client.stream(&self.url, &[]) => opened.map_err(Error::transport)?,
        };

        let mut received = 0u64;
        let mut last_bytes = 0u64;
        let mut last_report = Instant::now();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    drop(stream);
                    return Err(Error::Cancelled);
                }
                next = stream.next() => next,
            };
            let Some(piece) = next else { break };
            let bytes = piece.map_err(Error::transport)?;
            file.write_all(&bytes).await.map_err(|e| Error::io(&self.target, e))?;
            received += bytes.len() as u64;

            let elapsed = last_report.elapsed();
            if elapsed >= self.options.tick_interval {
                let speed = (received - last_bytes) as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
                self.publish(EngineState::Download, received, speed);
                last_bytes = received;
                last_report = Instant::now();
            }
        }
        file.flush().await.map_err(|e| Error::io(&self.target, e))?;

        if let Some(expected) = self.expected_size.filter(|&expected| expected != received) {
            return Err(Error::IncompleteDownload { expected, received });
        }
        Ok(received)
    }
}

impl<C: HttpClient> FileDownloader for SingleStreamDownloader<C> {
    fn progress(&self) -> DownloadProgress { self.cell.progress() }

    fn state(&self) -> EngineState { self.cell.status().state }

    fn error(&self) -> Option<Error> { self.cell.error() }

    async fn download(&self, cancel: &CancellationToken) -> Result<()> {
        let state = self.state();
        if state.is_active() {
            return Err(Error::InvalidState(format!("cannot start a download in state {state}")));
        }
        self.cell.set_error(None);
        self.cell.set(EngineState::Download, false);
        debug!(url = %self.url, target = %self.target.display(), "single-stream download");

        match self.transfer(cancel).await {
            Ok(received) => {
                self.publish(EngineState::Complete, received, 0.0);
                self.cell.set(EngineState::Complete, true);
                Ok(())
            }
            Err(error) => {
                match fs::remove_file(&self.target).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!(target = %self.target.display(), error = %e, "could not remove partial download"),
                }
                let settled = if error.is_cancelled() { EngineState::Idle } else { EngineState::Error };
                if !error.is_cancelled() {
                    self.cell.set_error(Some(error.clone()));
                }
                self.cell.set(EngineState::Abort, false);
                self.cell.set(settled, true);
                Err(error)
            }
        }
    }
}
