use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::data::{DownloadProgress, EngineState};
use crate::error::Error;

/// Engine state paired with the completion latch.
///
/// `completed` is set once the work of `state` has finished and the state
/// will not change until the next explicit transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub state:     EngineState,
    pub completed: bool,
}

impl Status {
    /// A run has ended and its outcome is final.
    pub fn is_settled(self) -> bool {
        self.completed && matches!(self.state, EngineState::Idle | EngineState::Complete | EngineState::Error)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

/// State, last error and last progress snapshot of a downloader, shared
/// between the caller and the run task.
#[derive(Debug)]
pub(crate) struct StatusCell {
    status:   watch::Sender<Status>,
    error:    Mutex<Option<Error>>,
    progress: Mutex<DownloadProgress>,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        let (status, _) = watch::channel(Status {
            state:     EngineState::Invalid,
            completed: true,
        });
        Self {
            status,
            error: Mutex::new(None),
            progress: Mutex::new(DownloadProgress::default()),
        }
    }

    pub(crate) fn set(&self, state: EngineState, completed: bool) {
        let previous = self.status.send_replace(Status { state, completed });
        if previous.state != state {
            debug!(from = %previous.state, to = %state, "downloader state changed");
        }
    }

    pub(crate) fn status(&self) -> Status { *self.status.borrow() }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Status> { self.status.subscribe() }

    /// Waits until a run has settled and returns the settled state.
    pub(crate) async fn settled(&self) -> EngineState {
        let mut rx = self.subscribe();
        match rx.wait_for(|status| status.is_settled()).await {
            Ok(status) => status.state,
            // the sender lives as long as `self`
            Err(_) => self.status().state,
        }
    }

    pub(crate) fn error(&self) -> Option<Error> { lock(&self.error).clone() }

    pub(crate) fn set_error(&self, error: Option<Error>) { *lock(&self.error) = error; }

    pub(crate) fn progress(&self) -> DownloadProgress { lock(&self.progress).clone() }

    pub(crate) fn set_progress(&self, progress: DownloadProgress) { *lock(&self.progress) = progress; }

    /// Outcome of a settled run as a `Result`.
    pub(crate) fn outcome(&self, state: EngineState) -> crate::error::Result<()> {
        match state {
            EngineState::Complete => Ok(()),
            EngineState::Error => Err(self
                .error()
                .unwrap_or_else(|| Error::InvalidState("download failed without an error".into()))),
            _ => Err(Error::Cancelled),
        }
    }
}
