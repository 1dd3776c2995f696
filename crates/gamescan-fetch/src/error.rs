//! Error types for gamescan-fetch.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("incomplete download: received {received} of {expected} bytes")]
    IncompleteDownload { expected: u64, received: u64 },

    #[error("download cancelled")]
    Cancelled,

    #[error("file I/O error at {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path:   path.as_ref().to_path_buf(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn transport(err: impl std::fmt::Display) -> Self { Error::Transport(err.to_string()) }

    /// Returns `true` for the error produced when a cancellation signal was observed.
    pub fn is_cancelled(&self) -> bool { matches!(self, Error::Cancelled) }

    /// Returns `true` for network-level failures that a bounded retry may recover from.
    pub fn is_transient(&self) -> bool { matches!(self, Error::Transport(_)) }
}

pub type Result<T> = std::result::Result<T, Error>;
