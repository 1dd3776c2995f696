//! Error types for gamescan-repair.

use std::io;
use std::path::{Path, PathBuf};

use gamescan_verify::VerificationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("game scanner has not been initialized or no game files were found")]
    NotInitialized,

    #[error("game files have already been loaded")]
    AlreadyInitialized,

    #[error("a scan is already running")]
    AlreadyRunning,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid manifest {origin}: {reason}")]
    Manifest { origin: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Fetch(#[from] gamescan_fetch::Error),

    #[error(transparent)]
    Verify(#[from] VerificationError),

    #[error(transparent)]
    Extract(#[from] gamescan_archive::Error),

    #[error(transparent)]
    Fs(#[from] gamescan_fs::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to repair {file_name}: {source}")]
    File {
        file_name: String,
        #[source]
        source:    Box<Error>,
    },
}

/// Flat classification of every failure a scan or repair run can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Transport,
    IncompleteDownload,
    ChecksumMismatch,
    Extraction,
    Cancelled,
    AlreadyRunning,
    NotInitialized,
    InvalidState,
    Io,
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn manifest(origin: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Manifest {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotInitialized => ErrorKind::NotInitialized,
            Error::AlreadyInitialized | Error::InvalidArgument(_) | Error::Manifest { .. } => {
                ErrorKind::InvalidArgument
            }
            Error::AlreadyRunning => ErrorKind::AlreadyRunning,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Fetch(e) => match e {
                gamescan_fetch::Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
                gamescan_fetch::Error::Transport(_) => ErrorKind::Transport,
                gamescan_fetch::Error::IncompleteDownload { .. } => ErrorKind::IncompleteDownload,
                gamescan_fetch::Error::Cancelled => ErrorKind::Cancelled,
                gamescan_fetch::Error::Io { .. } => ErrorKind::Io,
                gamescan_fetch::Error::InvalidState(_) => ErrorKind::InvalidState,
            },
            Error::Verify(e) => match e {
                VerificationError::Missing { .. }
                | VerificationError::SizeMismatch { .. }
                | VerificationError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
                VerificationError::Cancelled => ErrorKind::Cancelled,
                VerificationError::Io { .. } => ErrorKind::Io,
            },
            Error::Extract(e) => match e {
                gamescan_archive::Error::Cancelled => ErrorKind::Cancelled,
                _ => ErrorKind::Extraction,
            },
            Error::Fs(_) | Error::Io { .. } => ErrorKind::Io,
            Error::File { source, .. } => source.kind(),
        }
    }

    pub fn is_cancelled(&self) -> bool { self.kind() == ErrorKind::Cancelled }

    /// The manifest entry a repair run stopped on, if any.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Error::File { file_name, .. } => Some(file_name),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
