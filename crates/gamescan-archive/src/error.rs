use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("archive is corrupted: {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("decompression cancelled")]
    Cancelled,

    #[error("I/O error at {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
