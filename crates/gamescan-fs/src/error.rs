use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove {path}: {source}")]
    Remove {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from:   PathBuf,
        to:     PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{from} and {to} are on different filesystems")]
    CrossDevice { from: PathBuf, to: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;
