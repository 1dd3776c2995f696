use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("file not found: {path}")]
    Missing { path: PathBuf },

    #[error("size mismatch for {path}: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        path:     PathBuf,
        expected: u64,
        actual:   u64,
    },

    #[error("checksum mismatch for {path}: expected {expected:08X}, got {actual:08X}")]
    ChecksumMismatch {
        path:     PathBuf,
        expected: u32,
        actual:   u32,
    },

    #[error("verification cancelled")]
    Cancelled,

    #[error("I/O error at {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

impl VerificationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, VerificationError>;
