use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, VerificationError};
use crate::hasher::Crc32Hasher;
use crate::reader::VerifiedReader;

/// Bytes hashed between cancellation checks.
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Receives checksum progress as a percentage.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Computes the CRC-32 of `path` on a blocking thread.
///
/// `progress` is called whenever the percentage has advanced by at least one
/// point since the previous call, and once with `100.0` at the end.
///
/// # Errors
///
/// [`VerificationError::Missing`] if the file does not exist,
/// [`VerificationError::Cancelled`] if `cancel` fires between blocks.
pub async fn checksum(path: &Path, cancel: &CancellationToken, progress: Option<ProgressFn>) -> Result<u32> {
    let owned = path.to_path_buf();
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || checksum_blocking(&owned, &cancel, progress.as_deref()))
        .await
        .map_err(|e| VerificationError::io(path, io::Error::other(e)))?
}

fn checksum_blocking(path: &Path, cancel: &CancellationToken, progress: Option<&(dyn Fn(f64) + Send + Sync)>) -> Result<u32> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => VerificationError::Missing { path: path.to_path_buf() },
        _ => VerificationError::io(path, e),
    })?;
    let total = file.metadata().map_err(|e| VerificationError::io(path, e))?.len();

    let mut reader = VerifiedReader::new(file, Crc32Hasher::new());
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut reported = 0.0;
    loop {
        if cancel.is_cancelled() {
            return Err(VerificationError::Cancelled);
        }
        let n = reader.read(&mut buffer).map_err(|e| VerificationError::io(path, e))?;
        if n == 0 {
            break;
        }
        if let Some(report) = progress.filter(|_| total > 0) {
            let percent = reader.bytes_read() as f64 / total as f64 * 100.0;
            if percent - reported >= 1.0 {
                reported = percent;
                report(percent.min(100.0));
            }
        }
    }
    if let Some(report) = progress {
        report(100.0);
    }
    Ok(reader.into_hasher().value())
}

/// Existence and length check, without reading the content.
pub async fn quick_check(path: &Path, expected_size: u64) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file() && meta.len() == expected_size)
}

/// [`quick_check`] followed by a checksum comparison.
///
/// A missing file or a size or checksum mismatch yields `Ok(false)`.
///
/// # Errors
///
/// Only I/O failures while hashing and cancellation.
pub async fn full_check(
    path: &Path,
    expected_size: u64,
    expected_crc: u32,
    cancel: &CancellationToken,
    progress: Option<ProgressFn>,
) -> Result<bool> {
    match ensure_valid(path, expected_size, expected_crc, cancel, progress).await {
        Ok(()) => Ok(true),
        Err(VerificationError::Missing { .. })
        | Err(VerificationError::SizeMismatch { .. })
        | Err(VerificationError::ChecksumMismatch { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Like [`full_check`], but reports which property failed.
pub async fn ensure_valid(
    path: &Path,
    expected_size: u64,
    expected_crc: u32,
    cancel: &CancellationToken,
    progress: Option<ProgressFn>,
) -> Result<()> {
    let to_path = || PathBuf::from(path);
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Err(VerificationError::Missing { path: to_path() }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(VerificationError::Missing { path: to_path() }),
        Err(e) => return Err(VerificationError::io(path, e)),
    };
    if meta.len() != expected_size {
        return Err(VerificationError::SizeMismatch {
            path:     to_path(),
            expected: expected_size,
            actual:   meta.len(),
        });
    }

    let actual = checksum(path, cancel, progress).await?;
    if actual != expected_crc {
        debug!(path = %path.display(), expected = expected_crc, actual, "checksum mismatch");
        return Err(VerificationError::ChecksumMismatch {
            path: to_path(),
            expected: expected_crc,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;

    fn write(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn test_checksum_matches_crc32fast() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 199) as u8).collect();
        let path = write(&dir, "a.bin", &data);

        let crc = checksum(&path, &CancellationToken::new(), None).await.unwrap();
        assert_eq!(crc, crc32fast::hash(&data));
    }

    #[tokio::test]
    async fn test_progress_is_throttled_and_ends_at_100() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.bin", &vec![7u8; BLOCK_SIZE * 10]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |p: f64| sink.lock().unwrap().push(p));

        checksum(&path, &CancellationToken::new(), Some(progress)).await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.len() <= 11);
        assert_eq!(*seen.last().unwrap(), 100.0);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_checksum_cancelled() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.bin", b"data");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = checksum(&path, &cancel, None).await.unwrap_err();
        assert!(matches!(err, VerificationError::Cancelled));
    }

    #[tokio::test]
    async fn test_quick_check() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.bin", b"12345");
        assert!(quick_check(&path, 5).await);
        assert!(!quick_check(&path, 4).await);
        assert!(!quick_check(&dir.path().join("missing"), 5).await);
        assert!(!quick_check(dir.path(), 0).await);
    }

    #[tokio::test]
    async fn test_full_check_and_ensure_valid() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.bin", b"123456789");
        let cancel = CancellationToken::new();

        assert!(full_check(&path, 9, 0xCBF4_3926, &cancel, None).await.unwrap());
        assert!(!full_check(&path, 9, 0xDEAD_BEEF, &cancel, None).await.unwrap());
        assert!(!full_check(&path, 8, 0xCBF4_3926, &cancel, None).await.unwrap());

        let err = ensure_valid(&path, 9, 1, &cancel, None).await.unwrap_err();
        assert!(matches!(err, VerificationError::ChecksumMismatch { expected: 1, actual: 0xCBF4_3926, .. }));
        let err = ensure_valid(&dir.path().join("nope"), 9, 1, &cancel, None).await.unwrap_err();
        assert!(matches!(err, VerificationError::Missing { .. }));
    }
}
