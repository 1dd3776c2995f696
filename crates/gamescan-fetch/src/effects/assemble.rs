use std::io;
use std::path::Path;

use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::job::DownloadJob;

const COPY_BUFFER: usize = 64 * 1024;

/// Concatenates the chunk files of `job` into `target`, in range order.
///
/// Refuses to start unless the chunk counters add up to exactly the job's
/// total size. After a complete copy every chunk file and the job's cache
/// directory are removed.
///
/// # Errors
///
/// [`Error::IncompleteDownload`] on an accounting mismatch,
/// [`Error::Cancelled`] if `cancel` fires between buffers, [`Error::Io`] on
/// file failures.
pub async fn assemble(job: &DownloadJob, target: &Path, cancel: &CancellationToken) -> Result<()> {
    let received = job.bytes_written();
    if received != job.total_size() {
        return Err(Error::IncompleteDownload {
            expected: job.total_size(),
            received,
        });
    }

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| Error::io(parent, e))?;
    }
    let mut output = File::create(target).await.map_err(|e| Error::io(target, e))?;
    let mut buffer = vec![0u8; COPY_BUFFER];

    for chunk in job.chunks() {
        let source = chunk.temp_path();
        let mut input = File::open(source).await.map_err(|e| Error::io(source, e))?;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let n = input.read(&mut buffer).await.map_err(|e| Error::io(source, e))?;
            if n == 0 {
                break;
            }
            output.write_all(&buffer[..n]).await.map_err(|e| Error::io(target, e))?;
            job.add_assembled(n as u64);
        }
    }
    output.flush().await.map_err(|e| Error::io(target, e))?;
    drop(output);

    for chunk in job.chunks() {
        remove_if_exists(chunk.temp_path()).await?;
    }
    match fs::remove_dir(job.cache_dir()).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io(job.cache_dir(), e)),
    }

    debug!(target = %target.display(), bytes = job.assembled_bytes(), "assembled chunks");
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_chunks(job: &DownloadJob, data: &[u8]) {
        std::fs::create_dir_all(job.cache_dir()).unwrap();
        for _ in 0..job.chunk_count() {
            job.claim_next();
        }
        for chunk in job.chunks() {
            let range = chunk.range();
            std::fs::write(chunk.temp_path(), &data[range.start as usize..=range.end as usize]).unwrap();
            chunk.reset(range.len());
        }
    }

    #[tokio::test]
    async fn test_concatenates_in_order_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(1_000).collect();
        let job = DownloadJob::new("mem://a", 1_000, 300, true, &dir.path().join("cache")).unwrap();
        write_chunks(&job, &data);
        let target = dir.path().join("out").join("a.bin");

        assemble(&job, &target, &CancellationToken::new()).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), data);
        assert_eq!(job.assembled_bytes(), 1_000);
        assert!(job.chunks().iter().all(|c| !c.temp_path().exists()));
        assert!(!job.cache_dir().exists());
    }

    #[tokio::test]
    async fn test_accounting_mismatch_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let data = vec![1u8; 100];
        let job = DownloadJob::new("mem://a", 100, 30, true, dir.path()).unwrap();
        write_chunks(&job, &data);
        job.chunks()[1].reset(29);
        let target = dir.path().join("a.bin");

        let err = assemble(&job, &target, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::IncompleteDownload { expected: 100, received: 99 }));
        assert!(!target.exists());
        assert!(job.chunks()[0].temp_path().exists());
    }

    #[tokio::test]
    async fn test_empty_job_writes_empty_target() {
        let dir = TempDir::new().unwrap();
        let job = DownloadJob::new("mem://empty", 0, 30, true, dir.path()).unwrap();
        let target = dir.path().join("empty.bin");

        assemble(&job, &target, &CancellationToken::new()).await.unwrap();
        assert_eq!(std::fs::metadata(&target).unwrap().len(), 0);
    }
}
