use std::io;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::http::HttpClient;
use crate::error::{Error, Result};
use crate::job::DownloadJob;

async fn on_disk_len(path: &Path) -> Result<u64> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Downloads chunk `index` of `job` into its temp file, resuming from the
/// bytes already on disk.
///
/// The chunk counter is set to the resumed length first and then advanced
/// only after each buffer has been written and flushed, so it never runs
/// ahead of the file. Without range support a partial file cannot be
/// resumed and is restarted from zero.
///
/// # Errors
///
/// [`Error::Cancelled`] when `cancel` fires between reads, [`Error::Transport`]
/// when the request fails or the body is shorter or longer than the range,
/// [`Error::Io`] on file failures. The response stream is dropped before
/// any error is returned.
pub async fn download_chunk<C: HttpClient>(
    client: &C,
    job: &DownloadJob,
    index: usize,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let chunk = job
        .chunks()
        .get(index)
        .ok_or_else(|| Error::InvalidArgument(format!("chunk {index} out of range")))?;
    let range = *chunk.range();
    let path = chunk.temp_path().to_path_buf();
    let len = range.len();

    fs::create_dir_all(job.cache_dir()).await.map_err(|e| Error::io(job.cache_dir(), e))?;

    let mut resumed = on_disk_len(&path).await?;
    if resumed > len {
        let file = OpenOptions::new().write(true).open(&path).await.map_err(|e| Error::io(&path, e))?;
        file.set_len(len).await.map_err(|e| Error::io(&path, e))?;
        resumed = len;
    } else if resumed < len && !job.range_support() {
        resumed = 0;
    }
    chunk.reset(resumed);

    if resumed >= len {
        debug!(index, len, "chunk already on disk");
        return Ok(path);
    }

    let mut file = if resumed == 0 {
        File::create(&path).await
    } else {
        OpenOptions::new().append(true).open(&path).await
    }
    .map_err(|e| Error::io(&path, e))?;

    let headers = if job.range_support() {
        vec![("Range".to_string(), range.header_from(resumed))]
    } else {
        Vec::new()
    };
    debug!(index, start = range.start, end = range.end, resumed, "requesting chunk");

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        opened = client.stream(job.url(), &headers) => opened.map_err(Error::transport)?,
    };

    let remaining = len - resumed;
    let mut received = 0u64;
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
        let n = bytes.len() as u64;
        if received + n > remaining {
            return Err(Error::Transport(format!(
                "chunk {index} received more than the {remaining} bytes requested"
            )));
        }

        file.write_all(&bytes).await.map_err(|e| Error::io(&path, e))?;
        file.flush().await.map_err(|e| Error::io(&path, e))?;
        chunk.advance(n);
        received += n;
    }
    drop(stream);

    if received < remaining {
        return Err(Error::Transport(format!(
            "chunk {index} body ended after {received} of {remaining} bytes"
        )));
    }
    debug!(index, bytes = received, "chunk complete");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::effects::MemoryClient;

    const URL: &str = "mem://chunked.bin";

    fn payload(len: usize) -> Vec<u8> { (0..len).map(|i| (i * 7 % 251) as u8).collect() }

    #[tokio::test]
    async fn test_downloads_range_into_temp_file() {
        let dir = TempDir::new().unwrap();
        let data = payload(250);
        let client = MemoryClient::new().with_blob(URL, data.clone()).piece_size(16);
        let job = DownloadJob::new(URL, 250, 100, true, dir.path()).unwrap();

        let path = download_chunk(&client, &job, 1, &CancellationToken::new()).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), &data[100..200]);
        assert_eq!(job.chunks()[1].bytes_written(), 100);
        assert_eq!(client.requests()[0].range.as_deref(), Some("bytes=100-199"));
    }

    #[tokio::test]
    async fn test_resume_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let data = payload(300);
        let client = MemoryClient::new().with_blob(URL, data.clone()).piece_size(7);
        let job = DownloadJob::new(URL, 300, 100, true, dir.path()).unwrap();
        let cancel = CancellationToken::new();

        let path = download_chunk(&client, &job, 2, &cancel).await.unwrap();
        let fresh = std::fs::read(&path).unwrap();

        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(37).unwrap();
        drop(file);

        download_chunk(&client, &job, 2, &cancel).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), fresh);
        assert_eq!(client.requests().last().unwrap().range.as_deref(), Some("bytes=237-299"));
    }

    #[tokio::test]
    async fn test_complete_chunk_makes_no_request() {
        let dir = TempDir::new().unwrap();
        let data = payload(50);
        let client = MemoryClient::new().with_blob(URL, data);
        let job = DownloadJob::new(URL, 50, 100, true, dir.path()).unwrap();
        let cancel = CancellationToken::new();

        download_chunk(&client, &job, 0, &cancel).await.unwrap();
        download_chunk(&client, &job, 0, &cancel).await.unwrap();
        assert_eq!(client.requests().len(), 1);
        assert_eq!(job.chunks()[0].bytes_written(), 50);
    }

    #[tokio::test]
    async fn test_overlong_chunk_file_is_truncated() {
        let dir = TempDir::new().unwrap();
        let data = payload(40);
        let client = MemoryClient::new().with_blob(URL, data.clone());
        let job = DownloadJob::new(URL, 40, 20, true, dir.path()).unwrap();
        let path = job.chunks()[0].temp_path().to_path_buf();
        std::fs::create_dir_all(job.cache_dir()).unwrap();
        std::fs::write(&path, [&data[..20], b"garbage"].concat()).unwrap();

        download_chunk(&client, &job, 0, &CancellationToken::new()).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), &data[..20]);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_short_body_is_transport_error() {
        let dir = TempDir::new().unwrap();
        let client = MemoryClient::new().with_blob(URL, payload(64));
        client.truncate_bodies(true);
        let job = DownloadJob::new(URL, 64, 64, true, dir.path()).unwrap();

        let err = download_chunk(&client, &job, 0, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(job.chunks()[0].bytes_written(), 63);
    }

    #[tokio::test]
    async fn test_without_range_support_restarts_partial_file() {
        let dir = TempDir::new().unwrap();
        let data = payload(90);
        let client = MemoryClient::new().with_blob(URL, data.clone()).without_range_support();
        let job = DownloadJob::new(URL, 90, 10, false, dir.path()).unwrap();
        let path = job.chunks()[0].temp_path().to_path_buf();
        std::fs::create_dir_all(job.cache_dir()).unwrap();
        std::fs::write(&path, &data[..30]).unwrap();

        download_chunk(&client, &job, 0, &CancellationToken::new()).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), data);
        assert_eq!(client.requests()[0].range, None);
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let dir = TempDir::new().unwrap();
        let client = MemoryClient::new().with_blob(URL, payload(10));
        let job = DownloadJob::new(URL, 10, 10, true, dir.path()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = download_chunk(&client, &job, 0, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(client.requests().is_empty());
    }
}
