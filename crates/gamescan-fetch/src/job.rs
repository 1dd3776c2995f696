use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::debug;

use crate::core::{cache_dir_name, chunk_file_name, plan_chunks, supports_ranges};
use crate::data::{ChunkState, EngineOptions};
use crate::effects::HttpClient;
use crate::error::{Error, Result};

/// One file download split into chunks.
///
/// The job owns every [`ChunkState`]. Workers claim chunks through a single
/// atomic counter, so each chunk has exactly one owner per run.
#[derive(Debug)]
pub struct DownloadJob {
    url:           String,
    total_size:    u64,
    chunk_size:    u64,
    range_support: bool,
    chunks:        Vec<ChunkState>,
    cache_dir:     PathBuf,
    next_chunk:    AtomicUsize,
    assembled:     AtomicU64,
}

impl DownloadJob {
    /// Plans a job for `url`.
    ///
    /// The cache directory under `cache_root` is derived from the URL, the
    /// chunk size and the total size, so a later run of the same download
    /// finds the chunk files of an earlier one.
    pub fn new(
        url: impl Into<String>,
        total_size: u64,
        chunk_size_limit: u64,
        range_support: bool,
        cache_root: &Path,
    ) -> Result<Self> {
        let url = url.into();
        let ranges = plan_chunks(total_size, chunk_size_limit, range_support)?;
        let chunk_size = match ranges.len() {
            0 | 1 => total_size,
            _ => chunk_size_limit,
        };
        let cache_dir = cache_root.join(cache_dir_name(&url, chunk_size, total_size));
        let chunks = ranges
            .into_iter()
            .map(|range| {
                let temp_path = cache_dir.join(chunk_file_name(&url, range.start));
                ChunkState::new(range, temp_path)
            })
            .collect();

        Ok(Self {
            url,
            total_size,
            chunk_size,
            range_support,
            chunks,
            cache_dir,
            next_chunk: AtomicUsize::new(0),
            assembled: AtomicU64::new(0),
        })
    }

    /// Asks the server for the size and range support of `url`, then plans the job.
    ///
    /// The size comes from `HEAD`, then from the probe's `Content-Range`,
    /// falling back to `expected_size` when the server reports neither.
    pub async fn discover<C: HttpClient>(
        client: &C,
        url: &str,
        expected_size: Option<u64>,
        options: &EngineOptions,
    ) -> Result<Self> {
        let head_size = client.head(url).await.map_err(Error::transport)?;
        let probe = client.probe(url, options.chunk_size_limit.saturating_sub(1)).await.map_err(Error::transport)?;
        if !(200..300).contains(&probe.status) {
            return Err(Error::Transport(format!("probe of {url} returned status {}", probe.status)));
        }

        let range_support = supports_ranges(probe.status, probe.accept_ranges.as_deref());
        let total_size = head_size
            .or(probe.total_size)
            .or(if range_support { None } else { probe.content_length })
            .or(expected_size)
            .ok_or_else(|| Error::InvalidArgument(format!("size of {url} is unknown")))?;

        debug!(url, total_size, range_support, "discovered remote resource");
        Self::new(url, total_size, options.chunk_size_limit, range_support, &options.cache_root)
    }

    pub fn url(&self) -> &str { &self.url }

    pub fn total_size(&self) -> u64 { self.total_size }

    /// Size of every chunk but the last.
    pub fn chunk_size(&self) -> u64 { self.chunk_size }

    pub fn chunk_count(&self) -> usize { self.chunks.len() }

    pub fn range_support(&self) -> bool { self.range_support }

    pub fn chunks(&self) -> &[ChunkState] { &self.chunks }

    pub fn cache_dir(&self) -> &Path { &self.cache_dir }

    /// Claims the next unclaimed chunk index.
    pub fn claim_next(&self) -> Option<usize> {
        let index = self.next_chunk.fetch_add(1, Ordering::AcqRel);
        (index < self.chunks.len()).then_some(index)
    }

    /// Number of chunks claimed so far in this run.
    pub fn claimed(&self) -> usize { self.next_chunk.load(Ordering::Acquire).min(self.chunks.len()) }

    /// Sum of every chunk counter.
    pub fn bytes_written(&self) -> u64 { self.chunks.iter().map(ChunkState::bytes_written).sum() }

    /// Bytes copied into the target so far.
    pub fn assembled_bytes(&self) -> u64 { self.assembled.load(Ordering::Acquire) }

    pub(crate) fn add_assembled(&self, bytes: u64) { self.assembled.fetch_add(bytes, Ordering::AcqRel); }

    /// Prepares the job for another run, keeping the chunk files on disk.
    pub(crate) fn rewind(&self) {
        self.next_chunk.store(0, Ordering::Release);
        self.assembled.store(0, Ordering::Release);
        for chunk in &self.chunks {
            chunk.reset(0);
        }
    }
}
