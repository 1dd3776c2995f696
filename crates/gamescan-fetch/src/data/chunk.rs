use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// A contiguous byte range of the remote resource.
///
/// `end` is inclusive, matching the `Range: bytes=<start>-<end>` header form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRange {
    /// Position of the range in the plan (0-based)
    pub index: usize,
    /// First byte offset
    pub start: u64,
    /// Last byte offset (inclusive)
    pub end:   u64,
}

impl ChunkRange {
    /// Number of bytes covered by the range.
    #[must_use]
    pub fn len(&self) -> u64 { self.end - self.start + 1 }

    /// Ranges always cover at least one byte.
    #[must_use]
    pub fn is_empty(&self) -> bool { false }

    /// `Range` header value for the remainder of this range after `offset` bytes.
    #[must_use]
    pub fn header_from(&self, offset: u64) -> String { format!("bytes={}-{}", self.start + offset, self.end) }
}

/// Download progress of one chunk.
///
/// The counter is only advanced by the worker that currently owns the chunk;
/// everything else reads it.
#[derive(Debug)]
pub struct ChunkState {
    range:         ChunkRange,
    bytes_written: AtomicU64,
    temp_path:     PathBuf,
}

impl ChunkState {
    pub fn new(range: ChunkRange, temp_path: PathBuf) -> Self {
        Self {
            range,
            bytes_written: AtomicU64::new(0),
            temp_path,
        }
    }

    pub fn range(&self) -> &ChunkRange { &self.range }

    pub fn temp_path(&self) -> &Path { &self.temp_path }

    /// Bytes known to be on disk for this chunk.
    pub fn bytes_written(&self) -> u64 { self.bytes_written.load(Ordering::Acquire) }

    /// Whether every byte of the range is on disk.
    pub fn is_complete(&self) -> bool { self.bytes_written() >= self.range.len() }

    pub(crate) fn reset(&self, on_disk: u64) { self.bytes_written.store(on_disk, Ordering::Release); }

    pub(crate) fn advance(&self, written: u64) { self.bytes_written.fetch_add(written, Ordering::AcqRel); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_len_is_inclusive() {
        let range = ChunkRange { index: 0, start: 10, end: 19 };
        assert_eq!(range.len(), 10);
        assert_eq!(range.header_from(0), "bytes=10-19");
        assert_eq!(range.header_from(4), "bytes=14-19");
    }

    #[test]
    fn test_chunk_state_counter() {
        let state = ChunkState::new(ChunkRange { index: 0, start: 0, end: 99 }, PathBuf::from("c.tmp"));
        assert_eq!(state.bytes_written(), 0);
        state.reset(40);
        state.advance(60);
        assert_eq!(state.bytes_written(), 100);
        assert!(state.is_complete());
    }
}
