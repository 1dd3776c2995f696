use std::time::Instant;

use crate::data::{DownloadProgress, EngineState};
use crate::job::DownloadJob;

/// Computes aggregate progress for one job run from the per-chunk counters.
///
/// Chunks before `window_start` are known complete and are counted by size
/// without touching their counters. Each tick advances the window past newly
/// completed chunks and sums the counters from there up to the claim
/// frontier; chunks past the frontier have not been started and hold zero.
/// Steady-state cost is therefore proportional to the number of active
/// chunks, not to the chunk count.
#[derive(Debug)]
pub struct ProgressAggregator {
    window_start: usize,
    window_bytes: u64,
    last_bytes:   u64,
    last_tick:    Instant,
}

impl Default for ProgressAggregator {
    fn default() -> Self { Self::new() }
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self {
            window_start: 0,
            window_bytes: 0,
            last_bytes:   0,
            last_tick:    Instant::now(),
        }
    }

    /// Index of the first chunk not yet known to be complete.
    pub fn window_start(&self) -> usize { self.window_start }

    /// Sums the bytes on disk for `job`.
    pub fn bytes_completed(&mut self, job: &DownloadJob) -> u64 {
        let chunks = job.chunks();
        let frontier = job.claimed();

        while self.window_start < frontier {
            let chunk = &chunks[self.window_start];
            if !chunk.is_complete() {
                break;
            }
            self.window_bytes += chunk.range().len();
            self.window_start += 1;
        }

        let active: u64 = chunks[self.window_start..frontier].iter().map(|c| c.bytes_written()).sum();
        self.window_bytes + active
    }

    /// Takes a snapshot, measuring throughput against the previous one.
    /// Assembly is reported alongside the downloaded bytes, never in place
    /// of them.
    pub fn tick(&mut self, job: &DownloadJob, state: EngineState) -> DownloadProgress {
        let bytes = self.bytes_completed(job);
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick).as_secs_f64();
        let delta = bytes.saturating_sub(self.last_bytes);
        let speed = if elapsed > 0.0 { delta as f64 / elapsed } else { 0.0 };

        self.last_bytes = bytes;
        self.last_tick = now;
        DownloadProgress::new(state, bytes, job.total_size(), speed).with_assembled(job.assembled_bytes())
    }

    /// Forgets the window and throughput baseline, for a new run over the same job.
    pub fn reset(&mut self) { *self = Self::new(); }
}
