use std::fmt;

/// Lifecycle state of a downloader.
///
/// Construction moves `Invalid → Create → Idle`; a run moves
/// `Idle → Start → Download → Append → Complete`. Cancellation passes
/// through `Abort` back to `Idle`, failures pass through `Abort` to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineState {
    #[default]
    Invalid,
    Create,
    Idle,
    Start,
    Download,
    Append,
    Complete,
    Error,
    Abort,
}

impl EngineState {
    /// States in which a run is in flight.
    pub fn is_active(self) -> bool { matches!(self, Self::Start | Self::Download | Self::Append | Self::Abort) }

    /// States from which `start` may launch a run.
    pub fn can_start(self) -> bool { matches!(self, Self::Idle | Self::Error) }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invalid => "Invalid",
            Self::Create => "Create",
            Self::Idle => "Idle",
            Self::Start => "Start",
            Self::Download => "Download",
            Self::Append => "Append",
            Self::Complete => "Complete",
            Self::Error => "Error",
            Self::Abort => "Abort",
        };
        f.write_str(name)
    }
}

/// Aggregated progress of one download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub state:           EngineState,
    /// Bytes on disk across all chunks.
    pub bytes_completed: u64,
    pub total_bytes:     u64,
    /// Throughput since the previous snapshot, never negative.
    pub speed_bps:       f64,
    /// Download completion in the range `0.0..=100.0`.
    pub percent:         f64,
    /// Bytes copied into the target so far while appending.
    pub assembled_bytes: u64,
    pub append_percent:  f64,
}

impl DownloadProgress {
    pub fn new(state: EngineState, bytes_completed: u64, total_bytes: u64, speed_bps: f64) -> Self {
        Self {
            state,
            bytes_completed,
            total_bytes,
            speed_bps,
            percent: percent_of(bytes_completed, total_bytes),
            assembled_bytes: 0,
            append_percent: 0.0,
        }
    }

    pub fn with_assembled(mut self, assembled_bytes: u64) -> Self {
        self.assembled_bytes = assembled_bytes;
        self.append_percent = if assembled_bytes == 0 { 0.0 } else { percent_of(assembled_bytes, self.total_bytes) };
        self
    }

    /// Whether every expected byte has been accounted for.
    pub fn is_finished(&self) -> bool { self.bytes_completed >= self.total_bytes }
}

impl Default for DownloadProgress {
    fn default() -> Self { Self::new(EngineState::Invalid, 0, 0, 0.0) }
}

/// Percentage of `done` over `total`, where an empty total counts as done.
pub(crate) fn percent_of(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}
