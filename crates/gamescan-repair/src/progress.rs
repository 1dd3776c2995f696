//! Progress reported by scans and repair runs.

use gamescan_fetch::{DownloadProgress, EngineState};

/// Steps of a single-file repair, in order.
///
/// Each step owns a band of the file's overall 0-100 range, starting at
/// [`base`](RepairStep::base).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RepairStep {
    Check,
    Download,
    CheckDownload,
    Extract,
    CheckExtract,
    Finalize,
    End,
}

/// Share of the download step spent receiving bytes; the rest is assembly.
const RECEIVE_SHARE: f64 = 40.0 / 45.0;

impl RepairStep {
    pub fn base(self) -> f64 {
        match self {
            RepairStep::Check => 0.0,
            RepairStep::Download => 10.0,
            RepairStep::CheckDownload => 55.0,
            RepairStep::Extract => 65.0,
            RepairStep::CheckExtract => 85.0,
            RepairStep::Finalize => 95.0,
            RepairStep::End => 100.0,
        }
    }

    fn next(self) -> Option<RepairStep> {
        match self {
            RepairStep::Check => Some(RepairStep::Download),
            RepairStep::Download => Some(RepairStep::CheckDownload),
            RepairStep::CheckDownload => Some(RepairStep::Extract),
            RepairStep::Extract => Some(RepairStep::CheckExtract),
            RepairStep::CheckExtract => Some(RepairStep::Finalize),
            RepairStep::Finalize => Some(RepairStep::End),
            RepairStep::End => None,
        }
    }

    /// Maps a step-local percentage onto the file's overall range.
    pub fn overall(self, percent: f64) -> f64 {
        let width = self.next().map_or(0.0, |next| next.base() - self.base());
        self.base() + width * percent.clamp(0.0, 100.0) / 100.0
    }
}

impl std::fmt::Display for RepairStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RepairStep::Check => "checking",
            RepairStep::Download => "downloading",
            RepairStep::CheckDownload => "checking download",
            RepairStep::Extract => "extracting",
            RepairStep::CheckExtract => "checking extracted file",
            RepairStep::Finalize => "finalizing",
            RepairStep::End => "done",
        };
        f.write_str(label)
    }
}

/// Per-file progress of a repair run.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairProgress {
    pub step:     RepairStep,
    /// Progress within `step`, 0-100.
    pub percent:  f64,
    /// Transfer figures while `step` is [`RepairStep::Download`].
    pub download: Option<DownloadProgress>,
}

impl RepairProgress {
    pub fn new(step: RepairStep, percent: f64) -> Self {
        Self {
            step,
            percent,
            download: None,
        }
    }

    /// Progress of the download step for an engine snapshot. Receiving
    /// bytes fills the step up to its last few points; assembling the
    /// chunks fills the rest.
    pub fn download(progress: &DownloadProgress) -> Self {
        let percent = match progress.state {
            EngineState::Append => RECEIVE_SHARE * 100.0 + (1.0 - RECEIVE_SHARE) * progress.append_percent,
            EngineState::Complete => 100.0,
            _ => RECEIVE_SHARE * progress.percent,
        };
        Self {
            step:     RepairStep::Download,
            percent,
            download: Some(progress.clone()),
        }
    }

    /// Position within the file's overall 0-100 range.
    pub fn overall(&self) -> f64 { self.step.overall(self.percent) }
}

/// Whole-run progress of a scan or repair.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    /// File being processed, empty before the first and after the last.
    pub file_name: String,
    pub percent:   f64,
    pub index:     usize,
    pub total:     usize,
}

impl ScanProgress {
    pub fn new(file_name: impl Into<String>, percent: f64, index: usize, total: usize) -> Self {
        Self {
            file_name: file_name.into(),
            percent,
            index,
            total,
        }
    }
}

/// `done` out of `total` weight as a percentage, falling back to the file
/// count when every weight is zero.
pub(crate) fn weighted_percent(done: u64, total: u64, index: usize, count: usize) -> f64 {
    if total > 0 {
        (done as f64 / total as f64 * 100.0).min(100.0)
    } else if count > 0 {
        index as f64 / count as f64 * 100.0
    } else {
        100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_are_ordered_and_cover_range() {
        assert_eq!(RepairStep::Check.overall(0.0), 0.0);
        assert_eq!(RepairStep::Check.overall(100.0), 10.0);
        assert_eq!(RepairStep::Download.overall(100.0), 55.0);
        assert_eq!(RepairStep::Finalize.overall(100.0), 100.0);
        assert_eq!(RepairStep::End.overall(0.0), 100.0);
        assert_eq!(RepairStep::Extract.overall(250.0), 85.0);
    }

    #[test]
    fn test_download_reserves_tail_for_assembly() {
        let receiving = RepairProgress::download(&DownloadProgress::new(EngineState::Download, 100, 100, 0.0));
        assert!((receiving.overall() - 50.0).abs() < 1e-9);

        let appending = RepairProgress::download(&DownloadProgress::new(EngineState::Append, 100, 100, 0.0));
        assert!((appending.overall() - receiving.overall()).abs() < 1e-9);

        let half_assembled =
            RepairProgress::download(&DownloadProgress::new(EngineState::Append, 100, 100, 0.0).with_assembled(50));
        assert!(half_assembled.overall() > 50.0 && half_assembled.overall() < 55.0);
        assert_eq!(half_assembled.download.as_ref().unwrap().bytes_completed, 100);

        let done = RepairProgress::download(&DownloadProgress::new(EngineState::Complete, 100, 100, 0.0));
        assert_eq!(done.overall(), 55.0);
        assert_eq!(done.download.unwrap().bytes_completed, 100);
    }

    #[test]
    fn test_weighted_percent() {
        assert_eq!(weighted_percent(25, 100, 1, 4), 25.0);
        assert_eq!(weighted_percent(0, 0, 1, 4), 25.0);
        assert_eq!(weighted_percent(0, 0, 0, 0), 100.0);
    }
}
