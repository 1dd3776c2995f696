//! Observer trait for scan and repair lifecycle events.
//!
//! Observers let a front-end follow a run (progress bars, logs) without the
//! orchestrator knowing how progress is displayed.

use crate::manifest::GameFileInfo;
use crate::progress::{RepairProgress, ScanProgress};

/// Receives scan and repair events. Every method defaults to a no-op.
///
/// Methods are called from the task running the scan, from the download
/// ticker task, and from blocking checksum threads, so they must be cheap
/// and must not block.
pub trait RepairObserver: Send + Sync {
    /// Whole-run progress, once per file and once at the end.
    fn on_scan_progress(&self, _progress: &ScanProgress) {}

    /// Progress of the file currently being repaired.
    fn on_repair_progress(&self, _progress: &RepairProgress) {}

    /// Called after `file` has been moved into the install.
    fn on_file_repaired(&self, _file: &GameFileInfo) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RepairObserver for NoopObserver {}
