//! Scan-and-repair for game installs.
//!
//! A [`GameScanner`] loads a manifest ([`GameFilesInfo`]) describing every
//! file of an install by size and CRC-32, then either scans the install or
//! repairs it. Repair runs file by file: a file that fails its full check is
//! downloaded to a temp folder, verified, extracted through a [`Codec`] when
//! compressed, verified again and moved into place.
//!
//! [`Codec`]: gamescan_archive::Codec

mod config;
mod error;
mod manifest;
mod observer;
mod pipeline;
mod progress;
mod scanner;

pub use config::ScannerConfig;
pub use error::{Error, ErrorKind, Result};
pub use manifest::{GameFileInfo, GameFilesInfo, GameVersion};
pub use observer::{NoopObserver, RepairObserver};
pub use pipeline::{RepairOutcome, TempPaths};
pub use progress::{RepairProgress, RepairStep, ScanProgress};
pub use scanner::{GameScanner, RepairSummary, ScanMode};
