mod tracker;

pub use tracker::{DownloadTracker, RunTracker};
