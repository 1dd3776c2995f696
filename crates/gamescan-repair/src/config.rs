//! Scanner configuration.

use std::path::PathBuf;
use std::time::Duration;

use gamescan_fetch::{DEFAULT_CHUNK_SIZE_LIMIT, DEFAULT_MAX_WORKERS, EngineOptions};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where the install lives, where repairs stage their artifacts, and how
/// downloads are shaped.
///
/// Every field has a default, so a config file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Root of the install; manifest paths are relative to it.
    pub files_root:             PathBuf,
    /// Per-file download and extraction artifacts. Emptied around every repair run.
    pub temp_root:              PathBuf,
    /// Chunk files of interrupted downloads, kept across runs for resume.
    pub cache_root:             PathBuf,
    /// Artifacts at least this large use the chunked engine.
    pub chunked_threshold:      u64,
    pub chunk_size_limit:       u64,
    pub max_workers:            usize,
    /// Per-chunk retries of transport failures. `0` fails the download on the first one.
    pub chunk_retries:          u32,
    pub quick_scan_parallelism: usize,
    pub tick_interval_ms:       u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        let scratch = std::env::temp_dir().join("gamescan");
        Self {
            files_root:             PathBuf::from("."),
            temp_root:              scratch.join("Temp"),
            cache_root:             scratch.join("Cache"),
            chunked_threshold:      DEFAULT_CHUNK_SIZE_LIMIT,
            chunk_size_limit:       DEFAULT_CHUNK_SIZE_LIMIT,
            max_workers:            DEFAULT_MAX_WORKERS,
            chunk_retries:          0,
            quick_scan_parallelism: 16,
            tick_interval_ms:       500,
        }
    }
}

impl ScannerConfig {
    pub fn new(files_root: impl Into<PathBuf>) -> Self {
        Self {
            files_root: files_root.into(),
            ..Self::default()
        }
    }

    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    pub fn cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    pub fn chunked_threshold(mut self, threshold: u64) -> Self {
        self.chunked_threshold = threshold;
        self
    }

    pub fn chunk_size_limit(mut self, limit: u64) -> Self {
        self.chunk_size_limit = limit;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.files_root.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("game files path is empty".into()));
        }
        if self.temp_root.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("temp path is empty".into()));
        }
        if self.chunk_size_limit == 0 {
            return Err(Error::InvalidArgument("chunk_size_limit must be positive".into()));
        }
        Ok(())
    }

    /// Engine options for one download, without a progress callback.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::default()
            .chunk_size_limit(self.chunk_size_limit)
            .cache_root(&self.cache_root)
            .max_workers(self.max_workers)
            .chunk_retries(self.chunk_retries)
            .tick_interval(Duration::from_millis(self.tick_interval_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ScannerConfig =
            serde_json::from_str(r#"{ "files_root": "/games/aoeo", "max_workers": 4 }"#).unwrap();
        assert_eq!(config.files_root, PathBuf::from("/games/aoeo"));
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.chunk_retries, 0);
        assert_eq!(config.chunk_size_limit, DEFAULT_CHUNK_SIZE_LIMIT);
        assert!(config.temp_root.ends_with("Temp"));
    }

    #[test]
    fn test_validate() {
        assert!(ScannerConfig::new("/games").validate().is_ok());
        assert!(matches!(ScannerConfig::new("").validate(), Err(Error::InvalidArgument(_))));
        assert!(ScannerConfig::new("/games").chunk_size_limit(0).validate().is_err());
    }

    #[test]
    fn test_engine_options_follow_config() {
        let options = ScannerConfig::new("/games").chunk_size_limit(4096).max_workers(3).engine_options();
        assert_eq!(options.chunk_size_limit, 4096);
        assert_eq!(options.scheduler.max_workers, 3);
        assert_eq!(options.tick_interval, Duration::from_millis(500));
    }
}
