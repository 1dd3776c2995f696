//! Resumable parallel chunked HTTP downloads.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - chunk ranges, options and progress types
//! - [`core`](crate::core) - planning, naming and progress aggregation, free of network I/O
//! - [`effects`] - HTTP seam, chunk workers, worker pool and downloaders
//!
//! # Key Features
//!
//! - **Resumable**: chunk files live in a cache directory derived from the
//!   download itself, so an aborted run picks up where it stopped
//! - **Bounded parallelism**: a fixed pool of workers drains the chunk queue
//! - **Cooperative cancellation**: abort joins every worker before returning
//! - **Windowed progress**: snapshot cost follows the number of active chunks

pub mod core;
pub mod data;
pub mod effects;
mod error;
mod job;

pub use crate::core::{ProgressAggregator, is_redirect, plan_chunks, retry_delay, supports_ranges};
pub use data::{
    ChunkRange, ChunkState, DEFAULT_CHUNK_SIZE_LIMIT, DEFAULT_MAX_WORKERS, DownloadProgress, EngineOptions,
    EngineState, ProgressCallback, SchedulerOptions,
};
pub use effects::{
    BoxStream, DownloadEngine, FileDownloader, HttpClient, MemoryClient, MemoryError, Probe, SingleStreamDownloader,
    Status, assemble, download_chunk, run_scheduler,
};
#[cfg(feature = "reqwest")]
pub use effects::{HttpError, ReqwestClient};
pub use error::{Error, Result};
pub use job::DownloadJob;
