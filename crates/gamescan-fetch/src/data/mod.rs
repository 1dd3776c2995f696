//! Plain data types shared by the planner, workers and engine.

pub mod chunk;
pub mod options;
pub mod progress;

pub use chunk::{ChunkRange, ChunkState};
pub use options::{
    DEFAULT_CHUNK_SIZE_LIMIT, DEFAULT_MAX_WORKERS, EngineOptions, ProgressCallback, SchedulerOptions,
};
pub use progress::{DownloadProgress, EngineState};
