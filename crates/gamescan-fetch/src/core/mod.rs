//! Planning, naming and progress arithmetic that perform no network I/O.

mod aggregate;
mod naming;
mod plan;
mod retry;
mod validation;

pub use aggregate::ProgressAggregator;
pub use naming::{cache_dir_name, chunk_file_name, short_hash};
pub use plan::{chunk_count, plan_chunks};
pub use retry::retry_delay;
pub use validation::{is_redirect, supports_ranges};
