//! Network and file I/O: the HTTP seam, chunk workers, the worker pool,
//! assembly and the downloaders built on them.

mod assemble;
mod engine;
mod http;
mod memory;
mod scheduler;
mod single;
mod status;
mod worker;

pub use assemble::assemble;
pub use engine::{DownloadEngine, FileDownloader};
pub use http::{BoxStream, HttpClient, Probe, parse_content_range_total, parse_range_header};
#[cfg(feature = "reqwest")]
pub use http::{HttpError, ReqwestClient};
pub use memory::{MemoryClient, MemoryError, RecordedRequest};
pub use scheduler::run as run_scheduler;
pub use single::SingleStreamDownloader;
pub use status::Status;
pub use worker::download_chunk;
