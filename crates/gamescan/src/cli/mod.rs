mod app;
mod commands;

pub use app::{App, Commands, FetchArg, ScanArg};
pub use commands::{fetch, repair, scan};
