use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Clone, Debug, Parser)]
#[command(name = "gamescan", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// TOML configuration file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Root of the game install. Overrides the config file.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Manifest file or URL. Repeatable; later manifests override earlier ones.
    #[arg(long = "manifest", short, global = true, value_name = "PATH|URL")]
    pub manifests: Vec<String>,

    /// More log output (-v debug, -vv trace).
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "s", name = "scan", about = "Check the install against the manifest")]
    Scan(ScanArg),
    #[command(alias = "r", name = "repair", about = "Download and replace every file that fails its check")]
    Repair,
    #[command(alias = "f", name = "fetch", about = "Download a single URL with the chunked engine")]
    Fetch(FetchArg),
}

#[derive(Args, Clone, Debug)]
pub struct ScanArg {
    /// Compare checksums, not only sizes.
    #[arg(long)]
    pub full: bool,
}

#[derive(Args, Clone, Debug)]
pub struct FetchArg {
    pub url: String,

    pub out: PathBuf,

    /// Maximum chunk size in bytes.
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Parallel chunk workers.
    #[arg(long, short = 'j')]
    pub workers: Option<usize>,
}
