use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use gamescan_fetch::HttpClient;
use gamescan_repair::{GameFilesInfo, ScannerConfig};
use serde::Deserialize;
use tracing::debug;

use crate::cli::App;

/// Contents of the optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Log filter used when neither `RUST_LOG` nor `-v` is given.
    pub log:       Option<String>,
    pub manifests: Vec<String>,
    pub scanner:   ScannerConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Settings for one invocation: the config file with command-line
/// overrides applied.
#[derive(Debug, Clone)]
pub struct GameEnv {
    pub scanner:   ScannerConfig,
    pub manifests: Vec<String>,
    log:           Option<String>,
    verbose:       u8,
}

impl GameEnv {
    pub fn new(app: &App) -> Result<Self> {
        let file = match &app.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(file, app))
    }

    fn merge(file: FileConfig, app: &App) -> Self {
        let mut scanner = file.scanner;
        if let Some(root) = &app.root {
            scanner.files_root = root.clone();
        }
        let manifests = if app.manifests.is_empty() { file.manifests } else { app.manifests.clone() };
        Self {
            scanner,
            manifests,
            log: file.log,
            verbose: app.verbose,
        }
    }

    /// Log filter directive and whether it overrides `RUST_LOG`.
    pub fn log_filter(&self) -> (String, bool) {
        match self.verbose {
            0 => (self.log.clone().unwrap_or_else(|| "info".into()), false),
            1 => ("debug".into(), true),
            _ => ("trace".into(), true),
        }
    }

    pub fn files_root(&self) -> &Path { &self.scanner.files_root }

    /// Loads every manifest in order and layers them.
    pub async fn load_manifest<C: HttpClient>(&self, client: &C) -> Result<GameFilesInfo> {
        let Some((first, rest)) = self.manifests.split_first() else {
            bail!("No manifest given; pass --manifest or set `manifests` in the config file");
        };
        let mut info = load_one(client, first).await?;
        for source in rest {
            info.merge(load_one(client, source).await?);
        }
        debug!(version = %info.version(), files = info.len(), "manifests merged");
        Ok(info)
    }
}

fn is_url(source: &str) -> bool { source.starts_with("http://") || source.starts_with("https://") }

async fn load_one<C: HttpClient>(client: &C, source: &str) -> Result<GameFilesInfo> {
    let info = if is_url(source) {
        GameFilesInfo::fetch(client, source).await
    } else {
        GameFilesInfo::load(PathBuf::from(source)).await
    };
    info.with_context(|| format!("Failed to load manifest {source}"))
}
