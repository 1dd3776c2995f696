use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use gamescan_archive::GzipCodec;
use gamescan_fetch::{DownloadEngine, FileDownloader, ReqwestClient};
use gamescan_repair::{GameScanner, ScanMode};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{FetchArg, ScanArg};
use crate::env::GameEnv;
use crate::ui::{DownloadTracker, RunTracker};

type Scanner = GameScanner<ReqwestClient, GzipCodec>;

const INTERRUPTED: u8 = 130;

async fn prepare(env: &GameEnv, with_file_bar: bool) -> Result<(Arc<Scanner>, RunTracker)> {
    let client = Arc::new(ReqwestClient::new());
    let manifest = env.load_manifest(client.as_ref()).await?;

    let tracker = RunTracker::new(with_file_bar);
    let scanner = GameScanner::new(client, GzipCodec, env.scanner.clone())?.observer(tracker.clone());
    scanner.initialize(manifest).await?;
    Ok((Arc::new(scanner), tracker))
}

fn on_ctrl_c(action: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, aborting");
            action();
        }
    })
}

pub async fn scan(env: &GameEnv, arg: ScanArg) -> Result<ExitCode> {
    let (scanner, tracker) = prepare(env, false).await?;
    let mode = if arg.full { ScanMode::Full } else { ScanMode::Quick };

    let interrupt = on_ctrl_c({
        let scanner = scanner.clone();
        move || scanner.abort()
    });
    let result = scanner.scan(mode).await;
    interrupt.abort();

    match result {
        Ok(true) => {
            tracker.finish("all files ok");
            Ok(ExitCode::SUCCESS)
        }
        Ok(false) => {
            tracker.finish("some files need repair, run `gamescan repair`");
            Ok(ExitCode::FAILURE)
        }
        Err(e) if e.is_cancelled() => {
            tracker.finish("scan aborted");
            Ok(ExitCode::from(INTERRUPTED))
        }
        Err(e) => {
            tracker.finish("scan failed");
            Err(e.into())
        }
    }
}

pub async fn repair(env: &GameEnv) -> Result<ExitCode> {
    let (scanner, tracker) = prepare(env, true).await?;

    let interrupt = on_ctrl_c({
        let scanner = scanner.clone();
        move || scanner.abort()
    });
    let result = scanner.scan_and_repair().await;
    interrupt.abort();

    match result {
        Ok(summary) => {
            tracker.finish(format!("checked {} files, repaired {}", summary.checked, summary.repaired));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_cancelled() => {
            tracker.finish("repair aborted");
            Ok(ExitCode::from(INTERRUPTED))
        }
        Err(e) => {
            tracker.finish("repair failed");
            Err(e.into())
        }
    }
}

pub async fn fetch(env: &GameEnv, arg: FetchArg) -> Result<ExitCode> {
    let mut options = env.scanner.engine_options();
    if let Some(size) = arg.chunk_size {
        options = options.chunk_size_limit(size);
    }
    if let Some(workers) = arg.workers {
        options = options.max_workers(workers);
    }
    let tracker = DownloadTracker::new();
    let bar = tracker.clone();
    let options = options.on_progress(move |p| bar.update(p));

    let client = Arc::new(ReqwestClient::new());
    let engine = DownloadEngine::discover(client, &arg.url, None, &arg.out, options)
        .await
        .with_context(|| format!("Failed to reach {}", arg.url))?;
    info!(
        url = %arg.url,
        size = engine.job().total_size(),
        chunks = engine.job().chunk_count(),
        "download planned"
    );

    let cancel = CancellationToken::new();
    let interrupt = on_ctrl_c({
        let cancel = cancel.clone();
        move || cancel.cancel()
    });
    let result = engine.download(&cancel).await;
    interrupt.abort();

    match result {
        Ok(()) => {
            tracker.finish(Some(format!("saved {}", arg.out.display())));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_cancelled() => {
            tracker.finish(Some("interrupted, run again to resume".into()));
            Ok(ExitCode::from(INTERRUPTED))
        }
        Err(e) => {
            tracker.finish(None);
            Err(e).with_context(|| format!("Failed to download {}", arg.url))
        }
    }
}
