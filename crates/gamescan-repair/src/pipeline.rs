//! Per-file repair pipeline.
//!
//! A file goes through check, download, verify, extract, verify again and
//! replace. The installed file is only touched by the final replace; any
//! earlier failure removes the file's temp artifacts and leaves the install
//! as it was.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gamescan_archive::Codec;
use gamescan_fetch::core::short_hash;
use gamescan_fetch::{DownloadEngine, FileDownloader, HttpClient, SingleStreamDownloader};
use gamescan_fs::{ReplaceOptions, remove_file_if_exists, replace_file};
use gamescan_verify::{ProgressFn, ensure_valid, full_check};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::error::{Error, Result};
use crate::manifest::GameFileInfo;
use crate::observer::RepairObserver;
use crate::progress::{RepairProgress, RepairStep};

/// What a pipeline run did to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Size and checksum already matched; nothing was downloaded.
    Intact,
    Repaired,
}

/// Temp artifacts of one file: the downloaded form and, for compressed
/// artifacts, the extracted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempPaths {
    pub download:  PathBuf,
    pub extracted: PathBuf,
}

impl TempPaths {
    pub fn new(temp_root: &Path, file_name: &str) -> Self {
        let stem = short_hash(&[file_name.to_lowercase().as_bytes()]);
        Self {
            download:  temp_root.join(format!("{stem}.tmp")),
            extracted: temp_root.join(format!("{stem}.ext.tmp")),
        }
    }
}

/// Runs `f` on a blocking thread.
pub(crate) async fn blocking<T, F>(path: &Path, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::io(path, io::Error::other(e)))?
}

/// Borrowed view of a scanner for repairing one file at a time.
pub(crate) struct FileRepair<'a, C, K> {
    pub client:   &'a Arc<C>,
    pub codec:    &'a Arc<K>,
    pub config:   &'a ScannerConfig,
    pub observer: &'a Arc<dyn RepairObserver>,
    pub cancel:   &'a CancellationToken,
}

impl<C, K> FileRepair<'_, C, K>
where
    C: HttpClient + 'static,
    K: Codec + 'static,
{
    pub async fn run(&self, file: &GameFileInfo) -> Result<RepairOutcome> {
        let destination = self.config.files_root.join(file.relative_path());

        self.ensure_active()?;
        self.report(RepairProgress::new(RepairStep::Check, 0.0));
        let intact = full_check(
            &destination,
            file.size,
            file.crc32,
            self.cancel,
            Some(self.step_progress(RepairStep::Check)),
        )
        .await?;
        if intact {
            debug!(file = %file.file_name, "file is intact");
            self.report(RepairProgress::new(RepairStep::End, 100.0));
            return Ok(RepairOutcome::Intact);
        }

        let temp = TempPaths::new(&self.config.temp_root, &file.file_name);
        match self.replace(file, &destination, &temp).await {
            Ok(()) => {
                info!(file = %file.file_name, "repaired");
                Ok(RepairOutcome::Repaired)
            }
            Err(e) => {
                rollback(&temp);
                Err(e)
            }
        }
    }

    async fn replace(&self, file: &GameFileInfo, destination: &Path, temp: &TempPaths) -> Result<()> {
        self.ensure_active()?;
        self.report(RepairProgress::new(RepairStep::Download, 0.0));
        tokio::fs::create_dir_all(&self.config.temp_root)
            .await
            .map_err(|e| Error::io(&self.config.temp_root, e))?;
        remove_file_if_exists(&temp.download)?;
        self.download(file, &temp.download).await?;

        self.ensure_active()?;
        self.report(RepairProgress::new(RepairStep::CheckDownload, 0.0));
        ensure_valid(
            &temp.download,
            file.bin_size,
            file.bin_crc32,
            self.cancel,
            Some(self.step_progress(RepairStep::CheckDownload)),
        )
        .await
        .inspect_err(|e| warn!(file = %file.file_name, error = %e, "downloaded artifact rejected"))?;

        let artifact = if self.is_compressed(&temp.download).await? {
            self.ensure_active()?;
            self.report(RepairProgress::new(RepairStep::Extract, 0.0));
            self.extract(&temp.download, &temp.extracted).await?;

            self.ensure_active()?;
            self.report(RepairProgress::new(RepairStep::CheckExtract, 0.0));
            ensure_valid(
                &temp.extracted,
                file.size,
                file.crc32,
                self.cancel,
                Some(self.step_progress(RepairStep::CheckExtract)),
            )
            .await
            .inspect_err(|e| warn!(file = %file.file_name, error = %e, "extracted file rejected"))?;
            remove_file_if_exists(&temp.download)?;
            &temp.extracted
        } else {
            &temp.download
        };

        self.ensure_active()?;
        self.report(RepairProgress::new(RepairStep::Finalize, 0.0));
        let (src, dest) = (artifact.clone(), destination.to_path_buf());
        blocking(destination, move || Ok(replace_file(src, dest, ReplaceOptions::new())?)).await?;

        self.report(RepairProgress::new(RepairStep::End, 100.0));
        Ok(())
    }

    async fn download(&self, file: &GameFileInfo, target: &Path) -> Result<()> {
        let observer = Arc::clone(self.observer);
        let options = self
            .config
            .engine_options()
            .on_progress(move |p| observer.on_repair_progress(&RepairProgress::download(p)));

        if file.bin_size >= self.config.chunked_threshold {
            debug!(file = %file.file_name, size = file.bin_size, "chunked download");
            let engine =
                DownloadEngine::discover(Arc::clone(self.client), &file.http_link, Some(file.bin_size), target, options)
                    .await?;
            engine.download(self.cancel).await?;
        } else {
            debug!(file = %file.file_name, size = file.bin_size, "single-stream download");
            let downloader = SingleStreamDownloader::new(
                Arc::clone(self.client),
                file.http_link.clone(),
                target,
                Some(file.bin_size),
                options,
            );
            downloader.download(self.cancel).await?;
        }
        Ok(())
    }

    async fn is_compressed(&self, path: &Path) -> Result<bool> {
        let codec = Arc::clone(self.codec);
        let owned = path.to_path_buf();
        blocking(path, move || Ok(codec.is_compressed(&owned)?)).await
    }

    async fn extract(&self, src: &Path, dst: &Path) -> Result<()> {
        let codec = Arc::clone(self.codec);
        let observer = Arc::clone(self.observer);
        let cancel = self.cancel.clone();
        let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
        let at = dst.clone();
        blocking(&at, move || {
            let progress = |p: f64| observer.on_repair_progress(&RepairProgress::new(RepairStep::Extract, p));
            Ok(codec.decompress(&src, &dst, &cancel, &progress)?)
        })
        .await
    }

    fn step_progress(&self, step: RepairStep) -> ProgressFn {
        let observer = Arc::clone(self.observer);
        Arc::new(move |p: f64| observer.on_repair_progress(&RepairProgress::new(step, p)))
    }

    fn report(&self, progress: RepairProgress) { self.observer.on_repair_progress(&progress); }

    fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

fn rollback(temp: &TempPaths) {
    for path in [&temp.download, &temp.extracted] {
        match remove_file_if_exists(path) {
            Ok(true) => debug!(path = %path.display(), "removed temp artifact"),
            Ok(false) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove temp artifact"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_paths_ignore_case_and_share_stem() {
        let root = Path::new("/tmp/gamescan/Temp");
        let a = TempPaths::new(root, "Data\\Maps\\A.map");
        let b = TempPaths::new(root, "data\\maps\\a.MAP");
        assert_eq!(a, b);

        let name = a.download.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".tmp") && !name.ends_with(".ext.tmp"));
        let stem = name.trim_end_matches(".tmp");
        assert_eq!(a.extracted, root.join(format!("{stem}.ext.tmp")));
        assert_ne!(a, TempPaths::new(root, "Game.exe"));
    }

    #[test]
    fn test_rollback_removes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let temp = TempPaths::new(dir.path(), "a.bar");
        std::fs::write(&temp.download, "x").unwrap();
        std::fs::write(&temp.extracted, "y").unwrap();

        rollback(&temp);
        assert!(!temp.download.exists());
        assert!(!temp.extracted.exists());
        rollback(&temp);
    }
}
