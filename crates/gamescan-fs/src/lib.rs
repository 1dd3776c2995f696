//! Filesystem primitives for putting repaired files into place.
//!
//! Replacement is delete-then-move: the destination is removed first (or its
//! parent directories are created), then the temp artifact is renamed over.
//! This is not an atomic swap. A crash between the two steps leaves no file
//! at the destination, which the next scan reports as missing.

mod error;

pub use error::{Error, Result};

use std::io;
use std::path::Path;

use tracing::debug;

/// What [`replace_file`] does when the rename crosses filesystems.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackStrategy {
    Error,
    #[default]
    Copy,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReplaceOptions {
    fallback: FallbackStrategy,
}

impl ReplaceOptions {
    pub fn new() -> Self { Self::default() }

    pub fn fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn get_fallback(&self) -> FallbackStrategy { self.fallback }
}

/// Moves `src` to `dest`, replacing whatever file was there.
pub fn replace_file(src: impl AsRef<Path>, dest: impl AsRef<Path>, options: ReplaceOptions) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if !remove_file_if_exists(dest)? {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let move_error = |source| Error::Move {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source,
    };

    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => match options.get_fallback() {
            FallbackStrategy::Error => Err(Error::CrossDevice {
                from: src.to_path_buf(),
                to:   dest.to_path_buf(),
            }),
            FallbackStrategy::Copy => {
                debug!(from = %src.display(), to = %dest.display(), "rename crosses filesystems, copying");
                std::fs::copy(src, dest).map_err(move_error)?;
                remove_file_if_exists(src)?;
                Ok(())
            }
        },
        Err(e) => Err(move_error(e)),
    }
}

/// Removes `path` if it is a file. Returns whether something was removed.
pub fn remove_file_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(Error::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Empties `dir`, creating it if it does not exist.
pub fn clean_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return std::fs::create_dir_all(dir).map_err(|source| Error::CreateDir {
                path: dir.to_path_buf(),
                source,
            });
        }
        Err(source) => {
            return Err(Error::ReadDir {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    for entry in entries {
        let entry = entry.map_err(|source| Error::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let removed = if is_dir { std::fs::remove_dir_all(&path) } else { std::fs::remove_file(&path) };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(Error::Remove { path, source }),
        }
    }
    Ok(())
}
