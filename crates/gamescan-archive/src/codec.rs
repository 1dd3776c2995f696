use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Decompresses downloaded artifacts.
///
/// Implementations are synchronous; callers run them on a blocking thread.
pub trait Codec: Send + Sync {
    /// Whether `path` is in a form this codec can decompress.
    fn is_compressed(&self, path: &Path) -> Result<bool>;

    /// Decompresses `src` into `dst`, reporting progress as a percentage of
    /// `src` consumed and checking `cancel` between blocks.
    fn decompress(&self, src: &Path, dst: &Path, cancel: &CancellationToken, progress: &dyn Fn(f64)) -> Result<()>;
}

/// Treats every artifact as already uncompressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl Codec for PassthroughCodec {
    fn is_compressed(&self, _path: &Path) -> Result<bool> { Ok(false) }

    fn decompress(&self, src: &Path, dst: &Path, _cancel: &CancellationToken, progress: &dyn Fn(f64)) -> Result<()> {
        std::fs::copy(src, dst).map_err(|e| Error::io(dst, e))?;
        progress(100.0);
        Ok(())
    }
}

/// Counts bytes pulled through a reader.
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Single-member gzip artifacts.
#[cfg(feature = "gzip")]
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec;

#[cfg(feature = "gzip")]
impl Codec for GzipCodec {
    fn is_compressed(&self, path: &Path) -> Result<bool> {
        let format = crate::detect::detect_from_file(path).map_err(|e| Error::io(path, e))?;
        Ok(format == Some(crate::detect::Compression::Gzip))
    }

    fn decompress(&self, src: &Path, dst: &Path, cancel: &CancellationToken, progress: &dyn Fn(f64)) -> Result<()> {
        use flate2::bufread::GzDecoder;

        let input = File::open(src).map_err(|e| Error::io(src, e))?;
        let total = input.metadata().map_err(|e| Error::io(src, e))?.len().max(1);
        let mut decoder = GzDecoder::new(BufReader::new(CountingReader { inner: input, count: 0 }));
        let mut output = File::create(dst).map_err(|e| Error::io(dst, e))?;

        let mut buffer = vec![0u8; 64 * 1024];
        let mut reported = 0.0;
        loop {
            if cancel.is_cancelled() {
                debug!(src = %src.display(), "decompression cancelled");
                return Err(Error::Cancelled);
            }
            let n = match decoder.read(&mut buffer) {
                Ok(n) => n,
                Err(e) if matches!(e.kind(), io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof) => {
                    warn!(src = %src.display(), error = %e, "corrupted gzip stream");
                    return Err(Error::Corrupted {
                        path:   src.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(Error::io(src, e)),
            };
            if n == 0 {
                break;
            }
            output.write_all(&buffer[..n]).map_err(|e| Error::io(dst, e))?;

            let consumed = decoder.get_ref().get_ref().count;
            let percent = (consumed as f64 / total as f64 * 100.0).min(100.0);
            if percent - reported >= 1.0 {
                reported = percent;
                progress(percent);
            }
        }
        output.flush().map_err(|e| Error::io(dst, e))?;
        debug!(
            src = %src.display(),
            dst = %dst.display(),
            compressed = decoder.get_ref().get_ref().count,
            "decompressed artifact"
        );
        progress(100.0);
        Ok(())
    }
}
