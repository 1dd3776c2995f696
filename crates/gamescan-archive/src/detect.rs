use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Compression wrapping a transported file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
}

pub fn detect_format(data: &[u8]) -> Option<Compression> {
    match data {
        [0x1F, 0x8B, ..] => Some(Compression::Gzip),
        _ => None,
    }
}

/// Reads the leading bytes of `path` and detects its compression.
pub fn detect_from_file(path: &Path) -> io::Result<Option<Compression>> {
    let mut header = [0u8; 8];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < header.len() {
        let n = file.read(&mut header[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(detect_format(&header[..filled]))
}
