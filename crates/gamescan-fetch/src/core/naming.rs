use sha2::{Digest, Sha256};

/// Short hex digest used in cache and temp file names.
pub fn short_hash(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hex::encode(&hasher.finalize()[..8])
}

/// Cache directory name for a job, stable across runs of the same download.
pub fn cache_dir_name(url: &str, chunk_size: u64, total_size: u64) -> String {
    short_hash(&[url.as_bytes(), &chunk_size.to_le_bytes(), &total_size.to_le_bytes()])
}

/// Temp file name for the chunk of `url` starting at `start`.
pub fn chunk_file_name(url: &str, start: u64) -> String {
    let url_hash = short_hash(&[url.to_lowercase().as_bytes()]);
    format!("{url_hash}.{start:016x}.chunk.tmp")
}
