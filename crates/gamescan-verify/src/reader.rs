use std::io::{self, Read};

use crate::Hasher;

/// Streaming reader that hashes data as it passes through and counts it.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
    read:   u64,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self {
        Self {
            reader,
            hasher,
            read: 0,
        }
    }

    /// Bytes read so far.
    pub fn bytes_read(&self) -> u64 { self.read }

    pub fn into_hasher(self) -> H { self.hasher }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.read += n as u64;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::Crc32Hasher;

    #[test]
    fn test_verified_reader_hashes_passthrough() {
        let data = b"test data for verification";
        let mut verified = VerifiedReader::new(Cursor::new(data), Crc32Hasher::new());

        let mut copied = Vec::new();
        io::copy(&mut verified, &mut copied).unwrap();

        assert_eq!(copied, data);
        assert_eq!(verified.bytes_read(), data.len() as u64);
        assert_eq!(verified.into_hasher().value(), Crc32Hasher::digest(data));
    }
}
