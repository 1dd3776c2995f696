/// Incremental digest fed by [`VerifiedReader`](crate::VerifiedReader).
pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
}

/// CRC-32 (IEEE) as used by the game manifests.
#[derive(Debug, Clone, Default)]
pub struct Crc32Hasher(crc32fast::Hasher);

impl Hasher for Crc32Hasher {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
}

impl Crc32Hasher {
    pub fn new() -> Self { Self::default() }

    pub fn value(self) -> u32 { self.0.finalize() }

    pub fn digest(data: &[u8]) -> u32 { crc32fast::hash(data) }
}
