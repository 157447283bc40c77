//! Checksum providers for snapshot integrity.
//!
//! A snapshot's hash is regenerated on every write and verified on every
//! read, so any edit to the stored file is detectable.

/// Produces and checks content hashes.
pub trait Checksum: Send + Sync {
    /// Hex-encoded hash of `input`.
    fn generate_hash(&self, input: &[u8]) -> String;

    fn verify_hash(&self, input: &[u8], hash: &str) -> bool {
        self.generate_hash(input) == hash
    }
}

/// BLAKE3 checksum, hex-encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Checksum;

impl Checksum for Blake3Checksum {
    fn generate_hash(&self, input: &[u8]) -> String {
        blake3::hash(input).to_hex().to_string()
    }
}
