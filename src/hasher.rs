/// Content hashing for deduplication and deterministic naming
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest (128 bits)
pub const DIGEST_HEX_LEN: usize = 32;

/// Hex-encoded content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash a payload. Empty input hashes the empty buffer.
pub fn hash(data: &[u8]) -> ContentDigest {
    let digest = Sha256::digest(data);
    let mut encoded = hex::encode(digest);
    encoded.truncate(DIGEST_HEX_LEN);
    ContentDigest(encoded)
}
