use sha2::{Digest, Sha256};

/// Length of the hash recorded in query closing markers.
pub const SHORT_HASH_LENGTH: usize = 8;

/// First eight hex characters of the SHA-256 of `content`.
///
/// Only used to notice that generated output changed, never for integrity.
pub fn short_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(SHORT_HASH_LENGTH);
    hex
}
