//! SHA-256 content digests for snapshot integrity checks.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `content`.
pub fn sha256_hex(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    format!("{:x}", digest)
}
