//! Content digest computation
//!
//! Single SHA-256 path for every artifact in an issuance pack. Manifests,
//! archives and published files are all verified against these digests.

use sha2::{Digest, Sha256};

/// Compute the hex-encoded SHA-256 digest of a byte blob.
///
/// Deterministic and total: any byte sequence has exactly one digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
