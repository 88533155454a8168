//! Pack artifacts
//!
//! An artifact is a named byte blob with its content digest and size
//! recorded at construction. Artifacts are immutable: every digest a
//! manifest records was computed from the exact bytes that get published.

use serde::{Deserialize, Serialize};

use crate::digest::sha256_hex;

/// A single file in an issuance pack.
///
/// Identity within the store is (entry id, name); the digest identifies
/// the content independently of the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name within the entry namespace
    pub name: String,

    /// Raw content
    pub bytes: Vec<u8>,

    /// Hex SHA-256 of `bytes`
    pub sha256: String,

    /// Size of `bytes` in bytes
    pub size: u64,
}

impl Artifact {
    /// Construct an artifact, computing digest and size from the bytes.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let sha256 = sha256_hex(&bytes);
        let size = bytes.len() as u64;
        Self {
            name: name.into(),
            bytes,
            sha256,
            size,
        }
    }

    /// Metadata view without the payload, for reports and manifests.
    pub fn descriptor(&self) -> ArtifactDescriptor {
        ArtifactDescriptor {
            name: self.name.clone(),
            sha256: self.sha256.clone(),
            size: self.size,
        }
    }
}

/// Artifact metadata as recorded in manifests and publish results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub sha256: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_computes_digest_and_size() {
        let artifact = Artifact::from_bytes("doc.pdf", b"content".to_vec());
        assert_eq!(artifact.name, "doc.pdf");
        assert_eq!(artifact.size, 7);
        assert_eq!(artifact.sha256, sha256_hex(b"content"));
    }

    #[test]
    fn test_descriptor_matches() {
        let artifact = Artifact::from_bytes("a.txt", b"x".to_vec());
        let desc = artifact.descriptor();
        assert_eq!(desc.name, artifact.name);
        assert_eq!(desc.sha256, artifact.sha256);
        assert_eq!(desc.size, artifact.size);
    }

    #[test]
    fn test_identical_bytes_identical_digest() {
        let a = Artifact::from_bytes("a", b"same".to_vec());
        let b = Artifact::from_bytes("b", b"same".to_vec());
        assert_eq!(a.sha256, b.sha256);
    }
}
