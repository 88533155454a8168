//! Archive assembly
//!
//! Packages the primary document and the contents manifest into the pack
//! archive. The codec sits behind a bytes-in/bytes-out trait; the built-in
//! implementation produces deterministic zip output (fixed epoch
//! timestamps, fixed permissions, caller-fixed entry order) so identical
//! inputs yield identical archive digests.
//!
//! The master manifest is never an assembly input: it records the
//! archive's digest and therefore cannot live inside it.

use std::collections::BTreeSet;
use std::io::{Cursor, Write};

use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::artifact::Artifact;

/// Name of the pack archive within an entry's namespace.
pub fn archive_name(entry_id: &str) -> String {
    format!("{entry_id}_issuance_pack.zip")
}

/// Errors from archive packaging
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty file list")]
    Empty,

    #[error("duplicate archive entry name: {0}")]
    NameCollision(String),

    #[error("archive codec error: {0}")]
    Codec(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Archive codec seam: an ordered file list in, one archive blob out.
pub trait ArchiveCodec: Send + Sync {
    fn pack(&self, files: &[(String, Vec<u8>)]) -> Result<Vec<u8>, CodecError>;
}

/// Deterministic zip codec.
pub struct ZipCodec;

impl ZipCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ZipCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveCodec for ZipCodec {
    fn pack(&self, files: &[(String, Vec<u8>)]) -> Result<Vec<u8>, CodecError> {
        if files.is_empty() {
            return Err(CodecError::Empty);
        }

        let mut seen = BTreeSet::new();
        for (name, _) in files {
            if !seen.insert(name.as_str()) {
                return Err(CodecError::NameCollision(name.clone()));
            }
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        // Epoch timestamp and fixed mode keep the archive digest
        // reproducible across identical inputs.
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        for (name, bytes) in files {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(bytes)?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

/// Package a document and its contents manifest into the entry's archive.
///
/// Entry order is fixed: document first, contents manifest second.
pub fn assemble(
    codec: &dyn ArchiveCodec,
    document: &Artifact,
    contents_manifest: &Artifact,
    entry_id: &str,
) -> Result<Artifact, CodecError> {
    let files = vec![
        (document.name.clone(), document.bytes.clone()),
        (contents_manifest.name.clone(), contents_manifest.bytes.clone()),
    ];
    let bytes = codec.pack(&files)?;
    Ok(Artifact::from_bytes(archive_name(entry_id), bytes))
}
