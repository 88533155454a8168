//! Manifest composition
//!
//! Two manifests per pack, generated strictly after the artifacts they
//! describe:
//!
//! - the contents manifest travels inside the archive and lists only the
//!   primary document (it must never reference the archive that carries
//!   it, or the digest chain would be self-referential);
//! - the master manifest sits loose at the top of the entry namespace and
//!   lists the document and the archive with absolute URLs.
//!
//! Both are line-oriented `key: value` text so they read for humans and
//! parse for machines. The master manifest doubles as the crash-recovery
//! record: a re-run recovers published digests by parsing it instead of
//! re-rendering.

use crate::artifact::Artifact;

/// Inner manifest name, packaged inside the archive
pub const CONTENTS_MANIFEST_NAME: &str = "CONTENTS_MANIFEST.txt";

/// Outer manifest name, left loose alongside the archive
pub const MASTER_MANIFEST_NAME: &str = "MANIFEST.txt";

/// Absolute URL for a published file within an entry's namespace.
pub fn artifact_url(base_url: &str, entry_id: &str, name: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), entry_id, name)
}

/// Compose the contents manifest for a primary document.
pub fn contents_manifest(document: &Artifact) -> Artifact {
    let mut text = String::new();
    text.push_str("ISSUANCE PACK CONTENTS MANIFEST\n\n");
    text.push_str(&format!("file: {}\n", document.name));
    text.push_str(&format!("size: {}\n", document.size));
    text.push_str(&format!("sha256: {}\n", document.sha256));
    text.push('\n');
    text.push_str(
        "To verify: recompute the SHA-256 digest of the file listed above and\n\
         compare it against the recorded value. Any mismatch means the file\n\
         was altered after issuance.\n",
    );
    Artifact::from_bytes(CONTENTS_MANIFEST_NAME, text.into_bytes())
}

/// Compose the master manifest for a published pack.
///
/// Called only once the archive exists, since it records the archive's
/// digest.
pub fn master_manifest(
    document: &Artifact,
    archive: &Artifact,
    base_url: &str,
    entry_id: &str,
) -> Artifact {
    let mut text = String::new();
    text.push_str("ISSUANCE PACK MASTER MANIFEST\n");
    text.push_str(&format!("entry: {entry_id}\n\n"));

    for artifact in [document, archive] {
        text.push_str(&format!("file: {}\n", artifact.name));
        text.push_str(&format!("size: {}\n", artifact.size));
        text.push_str(&format!("sha256: {}\n", artifact.sha256));
        text.push_str(&format!(
            "url: {}\n",
            artifact_url(base_url, entry_id, &artifact.name)
        ));
        text.push('\n');
    }

    text.push_str(
        "To verify: recompute the SHA-256 digest of each file listed above and\n\
         compare it against the recorded value. The archive carries its own\n\
         CONTENTS_MANIFEST.txt for verifying the files packaged inside it.\n",
    );
    Artifact::from_bytes(MASTER_MANIFEST_NAME, text.into_bytes())
}

/// One file listing recovered from a master manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    pub name: String,
    pub size: u64,
    pub sha256: String,
    pub url: Option<String>,
}

/// Parsed master manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterManifest {
    pub entry_id: String,
    pub files: Vec<ManifestFile>,
}

/// Errors parsing a master manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestParseError {
    #[error("missing entry header")]
    MissingEntry,

    #[error("file listing for {name} is missing {field}")]
    IncompleteListing { name: String, field: &'static str },

    #[error("invalid size value: {0}")]
    InvalidSize(String),
}

impl MasterManifest {
    /// Parse the `key: value` lines of a master manifest.
    ///
    /// Free-text lines (the verification instructions) are ignored.
    pub fn parse(text: &str) -> Result<Self, ManifestParseError> {
        let mut entry_id = None;
        let mut files: Vec<PartialFile> = Vec::new();

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "entry" => entry_id = Some(value.to_string()),
                "file" => files.push(PartialFile::new(value)),
                "size" => {
                    if let Some(file) = files.last_mut() {
                        file.size = Some(
                            value
                                .parse()
                                .map_err(|_| ManifestParseError::InvalidSize(value.to_string()))?,
                        );
                    }
                }
                "sha256" => {
                    if let Some(file) = files.last_mut() {
                        file.sha256 = Some(value.to_string());
                    }
                }
                "url" => {
                    if let Some(file) = files.last_mut() {
                        file.url = Some(value.to_string());
                    }
                }
                _ => {}
            }
        }

        let entry_id = entry_id.ok_or(ManifestParseError::MissingEntry)?;
        let files = files
            .into_iter()
            .map(PartialFile::complete)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entry_id, files })
    }

    /// Find a listed file by name.
    pub fn find(&self, name: &str) -> Option<&ManifestFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

struct PartialFile {
    name: String,
    size: Option<u64>,
    sha256: Option<String>,
    url: Option<String>,
}

impl PartialFile {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size: None,
            sha256: None,
            url: None,
        }
    }

    fn complete(self) -> Result<ManifestFile, ManifestParseError> {
        let size = self.size.ok_or(ManifestParseError::IncompleteListing {
            name: self.name.clone(),
            field: "size",
        })?;
        let sha256 = self.sha256.ok_or(ManifestParseError::IncompleteListing {
            name: self.name.clone(),
            field: "sha256",
        })?;
        Ok(ManifestFile {
            name: self.name,
            size,
            sha256,
            url: self.url,
        })
    }
}
