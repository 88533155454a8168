//! Durable publish transport
//!
//! Seam for the append-only storage backend. One `publish_batch` call per
//! run carries every staged file; the backend treats it as all-or-nothing.
//! `read`/`list` expose durable state so the store can enforce the
//! no-overwrite invariant and recover finalized packs after a crash.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A file to publish into an entry namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// All files for one run, keyed by entry namespace.
pub type PublishBatch = BTreeMap<String, Vec<FileEntry>>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("refusing to overwrite existing file {namespace}/{name}")]
    WouldOverwrite { namespace: String, name: String },

    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Durable publish seam.
pub trait Transport: Send + Sync {
    /// Durably write the whole batch. All-or-nothing: on error, the run
    /// treats every entry in the batch as unpublished.
    fn publish_batch(&self, batch: &PublishBatch) -> Result<(), TransportError>;

    /// Read one durable file, `None` if absent.
    fn read(&self, namespace: &str, name: &str) -> Result<Option<Vec<u8>>, TransportError>;

    /// List durable file names in a namespace (empty if the namespace does
    /// not exist yet).
    fn list(&self, namespace: &str) -> Result<Vec<String>, TransportError>;
}

/// Filesystem-backed transport.
///
/// Each namespace is a directory under the root. Writes go through a temp
/// file + rename; an existing file with different content fails the whole
/// batch, an existing file with identical bytes is left untouched (staged
/// content is content-addressed, so re-publishing is a no-op).
pub struct DirTransport {
    root: PathBuf,
}

impl DirTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn target(&self, namespace: &str, name: &str) -> PathBuf {
        self.root.join(namespace).join(name)
    }
}

impl Transport for DirTransport {
    fn publish_batch(&self, batch: &PublishBatch) -> Result<(), TransportError> {
        // Validate the whole batch before the first write so a conflict
        // surfaces with nothing partially published.
        for (namespace, files) in batch {
            for file in files {
                let target = self.target(namespace, &file.name);
                if target.exists() && fs::read(&target)? != file.bytes {
                    return Err(TransportError::WouldOverwrite {
                        namespace: namespace.clone(),
                        name: file.name.clone(),
                    });
                }
            }
        }

        for (namespace, files) in batch {
            for file in files {
                let target = self.target(namespace, &file.name);
                if target.exists() {
                    continue;
                }
                write_atomic(&target, &file.bytes)?;
            }
        }

        Ok(())
    }

    fn read(&self, namespace: &str, name: &str) -> Result<Option<Vec<u8>>, TransportError> {
        match fs::read(self.target(namespace, name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, namespace: &str) -> Result<Vec<String>, TransportError> {
        let dir = self.root.join(namespace);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Write bytes via temp file + rename so no partial file becomes visible.
fn write_atomic(target: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = target.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, target)
}
