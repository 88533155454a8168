//! Immutable artifact store
//!
//! Write-once, append-only namespace per registry entry. Artifacts are
//! staged in memory and published in a single batched transport call per
//! run; existing namespaces only ever grow. Reservation is the type-level
//! existence check: staging requires a `Namespace` token, and `reserve`
//! refuses to hand one out for an entry whose pack is already finalized.

mod transport;

pub use transport::{DirTransport, FileEntry, PublishBatch, Transport, TransportError};

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::archive::archive_name;
use crate::artifact::{Artifact, ArtifactDescriptor};
use crate::manifest::{ManifestFile, ManifestParseError, MasterManifest, MASTER_MANIFEST_NAME};
use crate::render::document_name;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("namespace {0} already holds a finalized pack")]
    AlreadyFinalized(String),

    #[error("artifact {name} already staged for entry {entry_id}")]
    DuplicateStage { entry_id: String, name: String },

    #[error("no finalized pack for entry {0}")]
    NotFinalized(String),

    #[error("stored master manifest unreadable: {0}")]
    CorruptManifest(#[from] ManifestParseError),

    #[error("stored master manifest for {0} lacks the pack listings")]
    IncompleteRecord(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Proof that an entry's namespace was reserved for this run.
///
/// Only `reserve` constructs one, so every staged artifact passed the
/// finalized-pack check first.
#[derive(Debug)]
pub struct Namespace {
    entry_id: String,
}

impl Namespace {
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }
}

/// Publish outcome for one entry, produced once per run.
#[derive(Debug, Clone)]
pub struct PublishResult {
    pub entry_id: String,
    pub success: bool,
    pub artifacts: Vec<ArtifactDescriptor>,
    pub error: Option<String>,
}

/// Digests of a pack recovered from a durable master manifest.
#[derive(Debug, Clone)]
pub struct PublishedPack {
    pub entry_id: String,
    pub document: ManifestFile,
    pub archive: ManifestFile,
}

/// Append-only artifact store over a durable publish transport.
pub struct ImmutableStore {
    transport: Arc<dyn Transport>,
    staged: BTreeMap<String, Vec<Artifact>>,
}

impl ImmutableStore {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            staged: BTreeMap::new(),
        }
    }

    /// Reserve an entry's namespace for this run.
    ///
    /// Fails with `AlreadyFinalized` iff the namespace already holds a
    /// complete pack (document, archive and master manifest all durable).
    /// Remnants of a failed earlier publish do not count as finalized.
    pub fn reserve(&self, entry_id: &str) -> Result<Namespace, StoreError> {
        let names = self.transport.list(entry_id)?;
        let complete = [
            document_name(entry_id),
            archive_name(entry_id),
            MASTER_MANIFEST_NAME.to_string(),
        ]
        .iter()
        .all(|required| names.contains(required));

        if complete {
            return Err(StoreError::AlreadyFinalized(entry_id.to_string()));
        }

        Ok(Namespace {
            entry_id: entry_id.to_string(),
        })
    }

    /// Buffer an artifact for publication. No external effect.
    pub fn stage(&mut self, namespace: &Namespace, artifact: Artifact) -> Result<(), StoreError> {
        let staged = self.staged.entry(namespace.entry_id.clone()).or_default();
        if staged.iter().any(|a| a.name == artifact.name) {
            return Err(StoreError::DuplicateStage {
                entry_id: namespace.entry_id.clone(),
                name: artifact.name,
            });
        }
        staged.push(artifact);
        Ok(())
    }

    /// Drop everything staged for a namespace.
    ///
    /// Used when packaging fails after some artifacts were already
    /// buffered, so a partial pack never reaches the publish batch.
    pub fn discard(&mut self, namespace: &Namespace) {
        self.staged.remove(&namespace.entry_id);
    }

    /// Drop all staged artifacts without publishing. Dry runs end here.
    pub fn clear_staged(&mut self) {
        self.staged.clear();
    }

    /// Publish everything staged in one batched transport call.
    ///
    /// On transport failure every entry in the batch reports the shared
    /// error detail; no partial success exists at this level because the
    /// transport is all-or-nothing.
    pub fn publish(&mut self, run_id: &str) -> Vec<PublishResult> {
        let staged = std::mem::take(&mut self.staged);
        if staged.is_empty() {
            return Vec::new();
        }

        let mut batch = PublishBatch::new();
        let mut descriptors: BTreeMap<String, Vec<ArtifactDescriptor>> = BTreeMap::new();
        for (entry_id, artifacts) in &staged {
            descriptors.insert(
                entry_id.clone(),
                artifacts.iter().map(Artifact::descriptor).collect(),
            );
            batch.insert(
                entry_id.clone(),
                artifacts
                    .iter()
                    .map(|a| FileEntry {
                        name: a.name.clone(),
                        bytes: a.bytes.clone(),
                    })
                    .collect(),
            );
        }

        let file_count: usize = batch.values().map(Vec::len).sum();
        info!(run_id, entries = batch.len(), files = file_count, "publishing batch");

        match self.transport.publish_batch(&batch) {
            Ok(()) => descriptors
                .into_iter()
                .map(|(entry_id, artifacts)| PublishResult {
                    entry_id,
                    success: true,
                    artifacts,
                    error: None,
                })
                .collect(),
            Err(e) => {
                let detail = e.to_string();
                warn!(run_id, error = %detail, "batch publish failed");
                descriptors
                    .into_iter()
                    .map(|(entry_id, artifacts)| PublishResult {
                        entry_id,
                        success: false,
                        artifacts,
                        error: Some(detail.clone()),
                    })
                    .collect()
            }
        }
    }

    /// Recover the digests of an already-finalized pack from its durable
    /// master manifest. Used when `reserve` reports `AlreadyFinalized` so
    /// a re-run can retry the status update without re-rendering.
    pub fn recover(&self, entry_id: &str) -> Result<PublishedPack, StoreError> {
        let bytes = self
            .transport
            .read(entry_id, MASTER_MANIFEST_NAME)?
            .ok_or_else(|| StoreError::NotFinalized(entry_id.to_string()))?;
        let text = String::from_utf8_lossy(&bytes);
        let manifest = MasterManifest::parse(&text)?;

        let document = manifest
            .find(&document_name(entry_id))
            .cloned()
            .ok_or_else(|| StoreError::IncompleteRecord(entry_id.to_string()))?;
        let archive = manifest
            .find(&archive_name(entry_id))
            .cloned()
            .ok_or_else(|| StoreError::IncompleteRecord(entry_id.to_string()))?;

        Ok(PublishedPack {
            entry_id: entry_id.to_string(),
            document,
            archive,
        })
    }
}
