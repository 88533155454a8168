//! Document building
//!
//! Turns a selected entry's field set into the primary pack document.
//! The rendering engine sits behind the `Renderer` trait; this module owns
//! input normalization (missing fields become explicit placeholders, never
//! errors) and the output normalization check.

mod pdf;

pub use pdf::PdfRenderer;

use crate::artifact::Artifact;
use crate::registry::{Entry, EntryFields};

/// Placeholder for a missing entity name
const UNKNOWN_ENTITY: &str = "Unknown Entity";

/// Placeholder for a missing identifier
const UNKNOWN: &str = "Unknown";

/// Name of the primary document within an entry's namespace.
pub fn document_name(entry_id: &str) -> String {
    format!("{entry_id}_issuance_pack.pdf")
}

/// Render input with every field resolved to a concrete string.
///
/// A selected entry must always yield a producible pack, so absent fields
/// resolve to placeholders here instead of failing downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFields {
    pub certification_id: String,
    pub entity_name: String,
    pub jurisdiction: String,
    pub issued_date: String,
    pub expiration_date: String,
    pub scope: String,
}

impl NormalizedFields {
    pub fn from_entry(entry_id: &str, fields: &EntryFields) -> Self {
        let id = entry_id.trim();
        Self {
            certification_id: if id.is_empty() {
                UNKNOWN.to_string()
            } else {
                id.to_string()
            },
            entity_name: fields
                .entity_name
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_ENTITY.to_string()),
            jurisdiction: fields.jurisdiction.clone().unwrap_or_default(),
            issued_date: fields.issued_date.clone().unwrap_or_default(),
            expiration_date: fields.expiration_date.clone().unwrap_or_default(),
            scope: fields.scope.clone().unwrap_or_default(),
        }
    }
}

/// Rendering engine seam.
///
/// Output must be byte-stable: identical fields and engine version yield
/// identical bytes, or the content-addressed pack digests stop being
/// reproducible.
pub trait Renderer: Send + Sync {
    fn render(&self, fields: &NormalizedFields) -> Result<Vec<u8>, RenderError>;
}

/// Engine-level rendering failure
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render engine failure: {0}")]
    Engine(String),
}

/// Errors producing the primary document for one entry
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("malformed document output: {0}")]
    MalformedOutput(String),
}

/// Builds the primary document artifact for selected entries.
pub struct DocumentBuilder {
    renderer: Box<dyn Renderer>,
}

impl DocumentBuilder {
    pub fn new(renderer: Box<dyn Renderer>) -> Self {
        Self { renderer }
    }

    /// Normalize the entry's fields, render, and check the output.
    ///
    /// The check rejects output the pack cannot carry: empty bytes or a
    /// payload without the document magic. Failures are scoped to the
    /// entry; the caller continues with the rest of the run.
    pub fn build(&self, entry: &Entry) -> Result<Artifact, BuildError> {
        let fields = NormalizedFields::from_entry(&entry.id, &entry.fields);
        let bytes = self.renderer.render(&fields)?;

        if bytes.is_empty() {
            return Err(BuildError::MalformedOutput("empty output".to_string()));
        }
        if !bytes.starts_with(b"%PDF-") {
            return Err(BuildError::MalformedOutput(
                "missing document header".to_string(),
            ));
        }

        Ok(Artifact::from_bytes(document_name(&entry.id), bytes))
    }
}
