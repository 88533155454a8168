//! Registry seam
//!
//! The certification registry owns the entries and their lifecycle flags;
//! the core only reads entries and reports one status outcome per entry
//! per run. Two traits mark the boundary: `Selector` (query) and
//! `RegistryClient` (the single externally observable state mutation).

mod file;

pub use file::{FileRegistry, RegistryRecord};

use serde::{Deserialize, Serialize};
use std::io;

/// A registry entry selected for issuance.
///
/// Read-only to the core. The three gating flags are externally owned:
/// an entry is pending iff `active && issue_requested && !pack_generated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Stable unique identifier (also the namespace key in the store)
    pub id: String,

    /// Entry is in active status
    pub active: bool,

    /// Issuance has been requested
    pub issue_requested: bool,

    /// A pack was already generated for this entry
    pub pack_generated: bool,

    /// Field set consumed by the document builder
    pub fields: EntryFields,
}

/// Raw entry fields as they come out of the registry.
///
/// Any of these may be missing; normalization into render input happens in
/// the document builder, never here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFields {
    pub entity_name: Option<String>,
    pub jurisdiction: Option<String>,
    pub issued_date: Option<String>,
    pub expiration_date: Option<String>,
    pub scope: Option<String>,
}

/// Outcome reported back to the registry for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum StatusOutcome {
    /// Pack published; digests and location recorded for auditing.
    /// Clears the issue-requested gate so the entry is not re-selected.
    Success {
        document_sha256: String,
        archive_sha256: String,
        pack_url: String,
    },

    /// Issuance failed; the gate stays set so the entry is retried on the
    /// next run.
    Failure { detail: String },
}

/// Errors from registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("registry data error: {0}")]
    Data(#[from] serde_json::Error),

    #[error("unknown entry: {0}")]
    UnknownEntry(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Yields the entries pending issuance.
///
/// Each call re-queries live registry state; the returned sequence is
/// finite and not restartable mid-list.
pub trait Selector {
    fn list_pending(&self) -> Result<Vec<Entry>, RegistryError>;
}

/// Applies the status transition for one entry.
///
/// Must be invoked at most once per entry per run.
pub trait RegistryClient {
    fn set_status(&self, entry_id: &str, outcome: &StatusOutcome) -> Result<(), RegistryError>;
}
