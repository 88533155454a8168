//! Run report
//!
//! Per-run record of every selected entry's terminal state, written as
//! JSON alongside operator logs. The exit code taxonomy distinguishes
//! "pack durable but record not marked issued" from ordinary failures,
//! since operators handle the two differently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use super::state::EntryState;

/// Schema version for run_report.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "issuance-lane/run_report@1";

/// Exit code when every entry reached `StatusUpdated` (or none were pending)
pub const EXIT_OK: i32 = 0;

/// Exit code when at least one entry failed before or at publish
pub const EXIT_ENTRY_FAILED: i32 = 50;

/// Exit code when packs published but at least one registry update failed
pub const EXIT_STATUS_UNRECORDED: i32 = 70;

/// Outcome of one entry in the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryReport {
    pub entry_id: String,

    /// Terminal state reached this run
    pub state: EntryState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_sha256: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_sha256: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack_url: Option<String>,
}

/// Run report (run_report.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub schema_id: String,
    pub run_id: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<EntryReport>,

    /// Entries that reached `StatusUpdated`
    pub issued: u32,

    /// Entries durable in the store but not recorded in the registry
    pub unrecorded: u32,

    /// Entries in a terminal failure state
    pub failed: u32,
}

impl RunReport {
    /// Aggregate entry outcomes into a report.
    pub fn from_entries(
        run_id: String,
        dry_run: bool,
        started_at: DateTime<Utc>,
        entries: Vec<EntryReport>,
    ) -> Self {
        let issued = entries
            .iter()
            .filter(|e| e.state == EntryState::StatusUpdated)
            .count() as u32;
        let unrecorded = entries
            .iter()
            .filter(|e| e.state == EntryState::StatusUpdateFailed)
            .count() as u32;
        let failed = entries.iter().filter(|e| e.state.is_failure()).count() as u32;

        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            run_id,
            dry_run,
            started_at,
            finished_at: Utc::now(),
            entries,
            issued,
            unrecorded,
            failed,
        }
    }

    /// Stable process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            EXIT_ENTRY_FAILED
        } else if self.unrecorded > 0 {
            EXIT_STATUS_UNRECORDED
        } else {
            EXIT_OK
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {e}")))?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with_states(states: &[EntryState]) -> RunReport {
        let entries = states
            .iter()
            .enumerate()
            .map(|(i, state)| EntryReport {
                entry_id: format!("CERT-{i:03}"),
                state: *state,
                error: None,
                document_sha256: None,
                archive_sha256: None,
                pack_url: None,
            })
            .collect();
        RunReport::from_entries("run-1".to_string(), false, Utc::now(), entries)
    }

    #[test]
    fn test_all_issued_exits_ok() {
        let report = report_with_states(&[EntryState::StatusUpdated, EntryState::StatusUpdated]);
        assert_eq!(report.issued, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.exit_code(), EXIT_OK);
    }

    #[test]
    fn test_empty_run_exits_ok() {
        let report = report_with_states(&[]);
        assert_eq!(report.exit_code(), EXIT_OK);
    }

    #[test]
    fn test_failures_dominate_exit_code() {
        let report = report_with_states(&[
            EntryState::StatusUpdated,
            EntryState::BuildFailed,
            EntryState::StatusUpdateFailed,
        ]);
        assert_eq!(report.issued, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.unrecorded, 1);
        assert_eq!(report.exit_code(), EXIT_ENTRY_FAILED);
    }

    #[test]
    fn test_unrecorded_surfaces_distinctly() {
        let report = report_with_states(&[EntryState::StatusUpdated, EntryState::StatusUpdateFailed]);
        assert_eq!(report.exit_code(), EXIT_STATUS_UNRECORDED);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let report = report_with_states(&[EntryState::PublishFailed]);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"schema_id\": \"issuance-lane/run_report@1\""));
        assert!(json.contains("\"PUBLISH_FAILED\""));

        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        assert_eq!(parsed.entries.len(), 1);
    }
}
