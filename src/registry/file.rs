//! File-backed registry
//!
//! JSON-file implementation of the registry seam for local and CI
//! operation. The file holds the full record set; status updates rewrite
//! it atomically (temp file + rename) so a crash never leaves a torn
//! registry behind.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Entry, EntryFields, RegistryClient, RegistryError, Selector, StatusOutcome};

/// Entry status value that makes a record eligible for issuance
const ACTIVE_STATUS: &str = "Active";

/// One registry record as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Stable entry identifier
    pub certification_id: String,

    /// Lifecycle status ("Active" gates issuance)
    #[serde(default)]
    pub status: String,

    /// Issuance requested flag
    #[serde(default)]
    pub issue_now: bool,

    /// Set once a pack has been issued for this record
    #[serde(default)]
    pub issuance_pack_generated: bool,

    /// Document fields
    #[serde(flatten)]
    pub fields: EntryFields,

    /// Published pack location, recorded on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_pack_url: Option<String>,

    /// Published document digest, recorded on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_pack_sha256: Option<String>,

    /// Published archive digest, recorded on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_archive_sha256: Option<String>,

    /// Downstream dispatch status ("Pending" after publish, "Failed" on error)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_dispatch_status: Option<String>,

    /// Error detail from the last failed run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_error_log: Option<String>,
}

impl RegistryRecord {
    fn is_pending(&self) -> bool {
        self.status == ACTIVE_STATUS && self.issue_now && !self.issuance_pack_generated
    }

    fn to_entry(&self) -> Entry {
        Entry {
            id: self.certification_id.clone(),
            active: self.status == ACTIVE_STATUS,
            issue_requested: self.issue_now,
            pack_generated: self.issuance_pack_generated,
            fields: self.fields.clone(),
        }
    }
}

/// JSON-file registry implementing both `Selector` and `RegistryClient`.
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load all records from the backing file.
    pub fn load(&self) -> Result<Vec<RegistryRecord>, RegistryError> {
        let json = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn store(&self, records: &[RegistryRecord]) -> Result<(), RegistryError> {
        let json = serde_json::to_string_pretty(records)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }
}

/// Write bytes via temp file + rename so readers never see a partial file.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)
}

impl Selector for FileRegistry {
    fn list_pending(&self) -> Result<Vec<Entry>, RegistryError> {
        let records = self.load()?;
        Ok(records
            .iter()
            .filter(|r| r.is_pending())
            .map(RegistryRecord::to_entry)
            .collect())
    }
}

impl RegistryClient for FileRegistry {
    fn set_status(&self, entry_id: &str, outcome: &StatusOutcome) -> Result<(), RegistryError> {
        let mut records = self.load()?;
        let record = records
            .iter_mut()
            .find(|r| r.certification_id == entry_id)
            .ok_or_else(|| RegistryError::UnknownEntry(entry_id.to_string()))?;

        match outcome {
            StatusOutcome::Success {
                document_sha256,
                archive_sha256,
                pack_url,
            } => {
                record.issuance_pack_generated = true;
                record.issue_now = false;
                record.issuance_pack_url = Some(pack_url.clone());
                record.issuance_pack_sha256 = Some(document_sha256.clone());
                record.issuance_archive_sha256 = Some(archive_sha256.clone());
                record.issuance_dispatch_status = Some("Pending".to_string());
                record.issuance_error_log = None;
            }
            StatusOutcome::Failure { detail } => {
                record.issuance_dispatch_status = Some("Failed".to_string());
                record.issuance_error_log = Some(detail.clone());
            }
        }

        self.store(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_records() -> Vec<RegistryRecord> {
        vec![
            RegistryRecord {
                certification_id: "CERT-001".to_string(),
                status: "Active".to_string(),
                issue_now: true,
                issuance_pack_generated: false,
                fields: EntryFields {
                    entity_name: Some("Acme Corp".to_string()),
                    jurisdiction: Some("US-CA".to_string()),
                    ..EntryFields::default()
                },
                issuance_pack_url: None,
                issuance_pack_sha256: None,
                issuance_archive_sha256: None,
                issuance_dispatch_status: None,
                issuance_error_log: None,
            },
            RegistryRecord {
                certification_id: "CERT-002".to_string(),
                status: "Active".to_string(),
                issue_now: false,
                issuance_pack_generated: false,
                fields: EntryFields::default(),
                issuance_pack_url: None,
                issuance_pack_sha256: None,
                issuance_archive_sha256: None,
                issuance_dispatch_status: None,
                issuance_error_log: None,
            },
            RegistryRecord {
                certification_id: "CERT-003".to_string(),
                status: "Suspended".to_string(),
                issue_now: true,
                issuance_pack_generated: false,
                fields: EntryFields::default(),
                issuance_pack_url: None,
                issuance_pack_sha256: None,
                issuance_archive_sha256: None,
                issuance_dispatch_status: None,
                issuance_error_log: None,
            },
        ]
    }

    fn write_registry(dir: &TempDir, records: &[RegistryRecord]) -> FileRegistry {
        let path = dir.path().join("registry.json");
        fs::write(&path, serde_json::to_string_pretty(records).unwrap()).unwrap();
        FileRegistry::new(path)
    }

    #[test]
    fn test_list_pending_applies_gate() {
        let dir = TempDir::new().unwrap();
        let registry = write_registry(&dir, &sample_records());

        let pending = registry.list_pending().unwrap();
        // CERT-002 has no request, CERT-003 is not active
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "CERT-001");
        assert_eq!(pending[0].fields.entity_name.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn test_success_clears_gate_and_records_digests() {
        let dir = TempDir::new().unwrap();
        let registry = write_registry(&dir, &sample_records());

        let outcome = StatusOutcome::Success {
            document_sha256: "d".repeat(64),
            archive_sha256: "a".repeat(64),
            pack_url: "https://registry.example/packs/CERT-001/".to_string(),
        };
        registry.set_status("CERT-001", &outcome).unwrap();

        let records = registry.load().unwrap();
        let record = &records[0];
        assert!(record.issuance_pack_generated);
        assert!(!record.issue_now);
        assert_eq!(record.issuance_pack_sha256.as_deref(), Some("d".repeat(64).as_str()));
        assert_eq!(record.issuance_dispatch_status.as_deref(), Some("Pending"));
        assert!(record.issuance_error_log.is_none());

        // No longer pending after the gate clears
        assert!(registry.list_pending().unwrap().is_empty());
    }

    #[test]
    fn test_failure_keeps_gate_set() {
        let dir = TempDir::new().unwrap();
        let registry = write_registry(&dir, &sample_records());

        let outcome = StatusOutcome::Failure {
            detail: "publish transport failed".to_string(),
        };
        registry.set_status("CERT-001", &outcome).unwrap();

        let records = registry.load().unwrap();
        let record = &records[0];
        assert!(!record.issuance_pack_generated);
        assert!(record.issue_now);
        assert_eq!(record.issuance_dispatch_status.as_deref(), Some("Failed"));
        assert_eq!(
            record.issuance_error_log.as_deref(),
            Some("publish transport failed")
        );

        // Still pending: retried by re-selection on the next run
        assert_eq!(registry.list_pending().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_entry_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = write_registry(&dir, &sample_records());

        let outcome = StatusOutcome::Failure {
            detail: "x".to_string(),
        };
        let err = registry.set_status("CERT-999", &outcome).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownEntry(_)));
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let registry = write_registry(&dir, &sample_records());

        registry
            .set_status(
                "CERT-001",
                &StatusOutcome::Failure {
                    detail: "x".to_string(),
                },
            )
            .unwrap();

        let tmp_count = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .count();
        assert_eq!(tmp_count, 0);
    }
}
