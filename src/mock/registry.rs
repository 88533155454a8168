//! Mock registry
//!
//! In-memory selector + registry client. Records every status call so
//! tests can assert the at-most-once contract, and mirrors the gating
//! flag updates a real registry would apply.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::registry::{Entry, RegistryClient, RegistryError, Selector, StatusOutcome};

struct RegistryState {
    entries: Vec<Entry>,
    outcomes: Vec<(String, StatusOutcome)>,
    fail_status: BTreeSet<String>,
    fail_listing: Option<String>,
}

/// Configurable in-memory registry for tests.
#[derive(Clone)]
pub struct MockRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl MockRegistry {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState {
                entries,
                outcomes: Vec::new(),
                fail_status: BTreeSet::new(),
                fail_listing: None,
            })),
        }
    }

    /// Make `set_status` fail for one entry.
    pub fn fail_status_for(&self, entry_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_status.insert(entry_id.to_string());
    }

    /// Stop failing `set_status` for one entry.
    pub fn clear_status_failure(&self, entry_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_status.remove(entry_id);
    }

    /// Make `list_pending` fail with the given detail.
    pub fn fail_listing(&self, detail: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_listing = Some(detail.to_string());
    }

    /// Number of `set_status` attempts observed for one entry.
    pub fn status_calls(&self, entry_id: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.outcomes.iter().filter(|(id, _)| id == entry_id).count()
    }

    /// Last outcome reported for one entry.
    pub fn last_outcome(&self, entry_id: &str) -> Option<StatusOutcome> {
        let state = self.state.lock().unwrap();
        state
            .outcomes
            .iter()
            .rev()
            .find(|(id, _)| id == entry_id)
            .map(|(_, outcome)| outcome.clone())
    }

    /// Flip the externally-owned gating flags back to pending, as an
    /// operator would when re-requesting issuance.
    pub fn reopen(&self, entry_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.entries.iter_mut().find(|e| e.id == entry_id) {
            entry.issue_requested = true;
            entry.pack_generated = false;
        }
    }

    /// Current view of one entry.
    pub fn entry(&self, entry_id: &str) -> Option<Entry> {
        let state = self.state.lock().unwrap();
        state.entries.iter().find(|e| e.id == entry_id).cloned()
    }
}

impl Selector for MockRegistry {
    fn list_pending(&self) -> Result<Vec<Entry>, RegistryError> {
        let state = self.state.lock().unwrap();
        if let Some(detail) = &state.fail_listing {
            return Err(RegistryError::Unavailable(detail.clone()));
        }
        Ok(state
            .entries
            .iter()
            .filter(|e| e.active && e.issue_requested && !e.pack_generated)
            .cloned()
            .collect())
    }
}

impl RegistryClient for MockRegistry {
    fn set_status(&self, entry_id: &str, outcome: &StatusOutcome) -> Result<(), RegistryError> {
        let mut state = self.state.lock().unwrap();
        // Record the attempt before any injected failure so tests can
        // count calls, not just successes.
        state
            .outcomes
            .push((entry_id.to_string(), outcome.clone()));

        if state.fail_status.contains(entry_id) {
            return Err(RegistryError::Unavailable(
                "injected status failure".to_string(),
            ));
        }

        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| RegistryError::UnknownEntry(entry_id.to_string()))?;

        if matches!(outcome, StatusOutcome::Success { .. }) {
            entry.pack_generated = true;
            entry.issue_requested = false;
        }

        Ok(())
    }
}
