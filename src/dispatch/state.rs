//! Per-entry issuance state machine
//!
//! States for one entry within one run:
//! `Selected → Built → Packaged → {PublishSucceeded | PublishFailed}`,
//! then `PublishSucceeded → {StatusUpdated | StatusUpdateFailed}`.
//! Failures short-circuit to a terminal failure state. A reservation that
//! finds an already-finalized pack jumps `Selected → PublishSucceeded`
//! directly (the artifacts are durable; only the status update remains).

use serde::{Deserialize, Serialize};

/// Entry state within the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryState {
    /// Entry selected for this run
    Selected,
    /// Primary document built
    Built,
    /// Manifests composed and archive assembled; artifacts staged
    Packaged,
    /// Pack is durable in the store
    PublishSucceeded,
    /// Batch publish failed for this entry
    PublishFailed,
    /// Registry records the issuance; the gate is cleared
    StatusUpdated,
    /// Pack is durable but the registry update failed
    StatusUpdateFailed,
    /// Document build failed; store untouched
    BuildFailed,
    /// Manifest or archive production failed; store untouched
    PackageFailed,
}

impl EntryState {
    /// Check if transition from this state to `target` is valid
    pub fn can_transition_to(&self, target: EntryState) -> bool {
        use EntryState::*;
        matches!(
            (self, target),
            (Selected, Built)
                | (Selected, BuildFailed)
                // reserve found a finalized pack: republish is a no-op
                | (Selected, PublishSucceeded)
                // reservation or recovery failed at the store level
                | (Selected, PublishFailed)
                | (Built, Packaged)
                | (Built, PackageFailed)
                | (Packaged, PublishSucceeded)
                | (Packaged, PublishFailed)
                | (PublishSucceeded, StatusUpdated)
                | (PublishSucceeded, StatusUpdateFailed)
        )
    }

    /// No further transitions possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryState::StatusUpdated
                | EntryState::StatusUpdateFailed
                | EntryState::PublishFailed
                | EntryState::BuildFailed
                | EntryState::PackageFailed
        )
    }

    /// Terminal failure state (entry excluded from the run's success count,
    /// eligible for re-selection next run)
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EntryState::PublishFailed | EntryState::BuildFailed | EntryState::PackageFailed
        )
    }
}

/// Errors for entry state transitions
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: EntryState, to: EntryState },
}

/// Tracks one entry's progress through the run.
#[derive(Debug, Clone)]
pub struct EntryProgress {
    entry_id: String,
    state: EntryState,
    error: Option<String>,
}

impl EntryProgress {
    /// A freshly selected entry.
    pub fn new(entry_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            state: EntryState::Selected,
            error: None,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Transition to a new state.
    pub fn transition(&mut self, new_state: EntryState) -> Result<(), StateError> {
        if !self.state.can_transition_to(new_state) {
            return Err(StateError::InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }
        self.state = new_state;
        Ok(())
    }

    /// Transition to a failure state, recording the error detail.
    pub fn fail(&mut self, state: EntryState, detail: impl Into<String>) -> Result<(), StateError> {
        self.transition(state)?;
        self.error = Some(detail.into());
        Ok(())
    }
}
