//! Mock transport
//!
//! In-memory durable store. Honors the same no-overwrite invariant as the
//! filesystem transport so idempotence tests exercise the real contract.
//! Publish failures are injectable for one call or permanently.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::store::{PublishBatch, Transport, TransportError};

#[derive(Default)]
struct TransportState {
    files: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    publish_calls: u32,
    fail_next: Option<String>,
    fail_always: Option<String>,
}

/// Configurable in-memory transport for tests.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `publish_batch` call with the given detail.
    pub fn fail_next_publish(&self, detail: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_next = Some(detail.to_string());
    }

    /// Fail every `publish_batch` call until cleared.
    pub fn fail_every_publish(&self, detail: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_always = Some(detail.to_string());
    }

    /// Clear injected publish failures.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_next = None;
        state.fail_always = None;
    }

    /// Number of `publish_batch` invocations observed.
    pub fn publish_calls(&self) -> u32 {
        self.state.lock().unwrap().publish_calls
    }

    /// Durable bytes of one file, if present.
    pub fn file(&self, namespace: &str, name: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(namespace)
            .and_then(|files| files.get(name))
            .cloned()
    }

    /// Durable file names in one namespace.
    pub fn file_names(&self, namespace: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(namespace)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Transport for MockTransport {
    fn publish_batch(&self, batch: &PublishBatch) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.publish_calls += 1;

        if let Some(detail) = state.fail_next.take() {
            return Err(TransportError::Rejected(detail));
        }
        if let Some(detail) = &state.fail_always {
            return Err(TransportError::Rejected(detail.clone()));
        }

        // Validate before writing, like the filesystem transport
        for (namespace, files) in batch {
            for file in files {
                if let Some(existing) =
                    state.files.get(namespace).and_then(|f| f.get(&file.name))
                {
                    if existing != &file.bytes {
                        return Err(TransportError::WouldOverwrite {
                            namespace: namespace.clone(),
                            name: file.name.clone(),
                        });
                    }
                }
            }
        }

        for (namespace, files) in batch {
            let stored = state.files.entry(namespace.clone()).or_default();
            for file in files {
                stored.entry(file.name.clone()).or_insert_with(|| file.bytes.clone());
            }
        }

        Ok(())
    }

    fn read(&self, namespace: &str, name: &str) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.file(namespace, name))
    }

    fn list(&self, namespace: &str) -> Result<Vec<String>, TransportError> {
        Ok(self.file_names(namespace))
    }
}
