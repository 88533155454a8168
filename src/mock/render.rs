//! Mock renderer
//!
//! Deterministic stand-in for the document rendering engine. Output
//! carries the document magic so it passes the builder's normalization
//! check; failures are injectable per certification id.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::render::{NormalizedFields, RenderError, Renderer};

/// Configurable mock rendering engine for tests.
#[derive(Clone)]
pub struct MockRenderer {
    fail_for: Arc<Mutex<BTreeSet<String>>>,
    calls: Arc<Mutex<u32>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            fail_for: Arc::new(Mutex::new(BTreeSet::new())),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Make rendering fail for one certification id.
    pub fn fail_for(&self, certification_id: &str) {
        let mut fail_for = self.fail_for.lock().unwrap();
        fail_for.insert(certification_id.to_string());
    }

    /// Number of render invocations observed.
    pub fn render_calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MockRenderer {
    fn render(&self, fields: &NormalizedFields) -> Result<Vec<u8>, RenderError> {
        *self.calls.lock().unwrap() += 1;

        let fail_for = self.fail_for.lock().unwrap();
        if fail_for.contains(&fields.certification_id) {
            return Err(RenderError::Engine("injected render failure".to_string()));
        }

        Ok(format!(
            "%PDF-1.4\nmock issuance document\nid: {}\nentity: {}\njurisdiction: {}\nissued: {}\nexpires: {}\nscope: {}\n",
            fields.certification_id,
            fields.entity_name,
            fields.jurisdiction,
            fields.issued_date,
            fields.expiration_date,
            fields.scope,
        )
        .into_bytes())
    }
}
