//! Dispatch orchestration
//!
//! Drives the per-entry issuance pipeline and ties artifact production to
//! the registry status transition:
//!
//! 1. select pending entries (fresh registry query)
//! 2. per entry: reserve namespace, build document, compose manifests,
//!    assemble archive, stage the pack
//! 3. one batched publish for the whole run
//! 4. per entry: map the publish outcome to a status transition, at most
//!    one registry call per entry per run
//!
//! Failures before staging never touch the store. A re-run that finds an
//! entry's pack already finalized skips rendering entirely and retries
//! only the status update.

mod report;
mod state;

pub use report::{
    EntryReport, RunReport, EXIT_ENTRY_FAILED, EXIT_OK, EXIT_STATUS_UNRECORDED,
};
pub use state::{EntryProgress, EntryState, StateError};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use ulid::Ulid;

use crate::archive::{assemble, ArchiveCodec};
use crate::manifest::{artifact_url, contents_manifest, master_manifest};
use crate::registry::{Entry, RegistryClient, RegistryError, Selector, StatusOutcome};
use crate::render::{DocumentBuilder, Renderer};
use crate::signal::CancelFlag;
use crate::store::{ImmutableStore, PublishResult, StoreError, Transport};

/// Run-level errors. Entry-scoped failures never abort the run; they land
/// in the run report instead.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("state error: {0}")]
    State(#[from] StateError),
}

impl DispatchError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DispatchError::Registry(_) => 10,
            DispatchError::State(_) => 40,
        }
    }
}

/// Explicit run configuration. No ambient or global state: everything the
/// dispatcher needs arrives at construction.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Base URL the published packs are served from
    pub base_url: String,

    /// Build and verify every pack but publish nothing and record nothing
    pub dry_run: bool,
}

/// One entry's progress plus the payload for its status transition.
struct InFlight {
    progress: EntryProgress,
    document_sha256: Option<String>,
    archive_sha256: Option<String>,
    pack_url: Option<String>,
}

impl InFlight {
    fn failed(progress: EntryProgress) -> Self {
        Self {
            progress,
            document_sha256: None,
            archive_sha256: None,
            pack_url: None,
        }
    }
}

/// Orchestrates one issuance run.
pub struct Dispatcher {
    config: DispatchConfig,
    selector: Box<dyn Selector>,
    registry: Box<dyn RegistryClient>,
    builder: DocumentBuilder,
    codec: Box<dyn ArchiveCodec>,
    store: ImmutableStore,
    cancel: Option<Arc<CancelFlag>>,
}

impl Dispatcher {
    pub fn new(
        config: DispatchConfig,
        selector: Box<dyn Selector>,
        registry: Box<dyn RegistryClient>,
        renderer: Box<dyn Renderer>,
        codec: Box<dyn ArchiveCodec>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            selector,
            registry,
            builder: DocumentBuilder::new(renderer),
            codec,
            store: ImmutableStore::new(transport),
            cancel: None,
        }
    }

    /// Stop selecting new entries once the flag is set; entries already in
    /// flight finish normally.
    pub fn with_cancel_flag(mut self, flag: Arc<CancelFlag>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Execute one run over the currently pending entries.
    pub fn run(&mut self) -> Result<RunReport, DispatchError> {
        let run_id = Ulid::new().to_string();
        let started_at = Utc::now();

        let pending = self.selector.list_pending()?;
        info!(
            run_id = %run_id,
            pending = pending.len(),
            dry_run = self.config.dry_run,
            "run started"
        );

        let mut seen = BTreeSet::new();
        let mut inflight = Vec::with_capacity(pending.len());
        for entry in &pending {
            if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                info!("cancellation requested; not selecting further entries");
                break;
            }
            if !seen.insert(entry.id.clone()) {
                warn!(entry_id = %entry.id, "entry selected twice in one run; skipping duplicate");
                continue;
            }
            inflight.push(self.prepare(entry)?);
        }

        // Publish barrier: one transport invocation for the whole run.
        let publish_results: BTreeMap<String, PublishResult> = if self.config.dry_run {
            self.store.clear_staged();
            BTreeMap::new()
        } else {
            self.store
                .publish(&run_id)
                .into_iter()
                .map(|r| (r.entry_id.clone(), r))
                .collect()
        };

        let mut entries = Vec::with_capacity(inflight.len());
        for item in inflight {
            entries.push(self.resolve(item, &publish_results)?);
        }

        let report = RunReport::from_entries(run_id.clone(), self.config.dry_run, started_at, entries);
        info!(
            run_id = %run_id,
            issued = report.issued,
            unrecorded = report.unrecorded,
            failed = report.failed,
            "run finished"
        );
        Ok(report)
    }

    /// Build and stage one entry's pack. Never aborts the run: failures
    /// land the entry in a terminal failure state with the store untouched.
    fn prepare(&mut self, entry: &Entry) -> Result<InFlight, DispatchError> {
        let mut progress = EntryProgress::new(&entry.id);

        let namespace = match self.store.reserve(&entry.id) {
            Ok(ns) => ns,
            Err(StoreError::AlreadyFinalized(_)) => {
                return self.recover_finalized(entry, progress);
            }
            Err(e) => {
                warn!(entry_id = %entry.id, error = %e, "namespace reservation failed");
                progress.fail(EntryState::PublishFailed, e.to_string())?;
                return Ok(InFlight::failed(progress));
            }
        };

        let document = match self.builder.build(entry) {
            Ok(d) => d,
            Err(e) => {
                warn!(entry_id = %entry.id, error = %e, "document build failed");
                progress.fail(EntryState::BuildFailed, e.to_string())?;
                return Ok(InFlight::failed(progress));
            }
        };
        progress.transition(EntryState::Built)?;

        // Fixed composition order: the contents manifest precedes the
        // archive (it travels inside it), the master manifest follows
        // (it records the archive digest).
        let contents = contents_manifest(&document);
        let archive = match assemble(self.codec.as_ref(), &document, &contents, &entry.id) {
            Ok(a) => a,
            Err(e) => {
                warn!(entry_id = %entry.id, error = %e, "archive assembly failed");
                progress.fail(EntryState::PackageFailed, e.to_string())?;
                return Ok(InFlight::failed(progress));
            }
        };
        let master = master_manifest(&document, &archive, &self.config.base_url, &entry.id);

        let document_sha256 = document.sha256.clone();
        let archive_sha256 = archive.sha256.clone();
        let pack_url = artifact_url(&self.config.base_url, &entry.id, &document.name);

        // The contents manifest is not staged loose; it only exists inside
        // the archive.
        for artifact in [document, archive, master] {
            if let Err(e) = self.store.stage(&namespace, artifact) {
                warn!(entry_id = %entry.id, error = %e, "staging failed");
                self.store.discard(&namespace);
                progress.fail(EntryState::PackageFailed, e.to_string())?;
                return Ok(InFlight::failed(progress));
            }
        }
        progress.transition(EntryState::Packaged)?;
        info!(entry_id = %entry.id, document_sha256 = %document_sha256, "pack staged");

        Ok(InFlight {
            progress,
            document_sha256: Some(document_sha256),
            archive_sha256: Some(archive_sha256),
            pack_url: Some(pack_url),
        })
    }

    /// The entry's pack is already durable from an earlier run whose
    /// status update never landed. Recover the recorded digests and leave
    /// only the status transition to perform.
    fn recover_finalized(
        &self,
        entry: &Entry,
        mut progress: EntryProgress,
    ) -> Result<InFlight, DispatchError> {
        match self.store.recover(&entry.id) {
            Ok(pack) => {
                info!(entry_id = %entry.id, "pack already finalized; republish is a no-op");
                progress.transition(EntryState::PublishSucceeded)?;
                let pack_url = pack.document.url.clone().unwrap_or_else(|| {
                    artifact_url(&self.config.base_url, &entry.id, &pack.document.name)
                });
                Ok(InFlight {
                    progress,
                    document_sha256: Some(pack.document.sha256),
                    archive_sha256: Some(pack.archive.sha256),
                    pack_url: Some(pack_url),
                })
            }
            Err(e) => {
                warn!(entry_id = %entry.id, error = %e, "finalized pack unreadable");
                progress.fail(EntryState::PublishFailed, e.to_string())?;
                Ok(InFlight::failed(progress))
            }
        }
    }

    /// Map the publish outcome to the entry's status transition and close
    /// out its report line.
    fn resolve(
        &mut self,
        mut item: InFlight,
        results: &BTreeMap<String, PublishResult>,
    ) -> Result<EntryReport, DispatchError> {
        let entry_id = item.progress.entry_id().to_string();

        if item.progress.state() == EntryState::Packaged && !self.config.dry_run {
            match results.get(&entry_id) {
                Some(result) if result.success => {
                    item.progress.transition(EntryState::PublishSucceeded)?;
                }
                Some(result) => {
                    let detail = result
                        .error
                        .clone()
                        .unwrap_or_else(|| "publish failed".to_string());
                    item.progress.fail(EntryState::PublishFailed, detail)?;
                }
                None => {
                    item.progress
                        .fail(EntryState::PublishFailed, "no publish result for entry")?;
                }
            }
        }

        if self.config.dry_run {
            info!(entry_id = %entry_id, state = ?item.progress.state(), "dry run: nothing published, nothing recorded");
            return Ok(report_entry(item));
        }

        match item.progress.state() {
            EntryState::PublishSucceeded => {
                let outcome = StatusOutcome::Success {
                    document_sha256: item.document_sha256.clone().unwrap_or_default(),
                    archive_sha256: item.archive_sha256.clone().unwrap_or_default(),
                    pack_url: item.pack_url.clone().unwrap_or_default(),
                };
                match self.registry.set_status(&entry_id, &outcome) {
                    Ok(()) => {
                        item.progress.transition(EntryState::StatusUpdated)?;
                        info!(entry_id = %entry_id, "entry issued");
                    }
                    Err(e) => {
                        warn!(
                            entry_id = %entry_id,
                            error = %e,
                            "pack is durable but the status update failed; entry stays \
                             eligible for re-selection"
                        );
                        item.progress.fail(EntryState::StatusUpdateFailed, e.to_string())?;
                    }
                }
            }
            state if state.is_failure() => {
                let detail = item
                    .progress
                    .error()
                    .unwrap_or("issuance failed")
                    .to_string();
                if let Err(e) = self
                    .registry
                    .set_status(&entry_id, &StatusOutcome::Failure { detail })
                {
                    warn!(entry_id = %entry_id, error = %e, "failure status not recorded");
                }
            }
            _ => {}
        }

        Ok(report_entry(item))
    }
}

fn report_entry(item: InFlight) -> EntryReport {
    let state = item.progress.state();
    info!(
        entry_id = %item.progress.entry_id(),
        state = ?state,
        error = item.progress.error(),
        "entry finished"
    );
    EntryReport {
        entry_id: item.progress.entry_id().to_string(),
        state,
        error: item.progress.error().map(str::to_string),
        document_sha256: item.document_sha256,
        archive_sha256: item.archive_sha256,
        pack_url: item.pack_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ZipCodec;
    use crate::mock::{MockRegistry, MockRenderer, MockTransport};
    use crate::registry::EntryFields;

    fn dispatcher(registry: &MockRegistry, transport: &MockTransport) -> Dispatcher {
        Dispatcher::new(
            DispatchConfig {
                base_url: "https://registry.example/packs".to_string(),
                dry_run: false,
            },
            Box::new(registry.clone()),
            Box::new(registry.clone()),
            Box::new(MockRenderer::new()),
            Box::new(ZipCodec::new()),
            Arc::new(transport.clone()),
        )
    }

    fn pending_entry(id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            active: true,
            issue_requested: true,
            pack_generated: false,
            fields: EntryFields {
                entity_name: Some("Acme Corp".to_string()),
                jurisdiction: Some("US-CA".to_string()),
                ..EntryFields::default()
            },
        }
    }

    #[test]
    fn test_successful_run_issues_entry() {
        let registry = MockRegistry::new(vec![pending_entry("CERT-001")]);
        let transport = MockTransport::new();
        let mut dispatcher = dispatcher(&registry, &transport);

        let report = dispatcher.run().unwrap();
        assert_eq!(report.issued, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.entries[0].state, EntryState::StatusUpdated);
        assert_eq!(report.exit_code(), EXIT_OK);

        // One batch publish, one status call
        assert_eq!(transport.publish_calls(), 1);
        assert_eq!(registry.status_calls("CERT-001"), 1);
    }

    #[test]
    fn test_duplicate_selection_processed_once() {
        let registry =
            MockRegistry::new(vec![pending_entry("CERT-001"), pending_entry("CERT-001")]);
        let transport = MockTransport::new();
        let mut dispatcher = dispatcher(&registry, &transport);

        let report = dispatcher.run().unwrap();
        assert_eq!(report.entries.len(), 1);
        assert_eq!(registry.status_calls("CERT-001"), 1);
    }

    #[test]
    fn test_dry_run_publishes_and_records_nothing() {
        let registry = MockRegistry::new(vec![pending_entry("CERT-001")]);
        let transport = MockTransport::new();
        let mut dispatcher = Dispatcher::new(
            DispatchConfig {
                base_url: "https://registry.example/packs".to_string(),
                dry_run: true,
            },
            Box::new(registry.clone()),
            Box::new(registry.clone()),
            Box::new(MockRenderer::new()),
            Box::new(ZipCodec::new()),
            Arc::new(transport.clone()),
        );

        let report = dispatcher.run().unwrap();
        assert!(report.dry_run);
        assert_eq!(report.entries[0].state, EntryState::Packaged);
        assert_eq!(transport.publish_calls(), 0);
        assert_eq!(registry.status_calls("CERT-001"), 0);
    }

    #[test]
    fn test_cancel_flag_stops_selection() {
        let registry =
            MockRegistry::new(vec![pending_entry("CERT-001"), pending_entry("CERT-002")]);
        let transport = MockTransport::new();
        let flag = Arc::new(CancelFlag::new());
        flag.cancel();

        let mut dispatcher = dispatcher(&registry, &transport).with_cancel_flag(flag);
        let report = dispatcher.run().unwrap();

        assert!(report.entries.is_empty());
        assert_eq!(transport.publish_calls(), 0);
    }
}
