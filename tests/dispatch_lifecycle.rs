//! Dispatch lifecycle tests
//!
//! Terminal-state discipline and failure isolation: every selected entry
//! ends the run in exactly one terminal state, the registry sees at most
//! one status call per entry, and a transport failure hits the whole
//! batch uniformly.

use std::sync::Arc;

use issuance_lane::archive::ZipCodec;
use issuance_lane::dispatch::{
    DispatchConfig, Dispatcher, EntryState, EXIT_ENTRY_FAILED,
};
use issuance_lane::mock::{MockRegistry, MockRenderer, MockTransport};
use issuance_lane::registry::{Entry, EntryFields, StatusOutcome};

fn pending_entry(id: &str) -> Entry {
    Entry {
        id: id.to_string(),
        active: true,
        issue_requested: true,
        pack_generated: false,
        fields: EntryFields {
            entity_name: Some(format!("Entity for {id}")),
            ..EntryFields::default()
        },
    }
}

fn dispatcher(
    registry: &MockRegistry,
    renderer: &MockRenderer,
    transport: &MockTransport,
) -> Dispatcher {
    Dispatcher::new(
        DispatchConfig {
            base_url: "https://registry.example/packs".to_string(),
            dry_run: false,
        },
        Box::new(registry.clone()),
        Box::new(registry.clone()),
        Box::new(renderer.clone()),
        Box::new(ZipCodec::new()),
        Arc::new(transport.clone()),
    )
}

#[test]
fn test_transport_failure_fails_whole_batch_uniformly() {
    let registry = MockRegistry::new(vec![
        pending_entry("CERT-001"),
        pending_entry("CERT-002"),
        pending_entry("CERT-003"),
    ]);
    let renderer = MockRenderer::new();
    let transport = MockTransport::new();
    transport.fail_next_publish("storage offline");

    let report = dispatcher(&registry, &renderer, &transport).run().unwrap();

    assert_eq!(report.failed, 3);
    assert_eq!(report.exit_code(), EXIT_ENTRY_FAILED);
    assert_eq!(transport.publish_calls(), 1);

    // All three share the same terminal state and error detail
    let mut details = Vec::new();
    for entry in &report.entries {
        assert_eq!(entry.state, EntryState::PublishFailed);
        details.push(entry.error.clone().unwrap());
    }
    assert!(details.iter().all(|d| d == &details[0]));
    assert!(details[0].contains("storage offline"));

    // Each entry got exactly one failure status with the shared detail
    for id in ["CERT-001", "CERT-002", "CERT-003"] {
        assert_eq!(registry.status_calls(id), 1);
        match registry.last_outcome(id).unwrap() {
            StatusOutcome::Failure { detail } => assert_eq!(detail, details[0]),
            other => panic!("expected failure outcome, got {other:?}"),
        }
    }

    // Nothing became durable
    for id in ["CERT-001", "CERT-002", "CERT-003"] {
        assert!(transport.file_names(id).is_empty());
    }
}

#[test]
fn test_build_failure_is_isolated_to_its_entry() {
    let registry = MockRegistry::new(vec![pending_entry("CERT-001"), pending_entry("CERT-002")]);
    let renderer = MockRenderer::new();
    renderer.fail_for("CERT-001");
    let transport = MockTransport::new();

    let report = dispatcher(&registry, &renderer, &transport).run().unwrap();

    assert_eq!(report.issued, 1);
    assert_eq!(report.failed, 1);

    let failed = report.entries.iter().find(|e| e.entry_id == "CERT-001").unwrap();
    assert_eq!(failed.state, EntryState::BuildFailed);
    assert!(failed.error.as_deref().unwrap().contains("render"));

    let issued = report.entries.iter().find(|e| e.entry_id == "CERT-002").unwrap();
    assert_eq!(issued.state, EntryState::StatusUpdated);

    // The failed entry never touched the store
    assert!(transport.file_names("CERT-001").is_empty());
    assert_eq!(transport.file_names("CERT-002").len(), 3);
}

#[test]
fn test_every_entry_reaches_exactly_one_terminal_state() {
    let registry = MockRegistry::new(vec![
        pending_entry("CERT-001"),
        pending_entry("CERT-002"),
        pending_entry("CERT-003"),
    ]);
    let renderer = MockRenderer::new();
    renderer.fail_for("CERT-002");
    let transport = MockTransport::new();
    registry.fail_status_for("CERT-003");

    let report = dispatcher(&registry, &renderer, &transport).run().unwrap();

    assert_eq!(report.entries.len(), 3);
    for entry in &report.entries {
        assert!(entry.state.is_terminal(), "{entry:?} not terminal");
        assert_eq!(
            registry.status_calls(&entry.entry_id),
            1,
            "status must be invoked exactly once for {}",
            entry.entry_id
        );
    }

    // StatusUpdated implies a successful publish with recorded digests
    let issued = report.entries.iter().find(|e| e.entry_id == "CERT-001").unwrap();
    assert_eq!(issued.state, EntryState::StatusUpdated);
    assert!(issued.document_sha256.is_some());
    assert!(issued.archive_sha256.is_some());

    // CERT-003 published but its record is not marked issued
    let unrecorded = report.entries.iter().find(|e| e.entry_id == "CERT-003").unwrap();
    assert_eq!(unrecorded.state, EntryState::StatusUpdateFailed);
    assert_eq!(transport.file_names("CERT-003").len(), 3);
}

#[test]
fn test_status_update_failure_keeps_entry_pending() {
    let registry = MockRegistry::new(vec![pending_entry("CERT-001")]);
    let renderer = MockRenderer::new();
    let transport = MockTransport::new();
    registry.fail_status_for("CERT-001");

    let report = dispatcher(&registry, &renderer, &transport).run().unwrap();
    assert_eq!(report.unrecorded, 1);

    // The gate never cleared, so the entry is re-selected next run
    let entry = registry.entry("CERT-001").unwrap();
    assert!(entry.issue_requested);
    assert!(!entry.pack_generated);
}

#[test]
fn test_registry_listing_failure_aborts_run() {
    let registry = MockRegistry::new(vec![pending_entry("CERT-001")]);
    registry.fail_listing("registry down");
    let renderer = MockRenderer::new();
    let transport = MockTransport::new();

    let err = dispatcher(&registry, &renderer, &transport).run().unwrap_err();
    assert_eq!(err.exit_code(), 10);
    assert_eq!(transport.publish_calls(), 0);
}

#[test]
fn test_empty_selection_is_clean_noop() {
    let registry = MockRegistry::new(Vec::new());
    let renderer = MockRenderer::new();
    let transport = MockTransport::new();

    let report = dispatcher(&registry, &renderer, &transport).run().unwrap();
    assert!(report.entries.is_empty());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(transport.publish_calls(), 0);
}
