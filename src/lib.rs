//! Issuance Lane - registry issuance pack generation and dispatch
//!
//! This crate produces tamper-evident, self-verifying document bundles
//! ("issuance packs") for approved registry entries and advances each
//! entry's lifecycle status exactly once per successful issuance.
//!
//! A pack is content-addressed end to end: primary document, inner
//! contents manifest, archive, and outer master manifest, every digest
//! computed from the exact bytes published. Publication goes through an
//! append-only store with a no-overwrite invariant, and the dispatch
//! state machine ties artifact production to the registry status
//! transition with idempotent re-runs after partial failure.

pub mod archive;
pub mod artifact;
pub mod config;
pub mod digest;
pub mod dispatch;
pub mod manifest;
pub mod mock;
pub mod registry;
pub mod render;
pub mod signal;
pub mod store;

pub use archive::{ArchiveCodec, ZipCodec};
pub use artifact::Artifact;
pub use config::IssuerConfig;
pub use dispatch::{DispatchConfig, Dispatcher, EntryState, RunReport};
pub use registry::{Entry, FileRegistry, RegistryClient, Selector, StatusOutcome};
pub use render::{PdfRenderer, Renderer};
pub use signal::CancelFlag;
pub use store::{DirTransport, ImmutableStore, Transport};
