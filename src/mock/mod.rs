//! Mock collaborators
//!
//! Configurable in-process implementations of the external seams, with
//! failure injection for exercising error paths:
//!
//! - `MockRegistry`: selector + registry client over an in-memory record
//!   set; records every status call
//! - `MockRenderer`: deterministic document bytes, per-entry failure
//!   injection
//! - `MockTransport`: in-memory durable store honoring the no-overwrite
//!   invariant; publish failures injectable per call or permanently

mod registry;
mod render;
mod transport;

pub use registry::MockRegistry;
pub use render::MockRenderer;
pub use transport::MockTransport;
