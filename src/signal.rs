//! Signal handling
//!
//! On SIGINT/SIGTERM the run finishes what is in flight and stops
//! selecting new entries. There is no mid-artifact cancellation: the
//! current entry completes, staged packs still publish, and statuses are
//! still recorded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

/// Cooperative cancellation flag checked between entries.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Install SIGINT/SIGTERM handlers that set the flag.
    ///
    /// Must be called once at program startup.
    pub fn install() -> Result<Arc<Self>, ctrlc::Error> {
        let flag = Arc::new(Self::new());
        let handler_flag = Arc::clone(&flag);
        ctrlc::set_handler(move || {
            warn!("interrupt received; finishing in-flight entries, selecting no new ones");
            handler_flag.cancel();
        })?;
        Ok(flag)
    }
}
