//! Cancellable operation context.
//!
//! Every long-running core entry point (capture decode, footprint build,
//! DCE) takes a [`Context`] and polls it between commands. Cancellation is
//! cooperative: a cancelled operation stops at its next check point and
//! surfaces [`Cancelled`].

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Cancellation scope threaded through long-running calls.
///
/// Contexts are cheap to clone; clones share the same cancel flag.
#[derive(Clone, Debug)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        Context {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A child context plus the handle that cancels it.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(self.is_cancelled()));
        (
            Context {
                cancelled: flag.clone(),
            },
            CancelHandle { flag },
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Poll point: `Err(Cancelled)` once the context has been cancelled.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        Ok(())
    }
}

/// Cancels the context it was created from. Safe to call from any thread,
/// idempotent.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}
