//! Cooperative cancellation flag shared between the UI and a download worker

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Clonable cancel handle
///
/// The UI sets the flag, the worker only reads it. Unlike a one-shot token the
/// flag can be cleared, so the orchestrator resets it at the start of every run.
/// An engine invocation already in progress is never interrupted; the flag is
/// observed between attempts and during backoff.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    /// Create a cleared flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every task waiting in [`CancelFlag::cancelled`]
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Reset the flag for a new run
    pub fn clear(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    /// Wait until cancellation is requested
    ///
    /// Returns immediately if the flag is already set.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel() is not missed
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
