//! Cancellation for a single run.
//!
//! A [`RunContext`] owns the run; every component waits on a cloned
//! [`CancelSignal`]. Cancelling is permanent, and dropping the context
//! cancels too, so a run cannot outlive whatever holds its context.
//! A context created with [`RunContext::child`] is also cancelled by its
//! parent, which is how server shutdown reaches runs that are still open.

use std::sync::Arc;
use tokio::sync::watch;

/// Returned by a wait that was interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("run cancelled")]
pub struct Cancelled;

#[derive(Debug)]
pub struct RunContext {
    tx: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl RunContext {
    pub fn new() -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, CancelSignal { rx })
    }

    /// A context that is cancelled on its own terms or when `parent` fires.
    ///
    /// Must be called inside a tokio runtime: a small task forwards the
    /// parent's cancellation and exits once every child signal is dropped.
    pub fn child(parent: &CancelSignal) -> (Self, CancelSignal) {
        let (ctx, signal) = Self::new();
        let tx = Arc::clone(&ctx.tx);
        let parent = parent.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = parent.cancelled() => {
                    tx.send_replace(true);
                }
                _ = tx.closed() => {}
            }
        });
        (ctx, signal)
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the run is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // An error means the context is gone, which counts as cancelled.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
