//! Cooperative shutdown signal shared by the supervisor and all workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Sticky, idempotent shutdown flag. Once triggered it stays triggered;
/// repeated triggers are no-ops.
#[derive(Debug, Default)]
pub(crate) struct Shutdown {
    triggered: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Suspend until shutdown is triggered. Returns immediately if it already
    /// was.
    pub async fn wait(&self) {
        if self.is_triggered() {
            return;
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register interest before the re-check so a trigger racing with this
        // call cannot be missed.
        notified.as_mut().enable();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

/// Cloneable handle used to stop a running listener from outside `run()`.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    inner: Arc<Shutdown>,
}

impl ShutdownHandle {
    pub(crate) fn new(inner: Arc<Shutdown>) -> Self {
        Self { inner }
    }

    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.inner.trigger();
    }

    /// Whether shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_triggered()
    }
}
