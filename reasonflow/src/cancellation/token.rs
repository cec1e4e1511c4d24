//! Cancellation token for cooperative cancellation.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::warn;

/// A callback type for cancellation notifications. Receives the reason.
pub type CancelCallback = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    reason: RwLock<Option<String>>,
    callbacks: RwLock<Vec<(u64, CancelCallback)>>,
    next_callback: AtomicU64,
    notify: Notify,
    /// The parent and the id of the callback linking this token to it.
    parent: Option<(Weak<Inner>, u64)>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some((parent, id)) = self.parent.take() {
            if let Some(parent) = parent.upgrade() {
                parent.callbacks.write().retain(|(slot, _)| *slot != id);
            }
        }
    }
}

/// A cloneable handle for cooperative cancellation.
///
/// Clones share state. Cancellation is idempotent: only the first reason is
/// kept. A [`child`](Self::child) token is cancelled whenever its parent is,
/// but cancelling the child leaves the parent untouched; the scheduler uses
/// this for per-step scopes nested inside the run scope. Dropping every
/// handle of a child unlinks it from the parent.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is cancelled together with `self`.
    #[must_use]
    pub fn child(&self) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let link = self.register(Box::new(move |reason| {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.cancel(reason);
                }
            }));
            Inner {
                cancelled: AtomicBool::new(false),
                reason: RwLock::new(None),
                callbacks: RwLock::new(Vec::new()),
                next_callback: AtomicU64::new(0),
                notify: Notify::new(),
                parent: link.map(|id| (Arc::downgrade(&self.inner), id)),
            }
        });
        let child = Self { inner };
        // The link cannot reach a child still under construction.
        if let Some(reason) = self.reason() {
            child.cancel(reason);
        }
        child
    }

    /// Requests cancellation with a reason.
    ///
    /// Callbacks run immediately; panics inside them are logged and
    /// suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        {
            let mut slot = self.inner.reason.write();
            if slot.is_some() {
                return;
            }
            *slot = Some(reason.clone());
            self.inner.cancelled.store(true, Ordering::SeqCst);
        }
        self.inner.notify.notify_waiters();

        // Callbacks fire once, outside the lock.
        let callbacks = std::mem::take(&mut *self.inner.callbacks.write());
        for (_, callback) in &callbacks {
            invoke(callback.as_ref(), &reason);
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.register(Box::new(callback));
    }

    /// Stores `callback`, returning its id, or runs it now if already
    /// cancelled.
    fn register(&self, callback: CancelCallback) -> Option<u64> {
        let mut callbacks = self.inner.callbacks.write();
        if let Some(reason) = self.reason() {
            drop(callbacks);
            invoke(callback.as_ref(), &reason);
            None
        } else {
            let id = self.inner.next_callback.fetch_add(1, Ordering::Relaxed);
            callbacks.push((id, callback));
            Some(id)
        }
    }

    #[cfg(test)]
    fn callback_count(&self) -> usize {
        self.inner.callbacks.read().len()
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.read().clone()
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

fn invoke(callback: &(dyn Fn(&str) + Send + Sync), reason: &str) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        callback(reason);
    })) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
