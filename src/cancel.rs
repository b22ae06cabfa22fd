//! Cooperative cancellation for CAS attempts and backoff sleeps (§5).
//!
//! There is no ambient "context" type in this ecosystem the way there is in
//! Go; a [`CancelToken`] plays the same role as an explicit, cheaply cloned
//! handle callers can hold onto and fire independently of any particular
//! attempt in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cancellation signal shared between a caller and the engine loop it started.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.inner.notify.notified().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        assert!(!token.is_cancelled());
        token.cancel();
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }
}
