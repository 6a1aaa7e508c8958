//! A scoped cancellation token threaded through every blocking call in the
//! scheduler (§5 "Cancellation"). Deliberately minimal rather than pulling in
//! `tokio-util` for one primitive the corpus doesn't otherwise need.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Inner {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
    notify: Notify,
}

/// A cheaply cloneable handle; cancelling any clone cancels all of them.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel the run. Idempotent: the first caller's reason wins.
    pub fn cancel(&self, reason: impl Into<String>) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            *self.inner.reason.lock() = Some(reason.into());
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    /// Resolve once the token is cancelled. Safe to call repeatedly and from
    /// multiple tasks; every waiter is woken on cancellation.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_immediately_once_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel("shutdown");
        tokio::time::timeout(std::time::Duration::from_millis(50), token.cancelled())
            .await
            .expect("should not block");
        assert_eq!(token.reason().as_deref(), Some("shutdown"));
    }

    #[tokio::test]
    async fn cancelled_wakes_pending_waiters() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        token.cancel("done");
        tokio::time::timeout(std::time::Duration::from_millis(200), handle)
            .await
            .expect("waiter task should complete")
            .unwrap();
    }

    #[test]
    fn first_cancel_reason_wins() {
        let token = CancellationToken::new();
        token.cancel("first");
        token.cancel("second");
        assert_eq!(token.reason().as_deref(), Some("first"));
    }
}
