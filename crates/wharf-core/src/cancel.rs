//! Cooperative cancellation tokens.
//!
//! A [`CancelToken`] lets a caller request that a spawned task stop at its
//! next suspension point. Cancellation never tears a task down abruptly:
//! the guarded future is dropped, so owned resources are released by normal
//! unwinding of the task's stack.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::{CoreError, Result};

struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation signal shared between an owner and its tasks.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Resolve once cancellation has been requested.
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

    /// Drive `future`, resuming with [`CoreError::Cancelled`] at the next
    /// suspension point after this token is cancelled.
    pub async fn guard<F: Future>(&self, future: F) -> Result<F::Output> {
        if self.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(CoreError::Cancelled),
            out = future => Ok(out),
        }
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
    use std::time::Duration;

    #[tokio::test]
    async fn guard_resumes_with_cancelled() {
        let token = CancelToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let out = token
            .guard(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert!(matches!(out, Err(CoreError::Cancelled)));
    }

    #[tokio::test]
    async fn already_cancelled_token_short_circuits() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        let out = token.guard(async { 1 }).await;
        assert!(matches!(out, Err(CoreError::Cancelled)));
    }

    #[tokio::test]
    async fn uncancelled_guard_passes_the_value_through() {
        let token = CancelToken::new();
        assert_eq!(token.guard(async { 5 }).await.unwrap(), 5);
    }
}
