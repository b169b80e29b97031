//! Condition variable for cooperative tasks.

use std::sync::Mutex;

use rand::Rng;
use tokio::sync::oneshot;

use wharf_core::async_sleep;

/// A condition variable usable from suspended tasks.
///
/// Each waiter parks on a completion that `notify_all` / `notify_one`
/// resolve; the waiter list is swapped out under the lock and completed
/// outside it, so a resumed waiter can re-register without observing itself
/// still in the list.
pub struct CondVar {
    waiters: Mutex<Vec<oneshot::Sender<()>>>,
}

impl CondVar {
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(Vec::with_capacity(4)),
        }
    }

    /// Suspend until a notification resumes this waiter.
    pub async fn wait(&self) {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().expect("condvar poisoned").push(tx);
        // Err means the condvar was dropped with waiters parked; resuming is
        // the only sane option either way.
        let _ = rx.await;
    }

    /// Suspend until notified or until `ms` milliseconds elapse.
    ///
    /// Returns `true` iff the timeout fired first.
    pub async fn wait_until(&self, ms: i64) -> bool {
        tokio::select! {
            _ = async_sleep(ms) => true,
            _ = self.wait() => false,
        }
    }

    /// Resume every parked waiter. Never blocks, never fails.
    pub fn notify_all(&self) {
        let waiters = {
            let mut guard = self.waiters.lock().expect("condvar poisoned");
            std::mem::take(&mut *guard)
        };
        for waiter in waiters {
            // a waiter whose task was cancelled is simply gone
            let _ = waiter.send(());
        }
    }

    /// Resume one parked waiter, picked pseudorandomly.
    pub fn notify_one(&self) {
        let waiter = {
            let mut guard = self.waiters.lock().expect("condvar poisoned");
            if guard.is_empty() {
                None
            } else {
                let index = rand::rng().random_range(0..guard.len());
                Some(guard.swap_remove(index))
            }
        };
        if let Some(waiter) = waiter {
            let _ = waiter.send(());
        }
    }

    /// Number of currently parked waiters (including abandoned ones that
    /// have not been notified yet).
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().expect("condvar poisoned").len()
    }
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn wait_until_times_out_without_notifier() {
        let cv = CondVar::new();
        let started = Instant::now();
        assert!(cv.wait_until(100).await);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn notify_all_beats_the_timeout() {
        let cv = Arc::new(CondVar::new());
        let notifier = cv.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            notifier.notify_all();
        });
        let started = Instant::now();
        assert!(!cv.wait_until(1000).await);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn notify_all_resumes_every_waiter() {
        let cv = Arc::new(CondVar::new());
        let mut tasks = Vec::new();
        for _ in 0..4 {
            let cv = cv.clone();
            tasks.push(tokio::spawn(async move { cv.wait().await }));
        }
        while cv.waiter_count() < 4 {
            tokio::task::yield_now().await;
        }
        cv.notify_all();
        assert_eq!(cv.waiter_count(), 0);
        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn notify_one_resumes_exactly_one() {
        let cv = Arc::new(CondVar::new());
        for _ in 0..3 {
            let cv = cv.clone();
            tokio::spawn(async move { cv.wait().await });
        }
        while cv.waiter_count() < 3 {
            tokio::task::yield_now().await;
        }
        cv.notify_one();
        assert_eq!(cv.waiter_count(), 2);
        cv.notify_all();
    }

    #[tokio::test]
    async fn notify_without_waiters_is_a_no_op() {
        let cv = CondVar::new();
        cv.notify_all();
        cv.notify_one();
    }
}
