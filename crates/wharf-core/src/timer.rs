//! One-shot and interval timers with weak cancellation handles.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::executor::panic_message;

struct TimerShared {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Weak handle to a registered timer.
///
/// The handle does not keep the timer alive: once a one-shot timer has fired
/// (or an interval has been cancelled) the handle dangles and every
/// operation on it is a no-op. Cancelling twice, or cancelling an expired
/// timer, is always safe.
#[derive(Clone)]
pub struct TimerHandle {
    shared: Weak<TimerShared>,
}

impl TimerHandle {
    /// Cancel the timer. Idempotent; the callback will not be invoked after
    /// this returns.
    pub fn cancel(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.cancelled.store(true, Ordering::Release);
            shared.notify.notify_waiters();
        }
    }

    /// Whether the timer is still armed.
    pub fn is_armed(&self) -> bool {
        self.shared
            .upgrade()
            .map(|s| !s.cancelled.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

/// Arm a one-shot timer on the given scheduler. The callback runs on the
/// scheduler after `ms` milliseconds unless the handle cancels it first; a
/// panicking callback is caught and logged.
pub fn set_timeout<F>(handle: &Handle, ms: u64, f: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let shared = Arc::new(TimerShared {
        cancelled: AtomicBool::new(false),
        notify: Notify::new(),
    });
    let timer = TimerHandle {
        shared: Arc::downgrade(&shared),
    };

    handle.spawn(async move {
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {
                if !shared.cancelled.load(Ordering::Acquire) {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
                        tracing::error!("timer callback panicked: {}", panic_message(&panic));
                    }
                }
            }
            _ = &mut notified => {}
        }
    });

    timer
}

/// Arm an interval timer on the given scheduler.
///
/// The callback receives its own handle so it can cancel itself. Each next
/// expiry is measured from completion of the previous callback. A panicking
/// callback cancels the interval.
pub fn set_interval<F>(handle: &Handle, ms: u64, mut f: F) -> TimerHandle
where
    F: FnMut(&TimerHandle) + Send + 'static,
{
    let shared = Arc::new(TimerShared {
        cancelled: AtomicBool::new(false),
        notify: Notify::new(),
    });
    let timer = TimerHandle {
        shared: Arc::downgrade(&shared),
    };
    let callback_handle = timer.clone();

    handle.spawn(async move {
        loop {
            let notified = shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                _ = &mut notified => break,
            }
            if shared.cancelled.load(Ordering::Acquire) {
                break;
            }
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| f(&callback_handle))) {
                tracing::error!(
                    "interval callback panicked, cancelling timer: {}",
                    panic_message(&panic)
                );
                break;
            }
        }
    });

    timer
}
