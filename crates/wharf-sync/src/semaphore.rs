//! Counting semaphore with FIFO waiters.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;

struct State {
    permits: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// A counting semaphore for cooperative tasks.
///
/// `acquire` decrements the count or parks the task; `release` hands the
/// permit to the oldest live waiter or increments the count. Waiters whose
/// task has been cancelled are skipped on release.
pub struct Semaphore {
    state: Mutex<State>,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State {
                permits,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Take a permit, suspending until one is available.
    pub async fn acquire(&self) {
        let waiter = {
            let mut state = self.state.lock().expect("semaphore poisoned");
            if state.permits > 0 {
                state.permits -= 1;
                return;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };
        // Err only if the semaphore itself was dropped; nothing to hold then.
        let _ = waiter.await;
    }

    /// Return a permit, resuming the head waiter when one is parked.
    pub fn release(&self) {
        loop {
            let winner = {
                let mut state = self.state.lock().expect("semaphore poisoned");
                match state.waiters.pop_front() {
                    Some(waiter) => waiter,
                    None => {
                        state.permits += 1;
                        return;
                    }
                }
            };
            if winner.send(()).is_ok() {
                return;
            }
            // that waiter's task is gone; hand the permit to the next one
        }
    }

    /// Current free permit count.
    pub fn available_permits(&self) -> usize {
        self.state.lock().expect("semaphore poisoned").permits
    }
}
