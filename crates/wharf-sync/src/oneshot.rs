//! Single-value channel with strict send/receive-once semantics.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot as waitpoint;

use crate::error::{Result, SyncError};

struct State<T> {
    value: Option<T>,
    sent: bool,
    received: bool,
    sender_gone: bool,
    waiter: Option<waitpoint::Sender<()>>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

/// Create a oneshot channel.
pub fn channel<T>() -> (OneshotSender<T>, OneshotReceiver<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            value: None,
            sent: false,
            received: false,
            sender_gone: false,
            waiter: None,
        }),
    });
    (
        OneshotSender {
            shared: shared.clone(),
        },
        OneshotReceiver { shared },
    )
}

pub struct OneshotSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> OneshotSender<T> {
    /// Deliver the value. A second send fails with
    /// [`SyncError::AlreadySent`].
    pub fn send(&self, value: T) -> Result<()> {
        let waiter = {
            let mut state = self.shared.state.lock().expect("oneshot poisoned");
            if state.sent {
                return Err(SyncError::AlreadySent);
            }
            state.sent = true;
            state.value = Some(value);
            state.waiter.take()
        };
        if let Some(waiter) = waiter {
            let _ = waiter.send(());
        }
        Ok(())
    }
}

impl<T> Drop for OneshotSender<T> {
    fn drop(&mut self) {
        let waiter = {
            let mut state = self.shared.state.lock().expect("oneshot poisoned");
            state.sender_gone = true;
            state.waiter.take()
        };
        if let Some(waiter) = waiter {
            let _ = waiter.send(());
        }
    }
}

pub struct OneshotReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> OneshotReceiver<T> {
    /// Take the value, suspending until the send arrives.
    ///
    /// A second receive fails with [`SyncError::AlreadyReceived`]; a sender
    /// dropped without sending yields [`SyncError::Closed`].
    pub async fn recv(&mut self) -> Result<T> {
        loop {
            let waiter = {
                let mut state = self.shared.state.lock().expect("oneshot poisoned");
                if state.received {
                    return Err(SyncError::AlreadyReceived);
                }
                if let Some(value) = state.value.take() {
                    state.received = true;
                    return Ok(value);
                }
                if state.sender_gone {
                    return Err(SyncError::Closed);
                }
                let (tx, rx) = waitpoint::channel();
                state.waiter = Some(tx);
                rx
            };
            let _ = waiter.await;
        }
    }
}
