//! Multi-producer single-consumer channel with batch receive.
//!
//! The receiver drains the entire queued backlog in one resumption, which
//! keeps scheduler wake-ups proportional to bursts rather than to items.
//! Ordering is FIFO per sender; there is no cross-sender guarantee.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::{Result, SyncError};

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
    receiver_gone: bool,
    senders: usize,
    waiter: Option<oneshot::Sender<()>>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

impl<T> Shared<T> {
    fn wake_receiver(waiter: Option<oneshot::Sender<()>>) {
        if let Some(waiter) = waiter {
            let _ = waiter.send(());
        }
    }
}

/// Create an unbounded MPSC channel.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            queue: VecDeque::new(),
            closed: false,
            receiver_gone: false,
            senders: 1,
            waiter: None,
        }),
    });
    (
        Sender {
            shared: shared.clone(),
        },
        Receiver { shared },
    )
}

/// Cloneable sending handle. Dropping the last sender closes the channel.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// Queue an item. Fails once the receiver is gone or the channel was
    /// closed explicitly.
    pub fn send(&self, item: T) -> Result<()> {
        let waiter = {
            let mut state = self.shared.state.lock().expect("channel poisoned");
            if state.closed || state.receiver_gone {
                return Err(SyncError::Closed);
            }
            state.queue.push_back(item);
            state.waiter.take()
        };
        Shared::<T>::wake_receiver(waiter);
        Ok(())
    }

    /// Close the channel explicitly. Queued items remain receivable.
    pub fn close(&self) {
        let waiter = {
            let mut state = self.shared.state.lock().expect("channel poisoned");
            state.closed = true;
            state.waiter.take()
        };
        Shared::<T>::wake_receiver(waiter);
    }

    /// Number of live sender handles.
    pub fn sender_count(&self) -> usize {
        self.shared.state.lock().expect("channel poisoned").senders
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.state.lock().expect("channel poisoned").senders += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let waiter = {
            let mut state = self.shared.state.lock().expect("channel poisoned");
            state.senders -= 1;
            if state.senders == 0 {
                state.closed = true;
                state.waiter.take()
            } else {
                None
            }
        };
        Shared::<T>::wake_receiver(waiter);
    }
}

/// Receiving handle. Move-only: exactly one consumer owns the stream.
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// Receive the entire currently-queued batch.
    ///
    /// Suspends while the queue is empty and the channel open. An empty
    /// batch signals that every sender is gone (or `close` was called) and
    /// the backlog is drained: end of stream.
    pub async fn recv(&mut self) -> Vec<T> {
        loop {
            let waiter = {
                let mut state = self.shared.state.lock().expect("channel poisoned");
                if !state.queue.is_empty() {
                    return state.queue.drain(..).collect();
                }
                if state.closed {
                    return Vec::new();
                }
                let (tx, rx) = oneshot::channel();
                state.waiter = Some(tx);
                rx
            };
            // a send, close or last-sender drop resolves this
            let _ = waiter.await;
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock().expect("channel poisoned");
        state.receiver_gone = true;
        state.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn batches_preserve_per_sender_order() {
        let (tx_a, mut rx) = channel::<u32>();
        let tx_b = tx_a.clone();

        tokio::spawn(async move {
            for v in [1, 2, 3] {
                tx_a.send(v).unwrap();
            }
        });
        tokio::spawn(async move {
            for v in [4, 5] {
                tx_b.send(v).unwrap();
            }
        });

        let mut seen = Vec::new();
        loop {
            let batch = rx.recv().await;
            if batch.is_empty() {
                break;
            }
            seen.extend(batch);
        }

        let mut sorted = seen.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3, 4, 5]);

        let a_items: Vec<u32> = seen.iter().copied().filter(|v| *v <= 3).collect();
        let b_items: Vec<u32> = seen.iter().copied().filter(|v| *v >= 4).collect();
        assert_eq!(a_items, vec![1, 2, 3]);
        assert_eq!(b_items, vec![4, 5]);
    }

    #[tokio::test]
    async fn recv_returns_whole_backlog_at_once() {
        let (tx, mut rx) = channel::<u32>();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.send(3).unwrap();
        assert_eq!(rx.recv().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn dropping_last_sender_ends_the_stream() {
        let (tx, mut rx) = channel::<u32>();
        let tx2 = tx.clone();
        assert_eq!(tx.sender_count(), 2);
        tx.send(9).unwrap();
        drop(tx);
        drop(tx2);
        assert_eq!(rx.recv().await, vec![9]);
        assert_eq!(rx.recv().await, Vec::<u32>::new());
    }

    #[tokio::test]
    async fn explicit_close_ends_the_stream() {
        let (tx, mut rx) = channel::<u32>();
        tx.close();
        assert!(rx.recv().await.is_empty());
        assert_eq!(tx.send(1), Err(SyncError::Closed));
    }

    #[tokio::test]
    async fn send_fails_after_receiver_drop() {
        let (tx, rx) = channel::<u32>();
        drop(rx);
        assert_eq!(tx.send(1), Err(SyncError::Closed));
    }

    #[tokio::test]
    async fn recv_suspends_until_a_send_arrives() {
        let (tx, mut rx) = channel::<u32>();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            tx.send(7).unwrap();
        });
        assert_eq!(rx.recv().await, vec![7]);
    }
}
