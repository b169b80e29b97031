//! # Wharf Sync
//!
//! Synchronization primitives for cooperative tasks: a condition variable,
//! a counting semaphore, a batching MPSC channel and a oneshot channel.
//!
//! All primitives share the same locking discipline: internal state lives
//! behind a plain mutex that is only ever held for state mutation, never
//! across a suspension point, and wake-ups are delivered outside the lock.
//! Suspended waiters may be resumed from any thread; they always resume on
//! the executor that spawned them.

pub mod condvar;
pub mod error;
pub mod mpsc;
pub mod oneshot;
pub mod semaphore;

pub use condvar::CondVar;
pub use error::{Result, SyncError};
pub use mpsc::{channel, Receiver, Sender};
pub use oneshot::{OneshotReceiver, OneshotSender};
pub use semaphore::Semaphore;
