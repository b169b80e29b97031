//! # Wharf Core
//!
//! Executor pool, timers and task helpers for the Wharf toolkit.
//!
//! This crate owns the cooperative scheduling substrate every other Wharf
//! crate builds on:
//!
//! - **Executor pool**: a pool of worker threads driving one shared task
//!   scheduler, with an optional work-guard that keeps the loop alive while
//!   no work is pending ([`ExecutorPool`])
//! - **Timers**: one-shot and self-rescheduling interval timers addressed
//!   through weak, idempotent cancellation handles ([`TimerHandle`])
//! - **Task helpers**: [`async_sleep`], cross-executor [`schedule`], and
//!   cooperative cancellation via [`CancelToken`]
//!
//! ## Usage
//!
//! ```no_run
//! use wharf_core::{ExecutorPool, async_sleep};
//!
//! let pool = ExecutorPool::new();
//! pool.spawn(async {
//!     async_sleep(100).await;
//!     tracing::info!("tick");
//! });
//! pool.run(4, false);
//! ```
//!
//! Handlers written against this crate suspend only at explicit suspension
//! points (timers, I/O, channels, `schedule`); everything between two
//! suspension points runs without interleaving on the owning task.

pub mod cancel;
pub mod error;
pub mod executor;
pub mod task;
pub mod timer;

pub use cancel::CancelToken;
pub use error::{CoreError, Result};
pub use executor::{ExecutorConfig, ExecutorPool};
pub use task::{async_sleep, schedule, schedule_async};
pub use timer::TimerHandle;
