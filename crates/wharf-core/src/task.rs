//! Suspension helpers: `async_sleep` and cross-executor `schedule`.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::{CoreError, Result};

/// Suspend the current task for `ms` milliseconds.
///
/// A non-positive duration still suspends: the task is re-posted onto the
/// scheduler so a single-threaded loop cannot be starved by a zero-length
/// sleep in a loop.
pub async fn async_sleep(ms: i64) {
    if ms <= 0 {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(Duration::from_millis(ms as u64)).await;
    }
}

/// Run `f` on `target`, suspending the calling task until it completes.
///
/// The call suspends twice: once to hand the closure to the target executor
/// and once to resume on the originating executor with the result. A panic
/// inside `f` is re-raised on the originating executor.
pub async fn schedule<F, T>(target: &Handle, f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    schedule_async(target, async move { f() }).await
}

/// [`schedule`] for futures: drive `future` to completion on `target` and
/// resume here with its output.
pub async fn schedule_async<Fut>(target: &Handle, future: Fut) -> Result<Fut::Output>
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    match target.spawn(future).await {
        Ok(value) => Ok(value),
        Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
        Err(join) => Err(CoreError::ExecutorGone {
            message: join.to_string(),
        }),
    }
}
