//! Executor pool: worker threads driving one shared cooperative scheduler.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{watch, Notify};

use crate::error::{CoreError, Result};
use crate::timer::{self, TimerHandle};

/// Executor pool configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Worker threads used when the runtime is built lazily (before
    /// [`ExecutorPool::run`] supplies an explicit count).
    pub workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
        }
    }
}

/// A pool of worker threads all polling one shared task scheduler.
///
/// Tasks spawned through the pool suspend cooperatively; the pool tracks the
/// number of live tasks so that [`run`](Self::run) can return once no work is
/// pending (unless a work-guard is requested). `shutdown` is idempotent and
/// may be called concurrently with `run`, from any thread or from inside a
/// task. Dropping the pool joins all worker threads; drop it from
/// synchronous context.
pub struct ExecutorPool {
    state: Mutex<Option<Runtime>>,
    config: ExecutorConfig,
    stopped: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl ExecutorPool {
    /// Create a pool with default configuration. No threads are started
    /// until work is submitted or [`run`](Self::run) is called.
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            state: Mutex::new(None),
            config,
            stopped: AtomicBool::new(false),
            shutdown_tx,
            shutdown_rx,
            active: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Raw access to the underlying scheduler handle for low-level
    /// integration (binding sockets, driving foreign futures, ...).
    pub fn handle(&self) -> Handle {
        self.ensure_runtime(self.config.workers)
    }

    fn ensure_runtime(&self, workers: usize) -> Handle {
        let mut state = self.state.lock().expect("executor state poisoned");
        if state.is_none() {
            let runtime = Builder::new_multi_thread()
                .worker_threads(workers.max(1))
                .thread_name("wharf-worker")
                .enable_all()
                .build()
                .expect("failed to build executor runtime");
            *state = Some(runtime);
        }
        state.as_ref().map(|rt| rt.handle().clone()).unwrap()
    }

    /// Drive the pool from the calling thread.
    ///
    /// Starts the scheduler with `workers` threads (the count applies when
    /// this call is the one that builds the runtime) and parks the caller
    /// until either [`shutdown`](Self::shutdown) is invoked or, when
    /// `with_guard` is false, no spawned work remains pending. With
    /// `with_guard = true` the loop is kept alive even while idle.
    pub fn run(&self, workers: usize, with_guard: bool) {
        if self.stopped.load(Ordering::Relaxed) {
            return;
        }

        let handle = self.ensure_runtime(workers);
        let mut shutdown = self.shutdown_rx.clone();
        let active = self.active.clone();
        let idle = self.idle.clone();

        handle.block_on(async move {
            loop {
                // Register the idle waiter before inspecting the counters so
                // a task finishing in between still wakes this loop.
                let notified = idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if *shutdown.borrow() {
                    break;
                }
                if !with_guard && active.load(Ordering::SeqCst) == 0 {
                    break;
                }
                tokio::select! {
                    _ = &mut notified => {}
                    _ = shutdown.changed() => {}
                }
            }
        });
    }

    /// Attach a task to the pool. A panicking task is caught and reported
    /// through the default logging completion.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_with(future, |outcome| {
            if let Err(panic) = outcome {
                tracing::error!("error in spawned task: {}", panic_message(&panic));
            }
        });
    }

    /// Attach a fallible task, logging its `Err` outcome.
    pub fn spawn_logged<F, E>(&self, future: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        self.spawn_with(future, |outcome| match outcome {
            Ok(Err(e)) => tracing::error!("error in spawned task: {e}"),
            Err(panic) => tracing::error!("error in spawned task: {}", panic_message(&panic)),
            Ok(Ok(())) => {}
        });
    }

    /// Attach a task and forward its outcome (value or caught panic) to the
    /// given completion. The completion runs on the pool.
    pub fn spawn_with<T, F, C>(&self, future: F, completion: C)
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
        C: FnOnce(std::thread::Result<T>) + Send + 'static,
    {
        let active = self.active.clone();
        let idle = self.idle.clone();
        active.fetch_add(1, Ordering::SeqCst);

        self.handle().spawn(async move {
            let outcome = AssertUnwindSafe(future).catch_unwind().await;
            completion(outcome);
            if active.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_waiters();
            }
        });
    }

    /// Post a plain closure onto the scheduler.
    pub fn enqueue<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(async move { f() });
    }

    /// Arm a one-shot timer. See [`timer::set_timeout`].
    pub fn set_timeout<F>(&self, ms: u64, f: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        timer::set_timeout(&self.handle(), ms, f)
    }

    /// Arm a rescheduling interval timer. See [`timer::set_interval`].
    pub fn set_interval<F>(&self, ms: u64, f: F) -> TimerHandle
    where
        F: FnMut(&TimerHandle) + Send + 'static,
    {
        timer::set_interval(&self.handle(), ms, f)
    }

    /// Cancel a timer. Idempotent; accepts handles to already-expired
    /// timers.
    pub fn clear_timeout(&self, handle: &TimerHandle) {
        handle.cancel();
    }

    /// Alias of [`clear_timeout`](Self::clear_timeout) for interval timers.
    pub fn clear_interval(&self, handle: &TimerHandle) {
        handle.cancel();
    }

    /// Block the calling (non-async) thread on a future driven by the pool.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle().block_on(future)
    }

    /// Stop the loop and drop the work-guard. Idempotent; safe to call
    /// concurrently with [`run`](Self::run) and from inside a task.
    pub fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            let _ = self.shutdown_tx.send(true);
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Guard spawns against a shut-down pool.
    pub fn check_running(&self) -> Result<()> {
        if self.is_shutdown() {
            Err(CoreError::Shutdown)
        } else {
            Ok(())
        }
    }
}

impl Default for ExecutorPool {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("opaque panic payload")
}
