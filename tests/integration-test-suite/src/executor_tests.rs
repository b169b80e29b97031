//! Executor pool, timer and helper behavior across runtimes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use wharf_core::{async_sleep, schedule, ExecutorPool};

#[test]
fn pool_drives_spawned_work_to_completion() {
    let pool = ExecutorPool::new();
    let hits = Arc::new(AtomicUsize::new(0));

    for _ in 0..8 {
        let hits = hits.clone();
        pool.spawn(async move {
            async_sleep(10).await;
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    pool.run(4, false);
    assert_eq!(hits.load(Ordering::SeqCst), 8);
}

#[test]
fn zero_sleep_yields_instead_of_deadlocking() {
    let pool = ExecutorPool::new();
    let done = Arc::new(AtomicUsize::new(0));
    let flag = done.clone();
    pool.spawn(async move {
        for _ in 0..100 {
            async_sleep(0).await;
        }
        flag.fetch_add(1, Ordering::SeqCst);
    });
    pool.run(1, false);
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn cleared_interval_stops_firing() {
    let pool = ExecutorPool::new();
    let ticks = Arc::new(AtomicUsize::new(0));

    let counter = ticks.clone();
    let timer = pool.set_timeout(0, || {});
    drop(timer);

    let counter_timer = pool.set_interval(15, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let pool = Arc::new(pool);
    let stopper = pool.clone();
    let observed = Arc::new(AtomicUsize::new(0));
    let observed_in_task = observed.clone();
    let ticks_in_task = ticks.clone();
    pool.spawn(async move {
        async_sleep(80).await;
        stopper.clear_interval(&counter_timer);
        let frozen = ticks_in_task.load(Ordering::SeqCst);
        async_sleep(100).await;
        // no further invocation after clear_interval returned
        assert_eq!(ticks_in_task.load(Ordering::SeqCst), frozen);
        observed_in_task.store(frozen.max(1), Ordering::SeqCst);
    });
    pool.run(2, false);
    assert!(observed.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn schedule_crosses_executors_and_comes_back() {
    let worker = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("side-executor")
        .enable_all()
        .build()
        .unwrap();

    let caller_thread = std::thread::current().id();
    let side = schedule(worker.handle(), || {
        std::thread::current()
            .name()
            .unwrap_or_default()
            .to_string()
    })
    .await
    .unwrap();
    assert_eq!(side, "side-executor");
    // resumed back on the test runtime, not the side executor
    assert_eq!(std::thread::current().id(), caller_thread);

    worker.shutdown_background();
}

#[tokio::test]
async fn interval_reschedules_from_callback_completion() {
    let handle = tokio::runtime::Handle::current();
    let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = stamps.clone();
    let timer = wharf_core::timer::set_interval(&handle, 30, move |_| {
        recorder.lock().unwrap().push(Instant::now());
        // simulate a slow callback: the next expiry is measured from here
        std::thread::sleep(Duration::from_millis(30));
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    timer.cancel();

    let stamps = stamps.lock().unwrap();
    assert!(stamps.len() >= 2);
    for pair in stamps.windows(2) {
        // interval + callback time, never just the interval
        assert!(pair[1] - pair[0] >= Duration::from_millis(55));
    }
}
