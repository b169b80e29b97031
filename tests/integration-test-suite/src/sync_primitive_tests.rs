//! End-to-end behavior of the sync primitives under real task scheduling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use wharf_sync::{mpsc, oneshot, CondVar, Semaphore, SyncError};

#[tokio::test]
async fn mpsc_two_senders_drain_in_per_sender_order() {
    let (tx_a, mut rx) = mpsc::channel::<u32>();
    let tx_b = tx_a.clone();

    let a = tokio::spawn(async move {
        for v in [1, 2, 3] {
            tx_a.send(v).unwrap();
            tokio::task::yield_now().await;
        }
    });
    let b = tokio::spawn(async move {
        for v in [4, 5] {
            tx_b.send(v).unwrap();
            tokio::task::yield_now().await;
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
    a.await.unwrap();
    b.await.unwrap();

    let mut sorted = seen.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2, 3, 4, 5]);
    let a_order: Vec<u32> = seen.iter().copied().filter(|v| *v <= 3).collect();
    let b_order: Vec<u32> = seen.iter().copied().filter(|v| *v >= 4).collect();
    assert_eq!(a_order, vec![1, 2, 3]);
    assert_eq!(b_order, vec![4, 5]);

    // the stream stays ended
    assert!(rx.recv().await.is_empty());
}

#[tokio::test]
async fn semaphore_two_permits_four_holders() {
    let sem = Arc::new(Semaphore::new(2));
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let finish_order = Arc::new(Mutex::new(Vec::new()));

    let started = Instant::now();
    let mut tasks = Vec::new();
    for id in 0..4u32 {
        let sem = sem.clone();
        let live = live.clone();
        let peak = peak.clone();
        let finish_order = finish_order.clone();
        tasks.push(tokio::spawn(async move {
            sem.acquire().await;
            let now = live.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            live.fetch_sub(1, Ordering::SeqCst);
            finish_order.lock().unwrap().push(id);
            sem.release();
        }));
        // stagger spawns so the waiter queue order is deterministic
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    for task in tasks {
        task.await.unwrap();
    }

    let elapsed = started.elapsed();
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert!(elapsed >= Duration::from_millis(95));
    assert!(elapsed < Duration::from_millis(400));

    // the first two acquirers finish before the two that had to wait
    let order = finish_order.lock().unwrap();
    assert!(order[0] < 2);
    assert!(order[1] < 2);
}

#[tokio::test]
async fn condvar_timeout_and_notify_race() {
    let cv = Arc::new(CondVar::new());

    // no notifier: the timeout fires
    let started = Instant::now();
    assert!(cv.wait_until(100).await);
    assert!(started.elapsed() >= Duration::from_millis(90));

    // a notifier at 200ms beats a 1000ms timeout
    let notifier = cv.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        notifier.notify_all();
    });
    let started = Instant::now();
    assert!(!cv.wait_until(1000).await);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(150));
    assert!(elapsed < Duration::from_millis(900));
}

#[tokio::test]
async fn oneshot_exactly_once_semantics() {
    let (tx, mut rx) = oneshot::channel();

    let sender = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(99u64).unwrap();
        assert_eq!(tx.send(100), Err(SyncError::AlreadySent));
    });

    assert_eq!(rx.recv().await.unwrap(), 99);
    assert_eq!(rx.recv().await, Err(SyncError::AlreadyReceived));
    sender.await.unwrap();
}
