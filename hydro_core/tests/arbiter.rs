//! Mix-lease arbitration under contention.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hydro_core::arbiter::{LeaseDenied, ResourceArbiter};

#[test]
fn try_acquire_returns_busy_while_held() {
    let arbiter = ResourceArbiter::new(Arc::new(AtomicBool::new(false)));
    let lease = arbiter.acquire(None).unwrap();
    assert_eq!(
        arbiter.acquire(Some(Duration::ZERO)).unwrap_err(),
        LeaseDenied::Busy
    );
    drop(lease);
    assert!(arbiter.acquire(Some(Duration::ZERO)).is_ok());
}

#[test]
fn bounded_wait_times_out_as_busy() {
    let arbiter = ResourceArbiter::new(Arc::new(AtomicBool::new(false)));
    let _lease = arbiter.acquire(None).unwrap();
    let start = Instant::now();
    assert_eq!(
        arbiter.acquire(Some(Duration::from_millis(60))).unwrap_err(),
        LeaseDenied::Busy
    );
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(55), "returned after {waited:?}");
    assert!(waited < Duration::from_secs(2), "returned after {waited:?}");
}

#[test]
fn release_is_idempotent() {
    let arbiter = ResourceArbiter::new(Arc::new(AtomicBool::new(false)));
    let lease = arbiter.acquire(None).unwrap();
    lease.release();
    lease.release();
    drop(lease);
    assert!(arbiter.acquire(Some(Duration::ZERO)).is_ok());
}

#[test]
fn at_most_one_holder_across_threads() {
    let arbiter = ResourceArbiter::new(Arc::new(AtomicBool::new(false)));
    let holders = Arc::new(AtomicU32::new(0));
    let violations = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let arbiter = arbiter.clone();
        let holders = holders.clone();
        let violations = violations.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                let lease = arbiter.acquire(None).unwrap();
                if holders.fetch_add(1, Ordering::SeqCst) != 0 {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
                thread::yield_now();
                holders.fetch_sub(1, Ordering::SeqCst);
                drop(lease);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(violations.load(Ordering::SeqCst), 0);
}

#[test]
fn shutdown_preempts_unbounded_waiters() {
    let shutdown = Arc::new(AtomicBool::new(false));
    let arbiter = ResourceArbiter::new(shutdown.clone());
    let lease = arbiter.acquire(None).unwrap();

    let waiter = {
        let arbiter = arbiter.clone();
        thread::spawn(move || arbiter.acquire(None))
    };
    thread::sleep(Duration::from_millis(50));
    shutdown.store(true, Ordering::SeqCst);

    let start = Instant::now();
    let denied = waiter.join().unwrap().unwrap_err();
    assert_eq!(denied, LeaseDenied::Shutdown);
    assert!(start.elapsed() < Duration::from_secs(1));
    drop(lease);
}

#[test]
fn shutdown_denies_fresh_acquisitions() {
    let shutdown = Arc::new(AtomicBool::new(true));
    let arbiter = ResourceArbiter::new(shutdown);
    // Lease is free, so the wait loop is skipped entirely; the final flag
    // check must still deny.
    match arbiter.acquire(None) {
        Err(LeaseDenied::Shutdown) => {}
        other => panic!("expected shutdown denial, got {other:?}"),
    }
}
