//! Exclusive lease over the shared mix pump.
//!
//! Dosing always mixes afterwards, and the mix pump is shared with the
//! environmental cycle, so every holder goes through here. At most one
//! `MixLease` exists at any instant; waiting is sliced so a shutdown request
//! pre-empts even an unbounded wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::util::SHUTDOWN_POLL;

/// Why `acquire` returned without a lease. `Busy` is an expected outcome for
/// opportunistic callers, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseDenied {
    Busy,
    Shutdown,
}

#[derive(Debug)]
struct Inner {
    held: Mutex<bool>,
    cv: Condvar,
    shutdown: Arc<AtomicBool>,
}

impl Inner {
    fn lock_held(&self) -> MutexGuard<'_, bool> {
        // A poisoned lock only means another holder panicked; the bool is
        // still meaningful.
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Hands out at most one `MixLease` at a time across all threads.
#[derive(Debug, Clone)]
pub struct ResourceArbiter {
    inner: Arc<Inner>,
}

impl ResourceArbiter {
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self {
            inner: Arc::new(Inner {
                held: Mutex::new(false),
                cv: Condvar::new(),
                shutdown,
            }),
        }
    }

    /// Acquire the lease.
    ///
    /// `timeout = None` waits unboundedly (shutdown still pre-empts);
    /// `Some(Duration::ZERO)` is a try-acquire that returns `Busy`
    /// immediately when held.
    pub fn acquire(&self, timeout: Option<Duration>) -> Result<MixLease, LeaseDenied> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut held = self.inner.lock_held();
        while *held {
            if self.inner.shutdown.load(Ordering::SeqCst) {
                return Err(LeaseDenied::Shutdown);
            }
            let mut slice = SHUTDOWN_POLL;
            if let Some(deadline) = deadline {
                let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                    return Err(LeaseDenied::Busy);
                };
                if remaining.is_zero() {
                    return Err(LeaseDenied::Busy);
                }
                slice = slice.min(remaining);
            }
            let (guard, _timed_out) = self
                .inner
                .cv
                .wait_timeout(held, slice)
                .unwrap_or_else(|e| e.into_inner());
            held = guard;
        }
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return Err(LeaseDenied::Shutdown);
        }
        *held = true;
        debug!("mix lease acquired");
        Ok(MixLease {
            inner: Arc::clone(&self.inner),
            released: AtomicBool::new(false),
        })
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self) -> bool {
        *self.inner.lock_held()
    }
}

/// RAII lease over the mix pump; released on drop.
#[derive(Debug)]
pub struct MixLease {
    inner: Arc<Inner>,
    released: AtomicBool,
}

impl MixLease {
    /// Release early. Idempotent; dropping afterwards is a no-op.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut held = self.inner.lock_held();
        *held = false;
        drop(held);
        self.inner.cv.notify_one();
        debug!("mix lease released");
    }
}

impl Drop for MixLease {
    fn drop(&mut self) {
        self.release();
    }
}
