//! Common time helpers for hydro_core.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hydro_traits::Clock;

/// Slice used for all waits that must observe the shutdown flag.
pub const SHUTDOWN_POLL: Duration = Duration::from_millis(25);

/// Sleep for `total`, waking at least every `SHUTDOWN_POLL` to check the
/// shutdown flag. Returns true when the sleep was interrupted by shutdown.
pub fn sleep_interruptible(clock: &dyn Clock, total: Duration, shutdown: &Arc<AtomicBool>) -> bool {
    let start = clock.now();
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return true;
        }
        let elapsed = clock.now().saturating_duration_since(start);
        let Some(remaining) = total.checked_sub(elapsed) else {
            return false;
        };
        if remaining.is_zero() {
            return false;
        }
        clock.sleep(remaining.min(SHUTDOWN_POLL));
    }
}
