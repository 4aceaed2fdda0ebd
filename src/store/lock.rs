//! Bounded-wait locking
//!
//! `std::sync::Mutex` has no timed acquire, so waits are a `try_lock` loop
//! against a deadline. The first few retries only yield; after that the
//! waiter sleeps between attempts so a long read bound does not spin a core.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

/// Retries that only yield before backing off to sleeps
const SPIN_RETRIES: u32 = 16;

/// Sleep between retries once backed off
const BACKOFF: Duration = Duration::from_micros(200);

/// Try to lock `mutex` for at most `wait`
///
/// A zero `wait` makes a single attempt. A poisoned lock is recovered: every
/// critical section guarded here leaves the data consistent.
pub(crate) fn lock_within<T>(mutex: &Mutex<T>, wait: Duration) -> Option<MutexGuard<'_, T>> {
    let deadline = Instant::now() + wait;
    let mut retries = 0u32;

    loop {
        match mutex.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => {
                tracing::warn!("recovering poisoned variable store lock");
                return Some(poisoned.into_inner());
            },
            Err(TryLockError::WouldBlock) => {
                let now = Instant::now();
                if now >= deadline {
                    return None;
                }
                if retries < SPIN_RETRIES {
                    retries += 1;
                    thread::yield_now();
                } else {
                    thread::sleep(BACKOFF.min(deadline - now));
                }
            },
        }
    }
}
