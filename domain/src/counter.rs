//! Shared completion counter bridging asynchronous hook firings into a
//! synchronously awaitable condition.

use std::sync::{Condvar, Mutex, MutexGuard};

/// Down-counter that signals waiters once its pending count reaches zero.
///
/// Producers (mutation hooks) call [`done`](CompletionCounter::done); the
/// consumer blocks in [`wait`](CompletionCounter::wait). Arm the counter
/// with [`add`](CompletionCounter::add) before waiting; arming is additive,
/// so several expectations can chain onto one counter. Ownership is shared
/// between the producing hooks and the single waiting test thread.
#[derive(Debug, Default)]
pub struct CompletionCounter {
    pending: Mutex<u64>,
    zeroed: Condvar,
}

impl CompletionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic elsewhere cannot leave the count torn; keep going on poison.
    fn lock(&self) -> MutexGuard<'_, u64> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Arm the counter with `n` more pending completions.
    pub fn add(&self, n: u64) {
        *self.lock() += n;
    }

    /// Record one completion, waking waiters when the count reaches zero.
    /// Saturates instead of underflowing when already satisfied.
    pub fn done(&self) {
        let mut pending = self.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.zeroed.notify_all();
        }
    }

    /// Block the calling thread until the pending count reaches zero.
    pub fn wait(&self) {
        let mut pending = self.lock();
        while *pending > 0 {
            pending = self.zeroed.wait(pending).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Whether the pending count is zero.
    pub fn is_satisfied(&self) -> bool {
        *self.lock() == 0
    }

    /// Completions still outstanding.
    pub fn pending(&self) -> u64 {
        *self.lock()
    }
}
