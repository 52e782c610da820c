use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// One-shot stop flag shared by timers, the callback listener and the CLI.
///
/// [`CancelToken::wait`] doubles as an interruptible sleep.
pub struct CancelToken {
    cancelled: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    /// Set the flag and wake every waiter
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // Take the lock so a waiter cannot miss the notification between
        // its flag check and its wait.
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep up to `duration`. Returns `true` when woken by cancellation.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }

        // A poisoned lock counts as cancelled
        let Ok(guard) = self.mutex.lock() else {
            return true;
        };
        self.condvar
            .wait_timeout_while(guard, duration, |_| !self.is_cancelled())
            .map(|(_, timeout)| !timeout.timed_out() || self.is_cancelled())
            .unwrap_or(true)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
