use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::CancelToken;

/// Handle to a scheduled timer thread.
///
/// Cancelling only prevents future firings; a callback that is already
/// running finishes normally. Dropping the handle cancels the timer.
pub struct TaskHandle {
    name: String,
    token: Arc<CancelToken>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            trace!("Cancelling timer '{}'", self.name);
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Spawn a timer thread that calls `task` every `interval`, after `initial_delay`.
///
/// Firings never overlap: when a call takes longer than the interval the next
/// one starts right after it instead of catching up on missed firings.
pub fn spawn_repeating<F>(
    name: &str,
    initial_delay: Duration,
    interval: Duration,
    mut task: F,
) -> io::Result<TaskHandle>
where
    F: FnMut() + Send + 'static,
{
    let token = Arc::new(CancelToken::new());
    let thread_token = Arc::clone(&token);
    let interval = interval.max(Duration::from_millis(1));

    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let mut next = Instant::now() + initial_delay;
            loop {
                let wait = next.saturating_duration_since(Instant::now());
                if thread_token.wait(wait) {
                    break;
                }
                task();
                next = (next + interval).max(Instant::now());
            }
        })?;

    debug!(
        "Started timer '{}' (interval {}ms, initial delay {}ms)",
        name,
        interval.as_millis(),
        initial_delay.as_millis()
    );

    Ok(TaskHandle {
        name: name.to_string(),
        token,
    })
}

/// Spawn a timer thread that calls `task` once after `delay`.
pub fn spawn_once<F>(name: &str, delay: Duration, task: F) -> io::Result<TaskHandle>
where
    F: FnOnce() + Send + 'static,
{
    let token = Arc::new(CancelToken::new());
    let thread_token = Arc::clone(&token);

    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            if !thread_token.wait(delay) {
                task();
            }
        })?;

    Ok(TaskHandle {
        name: name.to_string(),
        token,
    })
}

/// Holds at most one live timer.
///
/// Scheduling a new timer cancels the pending one under the same lock, so a
/// concurrent reschedule can never leave two timers alive.
#[derive(Default)]
pub struct TimerSlot {
    current: Mutex<Option<TaskHandle>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the current timer (if any) and install the one produced by `spawn`.
    pub fn replace_with<F>(&self, spawn: F) -> io::Result<()>
    where
        F: FnOnce() -> io::Result<TaskHandle>,
    {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = current.take() {
            old.cancel();
        }
        *current = Some(spawn()?);
        Ok(())
    }

    /// Cancel the current timer. Returns `true` if a live timer was cancelled.
    pub fn cancel(&self) -> bool {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match current.take() {
            Some(handle) => {
                let was_live = !handle.is_cancelled();
                handle.cancel();
                was_live
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current
            .lock()
            .map(|current| current.as_ref().is_some_and(|h| !h.is_cancelled()))
            .unwrap_or(false)
    }
}
