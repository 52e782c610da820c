//! Scheduling primitives.
//!
//! - **Cancellation**: [`CancelToken`] with interruptible waits
//! - **Timers**: repeating and one-shot timer threads owned by a [`TaskHandle`],
//!   and [`TimerSlot`] for the cancel-and-replace pattern
//! - **Fan-out**: [`WorkerPool`] that serializes jobs sharing a key

mod pool;
mod signal;
mod timer;

pub use pool::WorkerPool;
pub use signal::CancelToken;
pub use timer::{TaskHandle, TimerSlot, spawn_once, spawn_repeating};
