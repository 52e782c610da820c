use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Count of queued and running jobs, used by [`WorkerPool::wait_idle`]
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn increment(&self) {
        if let Ok(mut count) = self.count.lock() {
            *count += 1;
        }
    }

    fn decrement(&self) {
        if let Ok(mut count) = self.count.lock() {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.idle.notify_all();
            }
        }
    }
}

/// Fixed-size pool of worker threads.
///
/// Jobs submitted with the same key always run on the same worker, in
/// submission order, so two jobs for one destination never run concurrently.
pub struct WorkerPool {
    senders: Vec<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl WorkerPool {
    pub fn new(name: &str, size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let pending = Arc::new(Pending::default());
        let mut senders = Vec::with_capacity(size);
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let (tx, rx) = mpsc::channel::<Job>();
            let pending = Arc::clone(&pending);
            let worker = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("Worker job panicked");
                        }
                        pending.decrement();
                    }
                })?;
            senders.push(tx);
            workers.push(worker);
        }

        debug!("Started worker pool '{}' with {} threads", name, size);
        Ok(Self {
            senders,
            workers,
            pending,
        })
    }

    pub fn size(&self) -> usize {
        self.senders.len()
    }

    /// Queue `job` on the worker owning `key`
    pub fn execute<K, F>(&self, key: &K, job: F)
    where
        K: Hash + ?Sized,
        F: FnOnce() + Send + 'static,
    {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.senders.len() as u64) as usize;

        self.pending.increment();
        if self.senders[index].send(Box::new(job)).is_err() {
            error!("Worker {} is gone, dropping job", index);
            self.pending.decrement();
        }
    }

    /// Block until every queued job has finished or `timeout` elapses.
    ///
    /// Returns `true` if the pool is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let Ok(mut count) = self.pending.count.lock() else {
            return false;
        };
        while *count > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            count = match self.pending.idle.wait_timeout(count, remaining) {
                Ok((guard, _)) => guard,
                Err(_) => return false,
            };
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channels lets workers drain what is queued and exit
        self.senders.clear();
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            if worker.thread().id() != current {
                let _ = worker.join();
            }
        }
    }
}
