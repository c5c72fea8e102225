// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded callback dispatcher.
//!
//! Every layer that invokes user or cross-layer callbacks (network receive
//! fan-out, discovery `onAdded`/`onRemoved`, topic subscription delivery)
//! submits the invocation here instead of spawning a thread per callback.
//! The dispatcher owns a small fixed pool of worker threads pulling from a
//! bounded channel; submission never blocks the caller's I/O loop, and a
//! full queue drops the job with a warning rather than applying backpressure.

use crossbeam::channel::{bounded, Sender, TrySendError};
use std::thread::{self, JoinHandle};

use crate::config::{DISPATCH_POOL_SIZE, DISPATCH_QUEUE_CAPACITY};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size worker pool for running user callbacks off the caller's
/// thread.
pub struct Dispatcher {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Build a dispatcher with [`DISPATCH_POOL_SIZE`] workers and a queue
    /// capacity of [`DISPATCH_QUEUE_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DISPATCH_POOL_SIZE, DISPATCH_QUEUE_CAPACITY)
    }

    /// Build a dispatcher with an explicit pool size and queue capacity.
    pub fn with_capacity(pool_size: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let workers = (0..pool_size.max(1))
            .map(|_| {
                let rx = rx.clone();
                thread::spawn(move || {
                    for job in rx {
                        job();
                    }
                })
            })
            .collect();

        Self { tx, workers }
    }

    /// Submit a job. If the queue is full, the job is dropped and a warning
    /// is logged; the caller's I/O loop is never blocked waiting for room.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(Box::new(job)) {
            log::warn!("dispatcher queue full, dropping callback invocation");
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Dropping `tx` closes the channel; worker threads exit their `for
        // job in rx` loop once drained and we join them here.
        let Dispatcher { workers, .. } = std::mem::replace(
            self,
            Dispatcher {
                tx: bounded(0).0,
                workers: Vec::new(),
            },
        );
        for handle in workers {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn submitted_jobs_run() {
        let dispatcher = Dispatcher::with_capacity(2, 16);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            dispatcher.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        thread::sleep(Duration::from_millis(100));
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let dispatcher = Dispatcher::with_capacity(1, 1);
        let gate = Arc::new(std::sync::Mutex::new(()));
        let held = gate.lock().unwrap();

        let gate_job = Arc::clone(&gate);
        dispatcher.submit(move || {
            let _ = gate_job.lock().unwrap();
        });

        // Give the worker a chance to pick up the blocking job.
        thread::sleep(Duration::from_millis(20));

        // These should not block the calling thread even though the one
        // worker is stuck waiting on `gate`.
        for _ in 0..5 {
            dispatcher.submit(|| {});
        }

        drop(held);
    }
}
