// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Background task primitives shared by every scheduled and blocking loop in
//! the crate (discovery announcer/sweeper, transport retransmit sweep, topic
//! expiry sweeps, network receive loops).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often a running worker rechecks its shutdown flag while sleeping
/// between ticks. Keeps `stop()` responsive without needing a condvar.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs `work` once per `period` on a dedicated thread until stopped.
///
/// `start`/`stop` are both idempotent: starting an already-running worker or
/// stopping an already-stopped one is a no-op.
pub struct ScheduledWorker {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl ScheduledWorker {
    /// Spawn the worker thread. `on_start` runs once before the first tick;
    /// `on_stop` runs once after the loop exits.
    pub fn spawn<F, W, S>(period: Duration, on_start: F, mut work: W, on_stop: S) -> Self
    where
        F: FnOnce() + Send + 'static,
        W: FnMut() + Send + 'static,
        S: FnOnce() + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_loop = Arc::clone(&shutdown);

        let handle = thread::spawn(move || {
            on_start();

            loop {
                if shutdown_loop.load(Ordering::Relaxed) {
                    break;
                }

                work();

                let sleep_end = Instant::now() + period;
                while Instant::now() < sleep_end {
                    if shutdown_loop.load(Ordering::Relaxed) {
                        break;
                    }
                    thread::sleep(SHUTDOWN_POLL_INTERVAL.min(period));
                }
            }

            on_stop();
        });

        Self {
            handle: Some(handle),
            shutdown,
        }
    }

    /// Signal the worker to stop and join its thread. Safe to call more than
    /// once; only the first call has an effect.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ScheduledWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs `work` in a tight loop, checking the shutdown flag between
/// iterations. `work` is expected to block internally (e.g. on a socket read
/// with its own deadline) so the loop doesn't spin the CPU.
pub struct BlockedWorker {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl BlockedWorker {
    /// Spawn the worker thread.
    pub fn spawn<F, W, S>(on_start: F, mut work: W, on_stop: S) -> Self
    where
        F: FnOnce() + Send + 'static,
        W: FnMut() + Send + 'static,
        S: FnOnce() + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_loop = Arc::clone(&shutdown);

        let handle = thread::spawn(move || {
            on_start();

            while !shutdown_loop.load(Ordering::Relaxed) {
                work();
            }

            on_stop();
        });

        Self {
            handle: Some(handle),
            shutdown,
        }
    }

    /// Signal the worker to stop and join its thread. The blocking `work`
    /// call in flight must itself observe a deadline for this to return
    /// promptly; it is not interrupted from the outside.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BlockedWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn scheduled_worker_ticks_and_stops() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_work = Arc::clone(&ticks);
        let started = Arc::new(AtomicBool::new(false));
        let started_flag = Arc::clone(&started);
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_flag = Arc::clone(&stopped);

        let mut worker = ScheduledWorker::spawn(
            Duration::from_millis(10),
            move || started_flag.store(true, Ordering::Relaxed),
            move || {
                ticks_work.fetch_add(1, Ordering::Relaxed);
            },
            move || stopped_flag.store(true, Ordering::Relaxed),
        );

        thread::sleep(Duration::from_millis(60));
        worker.stop();

        assert!(started.load(Ordering::Relaxed));
        assert!(stopped.load(Ordering::Relaxed));
        assert!(ticks.load(Ordering::Relaxed) >= 2);
    }

    #[test]
    fn scheduled_worker_stop_is_idempotent() {
        let mut worker = ScheduledWorker::spawn(Duration::from_millis(10), || {}, || {}, || {});
        worker.stop();
        worker.stop();
    }

    #[test]
    fn blocked_worker_runs_until_stopped() {
        let iterations = Arc::new(AtomicUsize::new(0));
        let iterations_work = Arc::clone(&iterations);

        let mut worker = BlockedWorker::spawn(
            || {},
            move || {
                iterations_work.fetch_add(1, Ordering::Relaxed);
                thread::sleep(Duration::from_millis(5));
            },
            || {},
        );

        thread::sleep(Duration::from_millis(60));
        worker.stop();

        assert!(iterations.load(Ordering::Relaxed) >= 2);
    }
}
