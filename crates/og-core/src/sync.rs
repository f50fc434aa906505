//! Worker quiescence tracking
//!
//! Save states may only be taken while the VU1 worker thread is idle. The
//! worker brackets each unit of work with a [`WorkGuard`]; the primary
//! thread blocks on [`Quiescence::wait_idle`] before touching worker state.

use parking_lot::{Condvar, Mutex};

/// Something the primary thread can wait on until the worker is idle
pub trait Quiescence {
    /// Block until no worker activity is in flight
    fn wait_idle(&self);
}

/// Quiescence source for runs without a worker thread
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWorker;

impl Quiescence for NoWorker {
    fn wait_idle(&self) {}
}

/// Busy counter plus condvar signalled when it drops to zero
#[derive(Debug, Default)]
pub struct WorkerIdleGate {
    busy: Mutex<u32>,
    idle: Condvar,
}

impl WorkerIdleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a unit of worker activity
    pub fn begin(&self) -> WorkGuard<'_> {
        *self.busy.lock() += 1;
        WorkGuard { gate: self }
    }

    /// Check without blocking
    pub fn is_idle(&self) -> bool {
        *self.busy.lock() == 0
    }

    fn end(&self) {
        let mut busy = self.busy.lock();
        *busy = busy.saturating_sub(1);
        if *busy == 0 {
            self.idle.notify_all();
        }
    }
}

impl Quiescence for WorkerIdleGate {
    fn wait_idle(&self) {
        let mut busy = self.busy.lock();
        while *busy != 0 {
            self.idle.wait(&mut busy);
        }
    }
}

/// Ends the bracketed work when dropped
#[must_use = "work ends as soon as the guard is dropped"]
pub struct WorkGuard<'a> {
    gate: &'a WorkerIdleGate,
}

impl Drop for WorkGuard<'_> {
    fn drop(&mut self) {
        self.gate.end();
    }
}
