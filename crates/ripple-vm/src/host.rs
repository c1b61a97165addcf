//! Embedder callbacks.
//!
//! The core needs exactly three things from its host: a monotonic clock,
//! a way to sleep, and an interrupt flag polled between program steps.
//! Hosts must not touch the heap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub trait Host {
    /// Monotonic milliseconds.
    fn ticks(&self) -> u64;

    /// Block the caller for `ms` milliseconds.
    fn sleep(&self, ms: u64);

    /// Has the user requested an interrupt? Checked between program
    /// children; a set flag aborts evaluation at the next checkpoint.
    fn interrupt_pending(&self) -> bool;
}

/// Host backed by the operating system clock.
pub struct SystemHost {
    epoch: Instant,
    interrupt: Arc<AtomicBool>,
}

impl SystemHost {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The interrupt flag, to be set from a signal handler or another
    /// thread.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SystemHost {
    fn ticks(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn sleep(&self, ms: u64) {
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }

    fn interrupt_pending(&self) -> bool {
        self.interrupt.swap(false, Ordering::Relaxed)
    }
}

/// Deterministic host for tests: a hand-advanced clock and an interrupt
/// that fires after a set number of polls.
pub struct TestHost {
    pub now: std::cell::Cell<u64>,
    pub slept: std::cell::Cell<u64>,
    /// Fire the interrupt on the nth poll (0 = never).
    pub interrupt_after: std::cell::Cell<u64>,
    polls: std::cell::Cell<u64>,
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            now: std::cell::Cell::new(0),
            slept: std::cell::Cell::new(0),
            interrupt_after: std::cell::Cell::new(0),
            polls: std::cell::Cell::new(0),
        }
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for TestHost {
    fn ticks(&self) -> u64 {
        self.now.get()
    }

    fn sleep(&self, ms: u64) {
        self.slept.set(self.slept.get() + ms);
        self.now.set(self.now.get() + ms);
    }

    fn interrupt_pending(&self) -> bool {
        let after = self.interrupt_after.get();
        if after == 0 {
            return false;
        }
        self.polls.set(self.polls.get() + 1);
        self.polls.get() >= after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_host_ticks_are_monotonic() {
        let host = SystemHost::new();
        let a = host.ticks();
        let b = host.ticks();
        assert!(b >= a);
    }

    #[test]
    fn test_host_counts_sleep() {
        let host = TestHost::new();
        host.sleep(250);
        host.sleep(250);
        assert_eq!(host.slept.get(), 500);
        assert_eq!(host.ticks(), 500);
    }

    #[test]
    fn test_host_interrupt_fires_on_schedule() {
        let host = TestHost::new();
        assert!(!host.interrupt_pending());
        host.interrupt_after.set(3);
        assert!(!host.interrupt_pending());
        assert!(!host.interrupt_pending());
        assert!(host.interrupt_pending());
    }
}
