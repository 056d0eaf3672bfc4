//! Cooperative cancellation
//!
//! A [`Task`] is polled at every cancellation point (instruction fetch, sleep
//! slice, lock wait). Stopping is a request, never an interruption: the owner
//! notices it at its next poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct Task {
    /// Set once a stop has been requested
    signal: Arc<AtomicBool>,
    /// Cleared the first time a poll observes the signal
    running: AtomicBool,
}

impl Task {
    pub fn new() -> Self {
        Self {
            signal: Arc::new(AtomicBool::new(false)),
            running: AtomicBool::new(true),
        }
    }

    /// True until a stop has been observed, false forever after
    #[inline]
    pub fn can_run(&self) -> bool {
        if !self.running.load(Ordering::Relaxed) {
            return false;
        }
        if self.signal.load(Ordering::Acquire) {
            self.running.store(false, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Request cancellation; returns false if it was already requested
    pub fn stop(&self) -> bool {
        self.handle().stop()
    }

    /// Handle that can stop this task from another thread
    pub fn handle(&self) -> StopHandle {
        StopHandle {
            signal: Arc::clone(&self.signal),
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

/// Remote stop switch for a [`Task`]
#[derive(Debug, Clone)]
pub struct StopHandle {
    signal: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request cancellation; returns false if it was already requested
    pub fn stop(&self) -> bool {
        !self.signal.swap(true, Ordering::AcqRel)
    }

    pub fn is_stopped(&self) -> bool {
        self.signal.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_task_can_run() {
        let task = Task::new();
        assert!(task.can_run());
        assert!(task.can_run());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let task = Task::new();
        assert!(task.stop());
        assert!(!task.stop());
        assert!(!task.can_run());
        assert!(!task.can_run());
    }

    #[test]
    fn test_handle_stops_from_another_thread() {
        let task = Task::new();
        let handle = task.handle();

        thread::spawn(move || {
            assert!(handle.stop());
        })
        .join()
        .unwrap();

        assert!(!task.can_run());
        assert!(task.handle().is_stopped());
    }
}
