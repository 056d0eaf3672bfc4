//! Process-wide lock table
//!
//! Locks are identified by a program-chosen index, created on first use and
//! never removed. The table lock is only taken to insert: lookups go through
//! the read side first and creation re-checks under the write side.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::debug;

use crate::error::{Result, RuntimeError};
use crate::task::Task;

#[derive(Debug, Default)]
struct LockEntry {
    /// Index of the owning thread
    owner: Mutex<Option<usize>>,
    released: Condvar,
}

#[derive(Debug, Default)]
pub struct LockTable {
    entries: RwLock<HashMap<i64, Arc<LockEntry>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `lock` for `thread`.
    ///
    /// Waits in slices of `poll` while another thread owns the lock and
    /// gives up, returning `Ok(false)`, once `task` is stopped. Locking a lock
    /// the caller already owns is an error.
    pub fn lock(&self, lock: i64, thread: usize, task: &Task, poll: Duration) -> Result<bool> {
        let entry = match self.create(lock, thread) {
            Ok(()) => return Ok(true),
            Err(entry) => entry,
        };

        let mut owner = entry.owner.lock();
        loop {
            match *owner {
                None => {
                    *owner = Some(thread);
                    return Ok(true);
                }
                Some(current) if current == thread => {
                    return Err(RuntimeError::ReentrantLock { lock, thread });
                }
                Some(_) => {
                    if !task.can_run() {
                        return Ok(false);
                    }
                    entry.released.wait_for(&mut owner, poll);
                }
            }
        }
    }

    /// Release `lock` if it is owned. Returns whether ownership was cleared.
    pub fn unlock(&self, lock: i64) -> bool {
        let Some(entry) = self.get(lock) else {
            return false;
        };

        let released = entry.owner.lock().take().is_some();
        if released {
            entry.released.notify_one();
        }
        released
    }

    /// Whether `thread` owns any lock
    pub fn holds_any(&self, thread: usize) -> bool {
        self.entries
            .read()
            .values()
            .any(|entry| *entry.owner.lock() == Some(thread))
    }

    /// Current owner of `lock`
    pub fn owner(&self, lock: i64) -> Option<usize> {
        self.get(lock).and_then(|entry| *entry.owner.lock())
    }

    /// Number of locks created so far
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn get(&self, lock: i64) -> Option<Arc<LockEntry>> {
        self.entries.read().get(&lock).cloned()
    }

    /// Create `lock` owned by `thread`, or return the existing entry
    fn create(&self, lock: i64, thread: usize) -> std::result::Result<(), Arc<LockEntry>> {
        if let Some(entry) = self.get(lock) {
            return Err(entry);
        }

        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(&lock) {
            return Err(Arc::clone(entry));
        }

        entries.insert(
            lock,
            Arc::new(LockEntry {
                owner: Mutex::new(Some(thread)),
                released: Condvar::new(),
            }),
        );
        debug!(lock, thread, "lock created");
        Ok(())
    }
}
