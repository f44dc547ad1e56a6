//! Reentrancy protection.
//!
//! Every mutating engine operation enters the lock once at its outermost
//! entry point. A collaborator that calls back into the engine while an
//! operation is in flight is rejected with [`Error::Reentrancy`].

use std::cell::Cell;

use crate::error::{Error, Result};

/// Lock states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Ready for a new operation
    NotEntered,
    /// An operation is in progress
    Entered,
}

/// Non-reentrant section marker
#[derive(Debug)]
pub struct ReentrancyLock {
    state: Cell<LockState>,
    operation_count: Cell<u64>,
    rejected_count: Cell<u64>,
}

impl Default for ReentrancyLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ReentrancyLock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        Self {
            state: Cell::new(LockState::NotEntered),
            operation_count: Cell::new(0),
            rejected_count: Cell::new(0),
        }
    }

    /// Enter the guarded section; the returned guard exits on drop
    pub fn enter(&self, operation: &'static str) -> Result<EntryGuard<'_>> {
        match self.state.get() {
            LockState::NotEntered => {
                self.state.set(LockState::Entered);
                self.operation_count.set(self.operation_count.get() + 1);
                Ok(EntryGuard { lock: self })
            }
            LockState::Entered => {
                self.rejected_count.set(self.rejected_count.get() + 1);
                tracing::warn!(operation, "Reentrant call rejected");
                Err(Error::Reentrancy)
            }
        }
    }

    /// True while an operation is in progress
    pub fn is_entered(&self) -> bool {
        self.state.get() == LockState::Entered
    }

    /// Number of operations that entered
    pub fn operation_count(&self) -> u64 {
        self.operation_count.get()
    }

    /// Number of reentrant calls rejected
    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.get()
    }
}

/// Held for the duration of one guarded operation
#[derive(Debug)]
pub struct EntryGuard<'a> {
    lock: &'a ReentrancyLock,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        self.lock.state.set(LockState::NotEntered);
    }
}
