//! Core-lock ownership tracking and the debug assertion behind it.
//!
//! The stack's protected entry points must only run on the thread that holds
//! the core lock. [`CoreLock`] is a recursive ownership lock (unlike
//! [`Mutex`](crate::sync::Mutex), the owning thread may nest acquisitions)
//! plus a recorded "designated" thread identity. [`CoreLock::check`] is the
//! diagnostic: it fails loudly in debug builds when a protected entry point
//! is reached without the lock held by the designated thread, and compiles
//! to nothing in release builds.

use parking_lot::{Condvar, Mutex as ParkingMutex};
use std::thread::{self, ThreadId};

#[derive(Debug)]
struct CoreState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// Recursive ownership lock with a designated-thread assertion.
#[derive(Debug)]
pub struct CoreLock {
    state: ParkingMutex<CoreState>,
    released: Condvar,
    designated: ParkingMutex<Option<ThreadId>>,
}

impl Default for CoreLock {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreLock {
    /// Creates an unlocked core lock with no designated thread.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParkingMutex::new(CoreState {
                owner: None,
                depth: 0,
            }),
            released: Condvar::new(),
            designated: ParkingMutex::new(None),
        }
    }

    /// Acquires the lock, nesting if the calling thread already owns it.
    ///
    /// Blocks while a different thread holds the lock. Task context only.
    pub fn lock(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            state.depth += 1;
            return;
        }
        while state.owner.is_some() {
            self.released.wait(&mut state);
        }
        state.owner = Some(me);
        state.depth = 1;
    }

    /// Releases one nesting level; at depth zero the lock becomes free.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread does not own the lock.
    pub fn unlock(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        assert_eq!(
            state.owner,
            Some(me),
            "core lock released by a thread that does not own it"
        );
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }
    }

    /// Records the calling thread as the one expected to own this lock for
    /// the life of the process.
    pub fn mark_designated_thread(&self) {
        let me = thread::current().id();
        *self.designated.lock() = Some(me);
        log::debug!("core lock designated thread recorded: {me:?}");
    }

    /// Returns true if the calling thread currently owns the lock.
    #[must_use]
    pub fn held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Debug-only assertion that the caller is the designated thread and
    /// holds the lock. A no-op in release builds; it never alters control
    /// flow in production.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if no designated thread was marked, if the
    /// caller is not that thread, or if the lock is not held by the caller.
    pub fn check(&self) {
        #[cfg(debug_assertions)]
        {
            let me = thread::current().id();
            let designated = *self.designated.lock();
            assert_eq!(
                designated,
                Some(me),
                "protected entry point reached from a non-designated thread"
            );
            let state = self.state.lock();
            assert!(
                state.owner == Some(me) && state.depth > 0,
                "protected entry point reached without the core lock held"
            );
        }
    }
}
