//! Non-recursive exclusive lock with handle-style lock/unlock.
//!
//! The consuming stack locks and unlocks imperatively across function
//! boundaries, so this mutex exposes `lock()`/`unlock()` operations on a
//! clonable handle instead of an RAII guard.
//!
//! # Invariants
//!
//! - Non-recursive: a thread re-locking a mutex it already holds blocks
//!   indefinitely. That is the documented contract, not a bug.
//! - `unlock` by a thread that is not the owner is a precondition violation
//!   and panics; the stack has no fallback locking strategy.
//! - The mutex must not be freed while locked or while any thread is blocked
//!   on it.

use parking_lot::{Condvar, Mutex as ParkingMutex};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::pool::SlotToken;

#[derive(Debug)]
struct MutexState {
    owner: Option<ThreadId>,
}

#[derive(Debug)]
struct MutexInner {
    name: &'static str,
    state: ParkingMutex<MutexState>,
    released: Condvar,
    _slot: Option<SlotToken>,
}

/// A handle to a non-recursive exclusive lock.
#[derive(Debug, Clone)]
pub struct Mutex {
    inner: Option<Arc<MutexInner>>,
}

impl Mutex {
    pub(crate) fn create(name: &'static str, slot: Option<SlotToken>) -> Self {
        log::debug!("mutex \"{name}\" created");
        Self {
            inner: Some(Arc::new(MutexInner {
                name,
                state: ParkingMutex::new(MutexState { owner: None }),
                released: Condvar::new(),
                _slot: slot,
            })),
        }
    }

    fn inner(&self) -> &Arc<MutexInner> {
        self.inner
            .as_ref()
            .expect("mutex handle used after free/invalidate")
    }

    /// Blocks the calling task until ownership is acquired. No timeout.
    ///
    /// Task context only. Re-locking from the owning thread blocks forever.
    pub fn lock(&self) {
        let inner = self.inner();
        let mut state = inner.state.lock();
        while state.owner.is_some() {
            inner.released.wait(&mut state);
        }
        state.owner = Some(thread::current().id());
        log::trace!("mutex \"{}\" locked", inner.name);
    }

    /// Releases ownership. Callable only by the current owner.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread does not hold the lock.
    pub fn unlock(&self) {
        let inner = self.inner();
        let mut state = inner.state.lock();
        assert_eq!(
            state.owner,
            Some(thread::current().id()),
            "mutex \"{}\" unlocked by a thread that does not own it",
            inner.name
        );
        state.owner = None;
        drop(state);
        inner.released.notify_one();
        log::trace!("mutex \"{}\" unlocked", inner.name);
    }

    /// Releases native resources and invalidates this handle.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is currently locked. Freeing while another thread
    /// is blocked in [`lock`](Self::lock) is a precondition violation this
    /// layer cannot detect; the blocked thread would never wake.
    pub fn free(&mut self) {
        let inner = self
            .inner
            .take()
            .expect("mutex handle used after free/invalidate");
        let state = inner.state.lock();
        assert!(
            state.owner.is_none(),
            "mutex \"{}\" freed while locked",
            inner.name
        );
        drop(state);
        log::debug!("mutex \"{}\" freed", inner.name);
    }

    /// Tests the handle: true until freed or invalidated.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Marks this handle unusable without freeing the underlying lock.
    pub fn invalidate(&mut self) {
        self.inner = None;
    }
}
