//! Binary/counting semaphore with tick-granularity timed waits.
//!
//! The stack uses semaphores two ways: seeded with 0 or 1 for task-to-task
//! signaling, and seeded with a mailbox capacity as an admission counter.
//! Both are the same object; the count is never clamped.
//!
//! # Context rules
//!
//! [`Semaphore::signal`] and [`Semaphore::try_wait`] hold the internal lock
//! only for a constant-time count update and are safe from any context that
//! must not block. [`Semaphore::wait`] parks the calling task and is
//! task-context only; calling it from an interrupt handler is a documented
//! precondition violation, not something this layer can detect.
//!
//! # Handle semantics
//!
//! A `Semaphore` is a handle onto shared state; clones refer to the same
//! object. [`free`](Semaphore::free) tears the object down (waiters drain
//! with [`WaitError::Closed`] rather than deadlocking), while
//! [`invalidate`](Semaphore::invalidate) only marks *this* handle unusable —
//! both take `&mut self` so the caller's variable really changes.

use parking_lot::{Condvar, Mutex as ParkingMutex};
use std::sync::Arc;
use thiserror::Error;

use crate::pool::SlotToken;
use crate::time::{TickClock, Ticks};

/// Error returned by [`Semaphore::wait`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The timeout elapsed before the semaphore was signaled.
    #[error("wait timed out")]
    TimedOut,
    /// The semaphore was freed while waiting.
    #[error("semaphore freed while waiting")]
    Closed,
}

/// Error returned by [`Semaphore::try_wait`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TryWaitError {
    /// The count was zero; taking a unit would have blocked.
    #[error("semaphore unavailable without blocking")]
    Unavailable,
    /// The semaphore was freed.
    #[error("semaphore freed")]
    Closed,
}

#[derive(Debug)]
struct SemState {
    count: u32,
    closed: bool,
}

#[derive(Debug)]
pub(crate) struct SemInner {
    name: &'static str,
    state: ParkingMutex<SemState>,
    available: Condvar,
    clock: Arc<TickClock>,
    // Held for the object's lifetime; returns the pool slot on teardown.
    _slot: Option<SlotToken>,
}

/// A handle to a counting semaphore.
#[derive(Debug, Clone)]
pub struct Semaphore {
    inner: Option<Arc<SemInner>>,
}

impl Semaphore {
    pub(crate) fn create(
        name: &'static str,
        initial_count: u32,
        clock: Arc<TickClock>,
        slot: Option<SlotToken>,
    ) -> Self {
        log::debug!("semaphore \"{name}\" created with count {initial_count}");
        Self {
            inner: Some(Arc::new(SemInner {
                name,
                state: ParkingMutex::new(SemState {
                    count: initial_count,
                    closed: false,
                }),
                available: Condvar::new(),
                clock,
                _slot: slot,
            })),
        }
    }

    fn inner(&self) -> &Arc<SemInner> {
        self.inner
            .as_ref()
            .expect("semaphore handle used after free/invalidate")
    }

    /// Increments the count and wakes one waiter if any is parked.
    ///
    /// Never blocks; callable from interrupt context.
    pub fn signal(&self) {
        let inner = self.inner();
        let mut state = inner.state.lock();
        state.count = state.count.saturating_add(1);
        drop(state);
        inner.available.notify_one();
        log::trace!("semaphore \"{}\" signaled", inner.name);
    }

    /// Blocks until the count becomes positive, then decrements it.
    ///
    /// `timeout` is in ticks; [`Ticks::FOREVER`] (zero) waits without bound.
    /// On success returns the ticks elapsed while waiting. Task context only.
    ///
    /// # Errors
    ///
    /// [`WaitError::TimedOut`] if the timeout elapsed first,
    /// [`WaitError::Closed`] if the semaphore was freed while waiting.
    pub fn wait(&self, timeout: Ticks) -> Result<Ticks, WaitError> {
        let inner = self.inner();
        let start = inner.clock.now();
        let deadline = inner.clock.deadline_for(timeout);

        let mut state = inner.state.lock();
        loop {
            if state.closed {
                return Err(WaitError::Closed);
            }
            if state.count > 0 {
                state.count -= 1;
                let elapsed = inner.clock.now().wrapping_since(start);
                log::trace!("semaphore \"{}\" taken after {elapsed}", inner.name);
                return Ok(elapsed);
            }
            match deadline {
                None => inner.available.wait(&mut state),
                Some(deadline) => {
                    if inner.available.wait_until(&mut state, deadline).timed_out() {
                        // Final check under the lock: a signal that raced the
                        // deadline still wins.
                        if state.closed {
                            return Err(WaitError::Closed);
                        }
                        if state.count > 0 {
                            state.count -= 1;
                            return Ok(inner.clock.now().wrapping_since(start));
                        }
                        log::trace!("semaphore \"{}\" wait timed out", inner.name);
                        return Err(WaitError::TimedOut);
                    }
                }
            }
        }
    }

    /// Decrements the count if it is positive, without blocking.
    ///
    /// Callable from interrupt context.
    ///
    /// # Errors
    ///
    /// [`TryWaitError::Unavailable`] if the count is zero,
    /// [`TryWaitError::Closed`] if the semaphore was freed.
    pub fn try_wait(&self) -> Result<(), TryWaitError> {
        let inner = self.inner();
        let mut state = inner.state.lock();
        if state.closed {
            return Err(TryWaitError::Closed);
        }
        if state.count > 0 {
            state.count -= 1;
            Ok(())
        } else {
            Err(TryWaitError::Unavailable)
        }
    }

    /// Returns the current count. Diagnostic only; stale by the time it is read.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.inner().state.lock().count
    }

    /// Tears the semaphore down and invalidates this handle.
    ///
    /// Any waiter still parked on it drains with [`WaitError::Closed`]; the
    /// deleting thread never blocks.
    pub fn free(&mut self) {
        let inner = self
            .inner
            .take()
            .expect("semaphore handle used after free/invalidate");
        inner.close();
        log::debug!("semaphore \"{}\" freed", inner.name);
    }

    /// Marks this handle unusable without tearing the object down.
    ///
    /// Used when ownership of the underlying semaphore moves elsewhere.
    /// Takes `&mut self` so the caller's variable is actually cleared.
    pub fn invalidate(&mut self) {
        self.inner = None;
    }

    /// Tests the handle, not the count: true until freed or invalidated.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Closes the underlying semaphore without consuming the handle.
    ///
    /// Composite objects (the mailbox) own their semaphores behind a shared
    /// pointer and tear them down through this path.
    pub(crate) fn close_shared(&self) {
        self.inner().close();
    }

    /// Returns true if both handles refer to the same underlying semaphore.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl SemInner {
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.available.notify_all();
    }
}
