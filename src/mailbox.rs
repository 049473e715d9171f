//! Bounded FIFO mailbox for opaque messages.
//!
//! A mailbox is the composition the stack expects: an admission semaphore
//! seeded with the capacity (free slots), an item semaphore seeded with zero
//! (occupied slots), and a FIFO ring of the same depth buffering the
//! messages themselves. The admission count bounds the outstanding messages
//! at the capacity; the item count lets fetchers park with a timeout.
//!
//! # Context rules
//!
//! [`post`](Mailbox::post) and [`fetch`](Mailbox::fetch) block and are task
//! context only. [`try_post`](Mailbox::try_post),
//! [`try_post_from_interrupt`](Mailbox::try_post_from_interrupt) and
//! [`try_fetch`](Mailbox::try_fetch) never sleep and are the only entry
//! points safe from an interrupt handler.
//!
//! # Ordering
//!
//! Strict FIFO: if one post completes its enqueue before another begins,
//! the earlier message is fetched first. No reordering, duplication, or
//! loss for successful operations.

use core::fmt;
use parking_lot::Mutex as ParkingMutex;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

use crate::pool::SlotToken;
use crate::sync::semaphore::{Semaphore, TryWaitError, WaitError};
use crate::time::{TickClock, Ticks};

/// Error returned by [`Mailbox::fetch`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    /// The timeout elapsed with no message available.
    #[error("fetch timed out")]
    TimedOut,
    /// The mailbox was freed while waiting.
    #[error("mailbox freed while fetching")]
    Closed,
}

/// Error returned by [`Mailbox::try_fetch`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TryFetchError {
    /// No message was queued.
    #[error("mailbox empty")]
    Empty,
    /// The mailbox was freed.
    #[error("mailbox freed")]
    Closed,
}

/// Error returned by the non-blocking post paths; carries the message back
/// so the caller still owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPostError<T> {
    /// The mailbox already holds `capacity` outstanding messages.
    Full(T),
    /// The mailbox was freed.
    Closed(T),
}

impl<T> TryPostError<T> {
    /// Returns the message that was not posted.
    pub fn into_message(self) -> T {
        match self {
            Self::Full(msg) | Self::Closed(msg) => msg,
        }
    }
}

impl<T> fmt::Display for TryPostError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => write!(f, "mailbox full"),
            Self::Closed(_) => write!(f, "mailbox freed"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for TryPostError<T> {}

#[derive(Debug)]
struct MboxInner<T> {
    name: &'static str,
    capacity: usize,
    /// Free slots; seeded with the capacity.
    admission: Semaphore,
    /// Occupied slots; seeded with zero.
    items: Semaphore,
    ring: ParkingMutex<VecDeque<T>>,
    _slot: Option<SlotToken>,
}

/// A handle to a bounded FIFO mailbox of capacity fixed at creation.
#[derive(Debug)]
pub struct Mailbox<T> {
    inner: Option<Arc<MboxInner<T>>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Mailbox<T> {
    pub(crate) fn create(
        name: &'static str,
        capacity: usize,
        clock: Arc<TickClock>,
        slot: Option<SlotToken>,
    ) -> Self {
        assert!(capacity > 0, "mailbox capacity must be non-zero");
        log::debug!("mailbox \"{name}\" created with capacity {capacity}");
        Self {
            inner: Some(Arc::new(MboxInner {
                name,
                capacity,
                admission: Semaphore::create(name, capacity as u32, Arc::clone(&clock), None),
                items: Semaphore::create(name, 0, clock, None),
                ring: ParkingMutex::new(VecDeque::with_capacity(capacity)),
                _slot: slot,
            })),
        }
    }

    fn inner(&self) -> &Arc<MboxInner<T>> {
        self.inner
            .as_ref()
            .expect("mailbox handle used after free/invalidate")
    }

    /// Posts a message, blocking while the mailbox is full.
    ///
    /// The admission wait happens before the enqueue, so a full mailbox
    /// holds the caller until a fetch frees a slot, and enqueue order equals
    /// admission-wait order. Task context only.
    ///
    /// # Panics
    ///
    /// Panics if the mailbox is freed out from under the blocked caller;
    /// freeing with posters still parked violates the free precondition.
    pub fn post(&self, msg: T) {
        let inner = self.inner();
        if inner.admission.wait(Ticks::FOREVER).is_err() {
            panic!("mailbox \"{}\" freed while a post was blocked", inner.name);
        }
        inner.enqueue(msg);
    }

    /// Attempts to post without blocking; usable from task or interrupt
    /// context.
    ///
    /// Admission is reserved before the message touches the ring, so a
    /// failed attempt leaves the mailbox observably unchanged.
    ///
    /// # Errors
    ///
    /// [`TryPostError::Full`] if `capacity` messages are already
    /// outstanding, [`TryPostError::Closed`] if the mailbox was freed.
    /// Either way the message comes back to the caller.
    pub fn try_post(&self, msg: T) -> Result<(), TryPostError<T>> {
        let inner = self.inner();
        match inner.admission.try_wait() {
            Ok(()) => {
                inner.enqueue(msg);
                Ok(())
            }
            Err(TryWaitError::Unavailable) => {
                log::trace!("mailbox \"{}\" full, try_post rejected", inner.name);
                Err(TryPostError::Full(msg))
            }
            Err(TryWaitError::Closed) => Err(TryPostError::Closed(msg)),
        }
    }

    /// Interrupt-context alias of [`try_post`](Self::try_post).
    ///
    /// Kept as a separate entry point because the consuming stack calls
    /// different functions at task level and ISR level; the semantics are
    /// identical.
    pub fn try_post_from_interrupt(&self, msg: T) -> Result<(), TryPostError<T>> {
        self.try_post(msg)
    }

    /// Fetches the oldest message, blocking until one is available or the
    /// timeout elapses.
    ///
    /// `timeout` is in ticks; [`Ticks::FOREVER`] (zero) waits without bound.
    /// On success returns the message and the ticks spent waiting, and frees
    /// one admission slot. Task context only.
    ///
    /// # Errors
    ///
    /// [`FetchError::TimedOut`] if the timeout elapsed first,
    /// [`FetchError::Closed`] if the mailbox was freed while waiting.
    pub fn fetch(&self, timeout: Ticks) -> Result<(T, Ticks), FetchError> {
        let inner = self.inner();
        let elapsed = inner.items.wait(timeout).map_err(|err| match err {
            WaitError::TimedOut => FetchError::TimedOut,
            WaitError::Closed => FetchError::Closed,
        })?;
        Ok((inner.dequeue(), elapsed))
    }

    /// Dequeues the oldest message without blocking; frees one admission
    /// slot on success.
    ///
    /// # Errors
    ///
    /// [`TryFetchError::Empty`] if nothing is queued,
    /// [`TryFetchError::Closed`] if the mailbox was freed.
    pub fn try_fetch(&self) -> Result<T, TryFetchError> {
        let inner = self.inner();
        match inner.items.try_wait() {
            Ok(()) => Ok(inner.dequeue()),
            Err(TryWaitError::Unavailable) => Err(TryFetchError::Empty),
            Err(TryWaitError::Closed) => Err(TryFetchError::Closed),
        }
    }

    /// Returns the capacity fixed at creation.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner().capacity
    }

    /// Returns the number of queued messages. Diagnostic only.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner().ring.lock().len()
    }

    /// Returns true if no messages are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner().ring.lock().is_empty()
    }

    /// Deletes the FIFO ring and both semaphores, invalidating this handle.
    ///
    /// Precondition: no thread is blocked in `post` or `fetch` on this
    /// mailbox. A fetcher parked with a timeout drains with
    /// [`FetchError::Closed`] rather than deadlocking.
    pub fn free(&mut self) {
        let inner = self
            .inner
            .take()
            .expect("mailbox handle used after free/invalidate");
        inner.items.close_shared();
        inner.admission.close_shared();
        log::debug!("mailbox \"{}\" freed", inner.name);
    }

    /// Marks this handle unusable without tearing the mailbox down.
    pub fn invalidate(&mut self) {
        self.inner = None;
    }

    /// Tests the handle: true until freed or invalidated.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }
}

impl<T> MboxInner<T> {
    fn enqueue(&self, msg: T) {
        {
            let mut ring = self.ring.lock();
            debug_assert!(
                ring.len() < self.capacity,
                "mailbox \"{}\" ring exceeded its admission bound",
                self.name
            );
            ring.push_back(msg);
        }
        self.items.signal();
    }

    fn dequeue(&self) -> T {
        let msg = {
            let mut ring = self.ring.lock();
            ring.pop_front()
                .expect("mailbox item accounted for but ring empty")
        };
        self.admission.signal();
        msg
    }
}
