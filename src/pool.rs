//! Fixed-size object pool accounting.
//!
//! The target RTOS allocates every kernel object out of a fixed pool, so the
//! port layer reports creation failure explicitly instead of assuming
//! allocation always succeeds. [`SlotPool`] is the bookkeeping: a named
//! counter with a hard limit. Each live primitive holds a [`SlotToken`];
//! dropping the token returns the slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A fixed-size object pool was empty at creation time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{resource} pool exhausted ({limit} in use)")]
pub struct AllocError {
    /// Which pool was exhausted.
    pub resource: &'static str,
    /// The pool limit that was hit.
    pub limit: usize,
}

/// Usage counter for one class of kernel object.
#[derive(Debug)]
pub struct SlotPool {
    resource: &'static str,
    limit: usize,
    used: AtomicUsize,
}

impl SlotPool {
    /// Creates a pool with the given limit.
    #[must_use]
    pub fn new(resource: &'static str, limit: usize) -> Arc<Self> {
        Arc::new(Self {
            resource,
            limit,
            used: AtomicUsize::new(0),
        })
    }

    /// Claims one slot, failing if the pool is at its limit.
    pub fn claim(self: &Arc<Self>) -> Result<SlotToken, AllocError> {
        let claimed = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                if used < self.limit {
                    Some(used + 1)
                } else {
                    None
                }
            });
        match claimed {
            Ok(_) => Ok(SlotToken {
                pool: Arc::clone(self),
            }),
            Err(_) => {
                log::warn!("{} pool exhausted at {} objects", self.resource, self.limit);
                Err(AllocError {
                    resource: self.resource,
                    limit: self.limit,
                })
            }
        }
    }

    /// Returns the number of slots currently in use.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Returns the pool limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Ownership of one pool slot; returns it on drop.
#[derive(Debug)]
pub struct SlotToken {
    pool: Arc<SlotPool>,
}

impl Drop for SlotToken {
    fn drop(&mut self) {
        self.pool.used.fetch_sub(1, Ordering::AcqRel);
    }
}
