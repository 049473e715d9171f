//! Blocking synchronization primitives.
//!
//! The stack consumes exactly three primitive shapes from this module: an
//! exclusive lock ([`Mutex`]), a signal with timed waits ([`Semaphore`]),
//! and the ownership/assertion machinery around the core lock
//! ([`CoreLock`]). The bounded message channel built from these lives in
//! [`mailbox`](crate::mailbox).

pub mod core_lock;
pub mod mutex;
pub mod semaphore;
pub mod thread_sem;

pub use core_lock::CoreLock;
pub use mutex::Mutex;
pub use semaphore::{Semaphore, TryWaitError, WaitError};
