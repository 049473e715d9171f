//! stackport: the operating-system adaptation layer an embedded TCP/IP stack
//! runs on, rendered host-native.
//!
//! The stack consumes a narrow primitive surface — a process-wide critical
//! section, mutexes, semaphores with tick-granularity timeouts, bounded
//! message mailboxes, and a fixed set of role-keyed threads. This crate
//! implements that surface over host threads, with the RTOS tick mapped to a
//! configurable wall-clock quantum.
//!
//! # Layout
//!
//! - [`Port`] — the injected context owning the clock, the protection lock,
//!   the pools, and the thread-role table. Everything is created through it.
//! - [`sync`] — [`Mutex`](sync::Mutex), [`Semaphore`](sync::Semaphore), the
//!   [`CoreLock`](sync::CoreLock) assertion, and the per-thread semaphore
//!   registry ([`sync::thread_sem`]).
//! - [`mailbox`] — the bounded FIFO channel built from an admission
//!   semaphore and a ring.
//! - [`thread`] — the closed role set and its spawner.
//!
//! # Context discipline
//!
//! Blocking entry points (`lock`, `wait`, `post`, `fetch`, `protect`) are
//! task context only; calling them where blocking is illegal is a documented
//! precondition violation this layer cannot detect. The `try_*` entry points
//! never sleep and are the only operations safe from an interrupt handler.
//! Precondition violations that *are* detectable (unlocking a mutex you do
//! not own, reusing a freed handle) halt with a panic: once primitive state
//! is inconsistent the stack has no recovery path.

pub mod config;
pub mod mailbox;
pub mod pool;
pub mod port;
pub mod sync;
pub mod thread;
pub mod time;

pub use config::{ConfigError, PortConfig};
pub use mailbox::{FetchError, Mailbox, TryFetchError, TryPostError};
pub use pool::AllocError;
pub use port::{Port, ProtectionToken};
pub use sync::{CoreLock, Mutex, Semaphore, TryWaitError, WaitError};
pub use thread::{SpawnError, ThreadDescriptor, ThreadHandle, ThreadRole};
pub use time::{TickClock, Ticks};

/// Installs the test logger once per process. Unit tests call this first so
/// `RUST_LOG` controls primitive-layer tracing during a run.
#[cfg(test)]
pub(crate) fn test_log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
