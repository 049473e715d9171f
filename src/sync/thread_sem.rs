//! Per-thread semaphore registry.
//!
//! Connection objects in the stack can wait on a semaphore private to the
//! calling thread instead of allocating one per operation. This module binds
//! at most one [`Semaphore`] to each thread's identity through thread-local
//! storage: lazily allocated on first request, recalled on every later
//! request from the same thread, released only by that thread's explicit
//! teardown call.

use std::cell::RefCell;

use crate::pool::AllocError;
use crate::sync::Semaphore;
use crate::Port;

thread_local! {
    static THREAD_SEM: RefCell<Option<Semaphore>> = const { RefCell::new(None) };
}

/// Returns the calling thread's bound semaphore, if one was allocated.
///
/// Two calls from the same thread with no intervening [`free_for_current`]
/// return handles to the same underlying semaphore; other threads never
/// observe it.
#[must_use]
pub fn get_current() -> Option<Semaphore> {
    THREAD_SEM.with(|slot| slot.borrow().clone())
}

/// Binds a semaphore (initial count 0) to the calling thread's identity.
///
/// Idempotent: if the thread already has one, this does nothing.
///
/// # Errors
///
/// Returns [`AllocError`] if the port's semaphore pool is exhausted.
pub fn alloc_for_current(port: &Port) -> Result<(), AllocError> {
    THREAD_SEM.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(port.create_semaphore_named("thread sem", 0)?);
        }
        Ok(())
    })
}

/// Releases and unbinds the calling thread's semaphore, if any.
pub fn free_for_current() {
    THREAD_SEM.with(|slot| {
        if let Some(mut sem) = slot.borrow_mut().take() {
            sem.free();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PortConfig;
    use std::sync::Arc;

    fn port() -> Arc<Port> {
        crate::test_log_init();
        Arc::new(Port::new(PortConfig::default()).expect("port"))
    }

    #[test]
    fn lazily_allocated_and_recalled() {
        let port = port();
        assert!(get_current().is_none());

        alloc_for_current(&port).expect("alloc");
        let first = get_current().expect("bound semaphore");

        // Idempotent: a second alloc must not replace the binding.
        alloc_for_current(&port).expect("realloc");
        let second = get_current().expect("bound semaphore");
        assert!(first.is_same(&second));

        free_for_current();
        assert!(get_current().is_none());
    }

    #[test]
    fn free_without_alloc_is_a_noop() {
        crate::test_log_init();
        free_for_current();
        assert!(get_current().is_none());
    }

    #[test]
    fn threads_never_share_a_slot() {
        let port = port();
        alloc_for_current(&port).expect("alloc");
        let mine = get_current().expect("bound semaphore");

        let their_port = Arc::clone(&port);
        let theirs = std::thread::spawn(move || {
            assert!(get_current().is_none(), "slot leaked across threads");
            alloc_for_current(&their_port).expect("alloc");
            let sem = get_current().expect("bound semaphore");
            free_for_current();
            sem
        })
        .join()
        .expect("worker panicked");

        assert!(!mine.is_same(&theirs));
        free_for_current();
    }

    #[test]
    fn pool_slot_returns_on_free() {
        crate::test_log_init();
        let port = Port::new(PortConfig::default().max_semaphores(1)).expect("port");

        alloc_for_current(&port).expect("alloc");
        assert!(port.create_semaphore(0).is_err(), "pool should be empty");

        free_for_current();
        let _sem = port.create_semaphore(0).expect("slot returned");
    }
}
