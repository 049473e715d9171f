//! The port context: everything the stack needs from its operating system,
//! owned explicitly instead of living in ambient globals.
//!
//! One [`Port`] exists per process. It owns the tick clock, the single
//! process-wide protection lock, the fixed thread-role table, and the object
//! pools that back mutex/semaphore/mailbox creation. The stack receives a
//! reference at initialization and routes every primitive operation through
//! it; nothing in this layer is reachable except through the context.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex as ParkingMutex};

use crate::config::{ConfigError, PortConfig};
use crate::mailbox::Mailbox;
use crate::pool::{AllocError, SlotPool};
use crate::sync::{Mutex, Semaphore};
use crate::thread::{RoleTable, SpawnError, ThreadHandle, ThreadRole};
use crate::time::{TickClock, Ticks};

/// Proof that the caller entered the process-wide critical section.
///
/// Single-use: the matching [`Port::unprotect`] consumes it, and there is no
/// other way to release the protection lock. Nested `protect` calls from the
/// owning thread each produce their own token; exits unwind in any order
/// since the lock tracks depth, not token identity.
#[must_use = "dropping a ProtectionToken leaks the critical section"]
#[derive(Debug)]
pub struct ProtectionToken {
    _private: (),
}

#[derive(Debug)]
struct ProtectionState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// The injected operating-system context for one stack instance.
#[derive(Debug)]
pub struct Port {
    clock: Arc<TickClock>,
    protection: ParkingMutex<ProtectionState>,
    protection_released: Condvar,
    mutex_pool: Arc<SlotPool>,
    semaphore_pool: Arc<SlotPool>,
    mailbox_pool: Arc<SlotPool>,
    roles: RoleTable,
}

impl Port {
    /// Creates a port from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration fails validation.
    pub fn new(config: PortConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "port initialized: tick {:?}, pools {}/{}/{} (mutex/sem/mbox)",
            config.tick,
            config.max_mutexes,
            config.max_semaphores,
            config.max_mailboxes
        );
        Ok(Self {
            clock: Arc::new(TickClock::new(config.tick)),
            protection: ParkingMutex::new(ProtectionState {
                owner: None,
                depth: 0,
            }),
            protection_released: Condvar::new(),
            mutex_pool: SlotPool::new("mutex", config.max_mutexes),
            semaphore_pool: SlotPool::new("semaphore", config.max_semaphores),
            mailbox_pool: SlotPool::new("mailbox", config.max_mailboxes),
            roles: RoleTable::default(),
        })
    }

    /// Returns the current tick counter. Monotonic, wraps at the word width.
    #[must_use]
    pub fn now(&self) -> Ticks {
        self.clock.now()
    }

    /// Alias of [`now`](Self::now), kept for callers that ask for jiffies.
    #[must_use]
    pub fn jiffies(&self) -> Ticks {
        self.clock.now()
    }

    /// Enters the process-wide critical section, blocking until available.
    ///
    /// Nestable by the owning thread. Must not be called from a context that
    /// cannot block; the protection lock serializes unrelated subsystems, so
    /// hold it for the minimum possible duration.
    pub fn protect(&self) -> ProtectionToken {
        let me = thread::current().id();
        let mut state = self.protection.lock();
        if state.owner == Some(me) {
            state.depth += 1;
            return ProtectionToken { _private: () };
        }
        while state.owner.is_some() {
            self.protection_released.wait(&mut state);
        }
        state.owner = Some(me);
        state.depth = 1;
        ProtectionToken { _private: () }
    }

    /// Exits the critical section, consuming the token from the matching
    /// [`protect`](Self::protect).
    ///
    /// # Panics
    ///
    /// Panics if the calling thread does not hold the protection lock.
    pub fn unprotect(&self, token: ProtectionToken) {
        drop(token);
        let mut state = self.protection.lock();
        assert_eq!(
            state.owner,
            Some(thread::current().id()),
            "unprotect from a thread that never entered the critical section"
        );
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.protection_released.notify_one();
        }
    }

    /// Creates a mutex from the mutex pool.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the pool is exhausted.
    pub fn create_mutex(&self) -> Result<Mutex, AllocError> {
        let slot = self.mutex_pool.claim()?;
        Ok(Mutex::create("stack mutex", Some(slot)))
    }

    /// Creates a semaphore with the given initial count.
    ///
    /// The stack seeds 0 or 1 for signaling use; larger counts are legal and
    /// used for admission counting.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the pool is exhausted.
    pub fn create_semaphore(&self, initial_count: u32) -> Result<Semaphore, AllocError> {
        self.create_semaphore_named("stack sem", initial_count)
    }

    pub(crate) fn create_semaphore_named(
        &self,
        name: &'static str,
        initial_count: u32,
    ) -> Result<Semaphore, AllocError> {
        let slot = self.semaphore_pool.claim()?;
        Ok(Semaphore::create(
            name,
            initial_count,
            Arc::clone(&self.clock),
            Some(slot),
        ))
    }

    /// Creates a mailbox with the given capacity.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the pool is exhausted.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn create_mailbox<T>(&self, capacity: usize) -> Result<Mailbox<T>, AllocError> {
        let slot = self.mailbox_pool.claim()?;
        Ok(Mailbox::create(
            "stack mbox",
            capacity,
            Arc::clone(&self.clock),
            Some(slot),
        ))
    }

    /// Spawns the thread reserved for `role`.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] if the role's context is already in use or the
    /// host refuses the thread.
    pub fn spawn<F>(
        &self,
        role: ThreadRole,
        stack_size: usize,
        priority: u8,
        entry: F,
    ) -> Result<ThreadHandle, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.roles.spawn(role, stack_size, priority, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn port() -> Port {
        crate::test_log_init();
        Port::new(PortConfig::default()).expect("port")
    }

    #[test]
    fn tick_counter_advances() {
        let port = port();
        let start = port.now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(port.now().wrapping_since(start).get() >= 4);
        assert!(port.jiffies().wrapping_since(start).get() >= 4);
    }

    #[test]
    fn protection_nests_for_the_owner() {
        let port = port();
        let outer = port.protect();
        let inner = port.protect();
        port.unprotect(inner);
        port.unprotect(outer);
    }

    #[test]
    fn protection_excludes_other_threads() {
        let port = Arc::new(port());
        let token = port.protect();

        let contender = Arc::clone(&port);
        let entered = Arc::new(AtomicBool::new(false));
        let entered_flag = Arc::clone(&entered);
        let handle = std::thread::spawn(move || {
            let token = contender.protect();
            entered_flag.store(true, Ordering::SeqCst);
            contender.unprotect(token);
        });

        std::thread::sleep(Duration::from_millis(20));
        assert!(
            !entered.load(Ordering::SeqCst),
            "critical section entered concurrently"
        );

        port.unprotect(token);
        handle.join().expect("contender panicked");
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    #[should_panic(expected = "never entered the critical section")]
    fn unprotect_from_wrong_thread_is_fatal() {
        let port = Arc::new(port());
        let token = port.protect();
        let other = Arc::clone(&port);
        std::thread::spawn(move || other.unprotect(token))
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
    }

    #[test]
    fn creation_reports_pool_exhaustion() {
        crate::test_log_init();
        let port = Port::new(
            PortConfig::default()
                .max_mutexes(1)
                .max_semaphores(2)
                .max_mailboxes(1),
        )
        .expect("port");

        let _m = port.create_mutex().expect("mutex");
        assert!(port.create_mutex().is_err());

        let _s1 = port.create_semaphore(0).expect("sem 1");
        let _s2 = port.create_semaphore(1).expect("sem 2");
        assert!(port.create_semaphore(0).is_err());

        let _b = port.create_mailbox::<u32>(4).expect("mailbox");
        assert!(port.create_mailbox::<u32>(4).is_err());
    }

    #[test]
    fn freed_objects_return_their_slots() {
        crate::test_log_init();
        let port = Port::new(PortConfig::default().max_semaphores(1)).expect("port");

        let mut sem = port.create_semaphore(0).expect("sem");
        assert!(port.create_semaphore(0).is_err());
        sem.free();
        let _again = port.create_semaphore(0).expect("slot returned");
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(Port::new(PortConfig::default().tick(Duration::ZERO)).is_err());
    }
}
