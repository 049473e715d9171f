//! Role-keyed thread spawning.
//!
//! The stack creates a small, closed set of long-lived threads: its own I/O
//! thread and the management agent's netconn thread. Each role has exactly
//! one reserved execution context, so spawning is a table lookup, not a
//! general-purpose allocator. Requesting a role outside the set, or a role
//! whose context is already in use, is a configuration error reported
//! explicitly — never a silent no-op.

use parking_lot::Mutex as ParkingMutex;
use std::io;
use std::str::FromStr;
use std::thread::{Builder, JoinHandle};
use thiserror::Error;

/// Error returned by [`Port::spawn`](crate::Port::spawn) and
/// [`ThreadRole::from_str`].
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The requested role name is not in the closed role set.
    #[error("unrecognized thread role \"{0}\"")]
    UnknownRole(String),

    /// The role's reserved execution context is already in use.
    #[error("thread role {0} already spawned")]
    RoleOccupied(ThreadRole),

    /// The host OS failed to create the thread.
    #[error("thread creation failed: {0}")]
    Os(#[from] io::Error),
}

/// The closed set of logical thread roles the port recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadRole {
    /// The stack's I/O thread.
    TcpIp,
    /// The management agent's netconn thread.
    Snmp,
}

impl ThreadRole {
    pub(crate) const COUNT: usize = 2;

    /// Returns the thread name the stack configures for this role.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TcpIp => "tcpip_thread",
            Self::Snmp => "snmp_netconn",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::TcpIp => 0,
            Self::Snmp => 1,
        }
    }
}

impl std::fmt::Display for ThreadRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ThreadRole {
    type Err = SpawnError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "tcpip_thread" => Ok(Self::TcpIp),
            "snmp_netconn" => Ok(Self::Snmp),
            other => Err(SpawnError::UnknownRole(other.to_owned())),
        }
    }
}

/// What a thread was created with: role, stack region size, priority.
///
/// The priority is recorded for diagnostics; host threads do not honor RTOS
/// priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadDescriptor {
    /// The logical role.
    pub role: ThreadRole,
    /// Requested stack size in bytes.
    pub stack_size: usize,
    /// Requested scheduling priority.
    pub priority: u8,
}

/// A spawned role thread.
#[derive(Debug)]
pub struct ThreadHandle {
    descriptor: ThreadDescriptor,
    join: JoinHandle<()>,
}

impl ThreadHandle {
    /// Returns the role this thread was spawned for.
    #[must_use]
    pub fn role(&self) -> ThreadRole {
        self.descriptor.role
    }

    /// Returns the creation descriptor.
    #[must_use]
    pub fn descriptor(&self) -> ThreadDescriptor {
        self.descriptor
    }

    /// Waits for the thread to finish.
    pub fn join(self) -> std::thread::Result<()> {
        self.join.join()
    }
}

/// One reserved execution context per role.
#[derive(Debug, Default)]
pub(crate) struct RoleTable {
    occupied: ParkingMutex<[bool; ThreadRole::COUNT]>,
}

impl RoleTable {
    pub(crate) fn spawn<F>(
        &self,
        role: ThreadRole,
        stack_size: usize,
        priority: u8,
        entry: F,
    ) -> Result<ThreadHandle, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut occupied = self.occupied.lock();
            if occupied[role.index()] {
                return Err(SpawnError::RoleOccupied(role));
            }
            occupied[role.index()] = true;
        }

        let join = match Builder::new()
            .name(role.name().to_owned())
            .stack_size(stack_size)
            .spawn(entry)
        {
            Ok(join) => join,
            Err(err) => {
                // Give the context back; the role was never started.
                self.occupied.lock()[role.index()] = false;
                return Err(SpawnError::Os(err));
            }
        };

        log::debug!(
            "spawned {role} (stack {stack_size} bytes, priority {priority} \
             recorded but not applied on host)"
        );
        Ok(ThreadHandle {
            descriptor: ThreadDescriptor {
                role,
                stack_size,
                priority,
            },
            join,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn role_names_round_trip() {
        assert_eq!("tcpip_thread".parse::<ThreadRole>().ok(), Some(ThreadRole::TcpIp));
        assert_eq!("snmp_netconn".parse::<ThreadRole>().ok(), Some(ThreadRole::Snmp));
    }

    #[test]
    fn unknown_role_is_a_typed_error() {
        let err = "lcd_refresh".parse::<ThreadRole>().expect_err("not a role");
        assert!(matches!(err, SpawnError::UnknownRole(name) if name == "lcd_refresh"));
    }

    #[test]
    fn spawn_runs_the_entry_function() {
        crate::test_log_init();
        let table = RoleTable::default();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_flag = Arc::clone(&ran);

        let handle = table
            .spawn(ThreadRole::TcpIp, 64 * 1024, 5, move || {
                ran_flag.store(true, Ordering::SeqCst);
            })
            .expect("spawn");

        assert_eq!(handle.role(), ThreadRole::TcpIp);
        assert_eq!(handle.descriptor().stack_size, 64 * 1024);
        assert_eq!(handle.descriptor().priority, 5);
        handle.join().expect("thread panicked");
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn each_role_has_one_context() {
        crate::test_log_init();
        let table = RoleTable::default();
        let first = table
            .spawn(ThreadRole::Snmp, 16 * 1024, 4, || {})
            .expect("first spawn");

        let err = table
            .spawn(ThreadRole::Snmp, 16 * 1024, 4, || {})
            .expect_err("context in use");
        assert!(matches!(err, SpawnError::RoleOccupied(ThreadRole::Snmp)));

        // A different role still has its own context.
        let other = table
            .spawn(ThreadRole::TcpIp, 16 * 1024, 4, || {})
            .expect("other role");

        first.join().expect("thread panicked");
        other.join().expect("thread panicked");
    }
}
