//! Port configuration.
//!
//! One [`PortConfig`] is consumed when a [`Port`](crate::Port) is created.
//! It fixes the tick quantum and the object pool limits; the limits model the
//! fixed-size kernel object pools of the target RTOS, so creation failure is
//! a real, reportable outcome rather than a theoretical one.

use std::time::Duration;
use thiserror::Error;

/// Configuration rejected by [`PortConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The tick quantum was zero.
    #[error("tick quantum must be non-zero")]
    ZeroTick,

    /// A pool limit was zero.
    #[error("{pool} pool limit must be at least 1")]
    EmptyPool {
        /// Which pool had a zero limit.
        pool: &'static str,
    },
}

/// Tunables for one port instance.
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Wall-clock length of one platform tick.
    pub tick: Duration,
    /// Maximum number of live mutexes.
    pub max_mutexes: usize,
    /// Maximum number of live semaphores.
    pub max_semaphores: usize,
    /// Maximum number of live mailboxes.
    pub max_mailboxes: usize,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(1),
            max_mutexes: 64,
            max_semaphores: 64,
            max_mailboxes: 32,
        }
    }
}

impl PortConfig {
    /// Sets the tick quantum.
    #[must_use]
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Sets the mutex pool limit.
    #[must_use]
    pub fn max_mutexes(mut self, limit: usize) -> Self {
        self.max_mutexes = limit;
        self
    }

    /// Sets the semaphore pool limit.
    #[must_use]
    pub fn max_semaphores(mut self, limit: usize) -> Self {
        self.max_semaphores = limit;
        self
    }

    /// Sets the mailbox pool limit.
    #[must_use]
    pub fn max_mailboxes(mut self, limit: usize) -> Self {
        self.max_mailboxes = limit;
        self
    }

    /// Validates the configuration for basic sanity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        if self.max_mutexes == 0 {
            return Err(ConfigError::EmptyPool { pool: "mutex" });
        }
        if self.max_semaphores == 0 {
            return Err(ConfigError::EmptyPool { pool: "semaphore" });
        }
        if self.max_mailboxes == 0 {
            return Err(ConfigError::EmptyPool { pool: "mailbox" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(PortConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_tick_rejected() {
        let config = PortConfig::default().tick(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTick));
    }

    #[test]
    fn empty_pool_rejected() {
        let config = PortConfig::default().max_semaphores(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyPool { pool: "semaphore" })
        );
    }

    #[test]
    fn setters_chain() {
        let config = PortConfig::default()
            .tick(Duration::from_millis(10))
            .max_mutexes(4)
            .max_semaphores(8)
            .max_mailboxes(2);
        assert_eq!(config.tick, Duration::from_millis(10));
        assert_eq!(config.max_mutexes, 4);
        assert_eq!(config.max_semaphores, 8);
        assert_eq!(config.max_mailboxes, 2);
    }
}
