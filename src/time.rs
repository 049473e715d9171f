//! Tick-based timekeeping for the port layer.
//!
//! The consuming stack measures every duration in platform ticks: timeouts
//! passed to blocking waits, elapsed time reported back from them, and the
//! monotonic counter behind `sys_now`. [`Ticks`] is that unit, and
//! [`TickClock`] maps it onto host monotonic time.
//!
//! # Timeout overload
//!
//! A timeout of zero ticks means *wait forever* on the blocking entry points.
//! The stack relies on this overload, so it is preserved exactly;
//! [`Ticks::FOREVER`] names it at call sites.
//!
//! # Wrapping
//!
//! The tick counter wraps at `u32::MAX`, matching the platform word width.
//! Elapsed spans must therefore be computed with [`Ticks::wrapping_since`],
//! never by comparing raw counter values.

use core::fmt;
use std::time::{Duration, Instant};

/// A non-negative tick count.
///
/// Used both as a duration (timeouts, elapsed spans) and as a point on the
/// wrapping tick counter returned by [`TickClock::now`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(u32);

impl Ticks {
    /// The zero-tick value, which blocking waits interpret as "no timeout".
    pub const FOREVER: Self = Self(0);

    /// Creates a tick count from a raw counter value.
    #[must_use]
    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns true if this value carries the wait-forever overload.
    #[must_use]
    pub const fn is_forever(self) -> bool {
        self.0 == 0
    }

    /// Ticks elapsed since `earlier`, correct across counter wraparound.
    #[must_use]
    pub const fn wrapping_since(self, earlier: Self) -> Self {
        Self(self.0.wrapping_sub(earlier.0))
    }

    /// Adds a tick span, wrapping at the counter width.
    #[must_use]
    pub const fn wrapping_add(self, ticks: u32) -> Self {
        Self(self.0.wrapping_add(ticks))
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ticks", self.0)
    }
}

impl From<u32> for Ticks {
    fn from(ticks: u32) -> Self {
        Self(ticks)
    }
}

/// Monotonic tick counter for one [`Port`](crate::Port) instance.
///
/// Backed by [`Instant`]; the tick quantum comes from
/// [`PortConfig::tick`](crate::PortConfig). The counter starts at zero when
/// the clock is created and wraps at the `u32` width.
#[derive(Debug)]
pub struct TickClock {
    origin: Instant,
    tick: Duration,
}

impl TickClock {
    /// Creates a clock with the given tick quantum.
    ///
    /// # Panics
    ///
    /// Panics if `tick` is zero; [`PortConfig::validate`](crate::PortConfig)
    /// rejects that before a clock is ever built.
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        assert!(!tick.is_zero(), "tick quantum must be non-zero");
        Self {
            origin: Instant::now(),
            tick,
        }
    }

    /// Returns the current tick counter value.
    #[must_use]
    pub fn now(&self) -> Ticks {
        let elapsed = self.origin.elapsed().as_nanos() / self.tick.as_nanos();
        // Truncation is the wrap.
        Ticks::new(elapsed as u32)
    }

    /// Converts a tick span into host wall-clock time.
    #[must_use]
    pub fn duration_of(&self, ticks: Ticks) -> Duration {
        self.tick * ticks.get()
    }

    /// Returns the host deadline for a timeout starting now.
    ///
    /// `Ticks::FOREVER` has no deadline.
    #[must_use]
    pub fn deadline_for(&self, timeout: Ticks) -> Option<Instant> {
        if timeout.is_forever() {
            None
        } else {
            Some(Instant::now() + self.duration_of(timeout))
        }
    }

    /// Returns the tick quantum.
    #[must_use]
    pub fn tick(&self) -> Duration {
        self.tick
    }
}
