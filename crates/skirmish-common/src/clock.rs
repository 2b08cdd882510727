//! Monotonic simulation clock.
//!
//! Every timer in the simulation (cooldowns, effect expiry, fuses, respawn
//! delays) is an elapsed-time comparison against one [`SimTime`] supplied by
//! the host loop. Nothing counts down on its own, so pausing the clock
//! pauses every timer at once.

use serde::{Deserialize, Serialize};

/// A point on the simulation timeline, in milliseconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SimTime(u64);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: Self = Self(0);

    /// Creates a time from milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Returns the time in milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, zero if `earlier` is in the future.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns this time shifted forward by `ms`.
    #[must_use]
    pub const fn after(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Returns true once `deadline` has been reached.
    #[must_use]
    pub const fn has_reached(self, deadline: Self) -> bool {
        self.0 >= deadline.0
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Host-side clock that only ever moves forward.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: SimTime,
    paused: bool,
}

impl SimClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            paused: false,
        }
    }

    /// Current time.
    #[must_use]
    pub const fn now(&self) -> SimTime {
        self.now
    }

    /// Advances by `delta_ms` unless paused. Returns the new time.
    pub fn advance(&mut self, delta_ms: u64) -> SimTime {
        if !self.paused {
            self.now = self.now.after(delta_ms);
        }
        self.now
    }

    /// Moves the clock to `time` if that is later than now.
    ///
    /// Earlier times are ignored so timers never run backwards.
    pub fn sync_to(&mut self, time: SimTime) -> SimTime {
        if !self.paused && time > self.now {
            self.now = time;
        }
        self.now
    }

    /// Stops the clock.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Restarts the clock from where it stopped.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Whether the clock is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_since_saturates() {
        let early = SimTime::from_millis(100);
        let late = SimTime::from_millis(40);
        assert_eq!(late.millis_since(early), 0);
        assert_eq!(early.millis_since(late), 60);
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut clock = SimClock::new();
        clock.advance(100);
        clock.pause();
        clock.advance(500);
        assert_eq!(clock.now(), SimTime::from_millis(100));
        clock.resume();
        clock.advance(50);
        assert_eq!(clock.now(), SimTime::from_millis(150));
    }

    #[test]
    fn test_sync_never_rewinds() {
        let mut clock = SimClock::new();
        clock.sync_to(SimTime::from_millis(300));
        clock.sync_to(SimTime::from_millis(200));
        assert_eq!(clock.now(), SimTime::from_millis(300));
    }
}
