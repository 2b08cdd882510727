//! Cooldown clocks and the ultimate charge gauge.
//!
//! Cooldowns store the time of last use and compare it against the current
//! [`SimTime`]; they never count down. Readiness and percent queries are O(1)
//! at any moment and survive clock pauses untouched.

use serde::{Deserialize, Serialize};
use skirmish_common::SimTime;

/// Elapsed-time cooldown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldown {
    duration_ms: u64,
    last_used: Option<SimTime>,
}

impl Cooldown {
    /// Creates a cooldown that starts ready.
    #[must_use]
    pub const fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            last_used: None,
        }
    }

    /// Configured duration.
    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Changes the duration without touching the last-use stamp.
    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
    }

    /// Time of the last successful use.
    #[must_use]
    pub const fn last_used(&self) -> Option<SimTime> {
        self.last_used
    }

    /// Fraction of the cooldown that has elapsed, clamped to `[0, 1]`.
    #[must_use]
    pub fn percent(&self, now: SimTime) -> f32 {
        match self.last_used {
            None => 1.0,
            Some(_) if self.duration_ms == 0 => 1.0,
            Some(used) => {
                (now.millis_since(used) as f64 / self.duration_ms as f64).clamp(0.0, 1.0) as f32
            },
        }
    }

    /// Milliseconds until ready.
    #[must_use]
    pub fn remaining_ms(&self, now: SimTime) -> u64 {
        self.last_used.map_or(0, |used| {
            self.duration_ms.saturating_sub(now.millis_since(used))
        })
    }

    /// Whether the action may be used at `now`.
    #[must_use]
    pub fn is_ready(&self, now: SimTime) -> bool {
        self.remaining_ms(now) == 0
    }

    /// Stamps a use at `now`. Stamps never move backwards.
    pub fn trigger(&mut self, now: SimTime) {
        self.last_used = Some(self.last_used.map_or(now, |prev| prev.max(now)));
    }

    /// Makes the cooldown ready again.
    pub fn reset(&mut self) {
        self.last_used = None;
    }
}

/// Ultimate gate: a cooldown plus an optional charge gauge.
///
/// With `max_charge == 0` only the cooldown gates the ultimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltimateGauge {
    charge: f32,
    max_charge: f32,
    cooldown: Cooldown,
}

impl UltimateGauge {
    /// Creates an empty gauge.
    #[must_use]
    pub fn new(cooldown_ms: u64, max_charge: f32) -> Self {
        Self {
            charge: 0.0,
            max_charge: max_charge.max(0.0),
            cooldown: Cooldown::new(cooldown_ms),
        }
    }

    /// Current charge.
    #[must_use]
    pub fn charge(&self) -> f32 {
        self.charge
    }

    /// Charge needed to fire.
    #[must_use]
    pub fn max_charge(&self) -> f32 {
        self.max_charge
    }

    /// The underlying cooldown.
    #[must_use]
    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    /// Adds charge, saturating at the maximum.
    pub fn add_charge(&mut self, amount: f32) {
        if self.max_charge <= 0.0 || !amount.is_finite() || amount <= 0.0 {
            return;
        }
        self.charge = (self.charge + amount).min(self.max_charge);
    }

    fn charge_percent(&self) -> f32 {
        if self.max_charge <= 0.0 {
            1.0
        } else {
            (self.charge / self.max_charge).clamp(0.0, 1.0)
        }
    }

    /// Lower of cooldown progress and charge progress.
    #[must_use]
    pub fn percent(&self, now: SimTime) -> f32 {
        self.cooldown.percent(now).min(self.charge_percent())
    }

    /// Whether the ultimate may fire.
    #[must_use]
    pub fn is_ready(&self, now: SimTime) -> bool {
        self.cooldown.is_ready(now) && self.charge_percent() >= 1.0
    }

    /// Spends the gauge: charge to zero and cooldown restarted.
    pub fn consume(&mut self, now: SimTime) {
        self.charge = 0.0;
        self.cooldown.trigger(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(ms: u64) -> SimTime {
        SimTime::from_millis(ms)
    }

    #[test]
    fn test_cooldown_starts_ready() {
        let cd = Cooldown::new(1000);
        assert!(cd.is_ready(t(0)));
        assert_eq!(cd.percent(t(0)), 1.0);
    }

    #[test]
    fn test_cooldown_percent_progresses() {
        let mut cd = Cooldown::new(1000);
        cd.trigger(t(500));
        assert_eq!(cd.percent(t(500)), 0.0);
        assert!((cd.percent(t(750)) - 0.25).abs() < 1e-6);
        assert!(!cd.is_ready(t(1499)));
        assert!(cd.is_ready(t(1500)));
        assert_eq!(cd.percent(t(9000)), 1.0);
        assert_eq!(cd.remaining_ms(t(1000)), 500);
    }

    #[test]
    fn test_cooldown_trigger_never_rewinds() {
        let mut cd = Cooldown::new(100);
        cd.trigger(t(500));
        cd.trigger(t(200));
        assert_eq!(cd.last_used(), Some(t(500)));
    }

    #[test]
    fn test_zero_duration_always_ready() {
        let mut cd = Cooldown::new(0);
        cd.trigger(t(10));
        assert!(cd.is_ready(t(10)));
        assert_eq!(cd.percent(t(10)), 1.0);
    }

    #[test]
    fn test_gauge_needs_charge_and_cooldown() {
        let mut gauge = UltimateGauge::new(1000, 100.0);
        assert!(!gauge.is_ready(t(0)));
        gauge.add_charge(60.0);
        assert!((gauge.percent(t(0)) - 0.6).abs() < 1e-6);
        gauge.add_charge(60.0);
        assert_eq!(gauge.charge(), 100.0);
        assert!(gauge.is_ready(t(0)));

        gauge.consume(t(0));
        assert_eq!(gauge.charge(), 0.0);
        gauge.add_charge(100.0);
        assert!(!gauge.is_ready(t(999)));
        assert!(gauge.is_ready(t(1000)));
    }

    #[test]
    fn test_gauge_without_charge_is_cooldown_only() {
        let mut gauge = UltimateGauge::new(500, 0.0);
        assert!(gauge.is_ready(t(0)));
        gauge.consume(t(0));
        assert!((gauge.percent(t(250)) - 0.5).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_percent_is_monotonic_between_uses(
            duration in 1u64..10_000,
            used in 0u64..10_000,
            steps in proptest::collection::vec(0u64..20_000, 1..30),
        ) {
            let mut steps = steps;
            let mut cd = Cooldown::new(duration);
            cd.trigger(t(used));
            prop_assert_eq!(cd.percent(t(used)), 0.0);
            steps.sort_unstable();
            let mut last = 0.0_f32;
            for step in steps {
                let p = cd.percent(t(used + step));
                prop_assert!((0.0..=1.0).contains(&p));
                prop_assert!(p >= last);
                last = p;
            }
        }
    }
}
