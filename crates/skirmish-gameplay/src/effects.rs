//! Timed status effects.
//!
//! Each effect is a record with its own expiry stamp, stored on the entity
//! and swept by the entity's own tick. Nothing is scheduled as a callback,
//! so an entity that dies or is removed simply stops being swept.

use ahash::AHashSet;
use glam::Vec2;

use skirmish_common::{EntityId, SimTime};

use crate::events::EffectKind;

/// Positional displacement in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DashMotion {
    /// Start of the dash
    pub from: Vec2,
    /// End of the dash (already stopped short of walls)
    pub to: Vec2,
    /// When the dash began
    pub started: SimTime,
    /// Dash length in time
    pub duration_ms: u64,
    /// Damage dealt to each opponent touched
    pub contact_damage: f32,
    /// Extra reach added to the caster's radius for contact checks
    pub contact_radius: f32,
    /// Opponents already hit during this dash
    pub hit: AHashSet<EntityId>,
}

impl DashMotion {
    /// Position along the dash at `now`.
    #[must_use]
    pub fn position_at(&self, now: SimTime) -> Vec2 {
        if self.duration_ms == 0 {
            return self.to;
        }
        let t = now.millis_since(self.started) as f32 / self.duration_ms as f32;
        self.from.lerp(self.to, t.clamp(0.0, 1.0))
    }
}

/// An active status effect.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEffect {
    /// Multiplies incoming damage by `1 - reduction`.
    Shield {
        /// Fraction of damage absorbed
        reduction: f32,
    },
    /// Multiplies weapon range.
    Scope {
        /// Range multiplier
        range_multiplier: f32,
    },
    /// Rejects all damage.
    Invincible,
    /// Dash displacement; also grants invincibility.
    Dash(DashMotion),
}

impl StatusEffect {
    /// Key used for refresh and expiry notifications.
    #[must_use]
    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Shield { .. } => EffectKind::Shield,
            Self::Scope { .. } => EffectKind::Scope,
            Self::Invincible => EffectKind::Invincible,
            Self::Dash(_) => EffectKind::Dash,
        }
    }
}

/// An effect together with its expiry stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEffect {
    /// The effect
    pub effect: StatusEffect,
    /// When it stops applying
    pub expires_at: SimTime,
}

impl ScheduledEffect {
    fn is_live(&self, now: SimTime) -> bool {
        !now.has_reached(self.expires_at)
    }
}

/// The set of effects on one entity. At most one effect per kind.
#[derive(Debug, Clone, Default)]
pub struct StatusEffects {
    active: Vec<ScheduledEffect>,
}

impl StatusEffects {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an effect for `duration_ms`.
    ///
    /// Re-applying a kind replaces the old record, so magnitudes never
    /// stack and the expiry clock restarts.
    pub fn apply(&mut self, effect: StatusEffect, now: SimTime, duration_ms: u64) {
        let kind = effect.kind();
        self.active.retain(|e| e.effect.kind() != kind);
        self.active.push(ScheduledEffect {
            effect,
            expires_at: now.after(duration_ms),
        });
    }

    /// Drops effects whose time is up and returns their kinds.
    pub fn sweep(&mut self, now: SimTime) -> Vec<EffectKind> {
        let mut expired = Vec::new();
        self.active.retain(|e| {
            if e.is_live(now) {
                true
            } else {
                expired.push(e.effect.kind());
                false
            }
        });
        expired
    }

    /// Removes everything, e.g. on death.
    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Removes one kind early.
    pub fn remove(&mut self, kind: EffectKind) {
        self.active.retain(|e| e.effect.kind() != kind);
    }

    /// Whether a kind is in force at `now`.
    #[must_use]
    pub fn is_active(&self, kind: EffectKind, now: SimTime) -> bool {
        self.live(now).any(|e| e.effect.kind() == kind)
    }

    /// Expiry stamp of a kind, if present.
    #[must_use]
    pub fn expires_at(&self, kind: EffectKind) -> Option<SimTime> {
        self.active
            .iter()
            .find(|e| e.effect.kind() == kind)
            .map(|e| e.expires_at)
    }

    /// Active shield reduction, zero without a shield.
    #[must_use]
    pub fn shield_reduction(&self, now: SimTime) -> f32 {
        self.live(now)
            .find_map(|e| match e.effect {
                StatusEffect::Shield { reduction } => Some(reduction),
                _ => None,
            })
            .unwrap_or(0.0)
    }

    /// Active range multiplier, `1.0` without a scope.
    #[must_use]
    pub fn range_multiplier(&self, now: SimTime) -> f32 {
        self.live(now)
            .find_map(|e| match e.effect {
                StatusEffect::Scope { range_multiplier } => Some(range_multiplier),
                _ => None,
            })
            .unwrap_or(1.0)
    }

    /// Whether damage is currently rejected.
    #[must_use]
    pub fn is_invincible(&self, now: SimTime) -> bool {
        self.live(now).any(|e| {
            matches!(
                e.effect,
                StatusEffect::Invincible | StatusEffect::Dash(_)
            )
        })
    }

    /// The dash in progress, including one whose time ran out but has not been swept.
    #[must_use]
    pub fn dash(&self) -> Option<&DashMotion> {
        self.active.iter().find_map(|e| match &e.effect {
            StatusEffect::Dash(motion) => Some(motion),
            _ => None,
        })
    }

    /// Mutable access to the dash in progress.
    pub fn dash_mut(&mut self) -> Option<&mut DashMotion> {
        self.active.iter_mut().find_map(|e| match &mut e.effect {
            StatusEffect::Dash(motion) => Some(motion),
            _ => None,
        })
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no effects are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn live(&self, now: SimTime) -> impl Iterator<Item = &ScheduledEffect> {
        self.active.iter().filter(move |e| e.is_live(now))
    }
}
