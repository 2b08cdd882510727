//! Combat entity state machine.
//!
//! This module provides:
//! - [`CombatEntity`]: health, movement intent, cooldowns, ultimate gauge and status effects
//! - The intent half of the public combat API (`move`, `attack`, skill, ultimate)
//! - Damage, heal, death and respawn transitions
//!
//! Firing and ability resolution are handed off as [`FireOrder`] and
//! [`AbilityCast`] values; the entity only does its own bookkeeping.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use skirmish_common::{angle_to, direction_from_angle, try_normalize, EntityId, SimTime, TeamId};

use crate::archetype::ArchetypeProfile;
use crate::cooldown::{Cooldown, UltimateGauge};
use crate::effects::{DashMotion, StatusEffect, StatusEffects};
use crate::events::EffectKind;
use crate::map::ArenaMap;
use crate::projectile::FireOrder;
use crate::skills::{AbilityCast, AbilityEffect, AbilitySlot};
use crate::weapon::WeaponProfile;

/// Aim distance used when a skill is cast without a target point.
pub const DEFAULT_AIM_DISTANCE: f32 = 150.0;

/// Velocities shorter than this count as standing still.
const MOVING_EPSILON: f32 = 1.0e-3;

/// Observable entity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityState {
    /// Standing still, weapon ready
    #[default]
    Idle,
    /// Moving
    Moving,
    /// Inside the post-shot lock
    Attacking,
    /// Standing still, weapon cooling down
    Reloading,
    /// Inside the post-cast lock (includes dashing)
    UsingSkill,
    /// Waiting to respawn
    Dead,
}

/// Result of a damage application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Dead, invincible or non-positive amount
    Ignored,
    /// Health went down
    Damaged {
        /// Health actually removed
        dealt: f32,
    },
    /// Health reached zero
    Killed {
        /// Health actually removed
        dealt: f32,
    },
}

impl DamageOutcome {
    /// Health removed by the hit.
    #[must_use]
    pub fn dealt(&self) -> f32 {
        match self {
            Self::Ignored => 0.0,
            Self::Damaged { dealt } | Self::Killed { dealt } => *dealt,
        }
    }

    /// Whether the hit was fatal.
    #[must_use]
    pub fn is_kill(&self) -> bool {
        matches!(self, Self::Killed { .. })
    }
}

/// Per-entity match statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CombatRecord {
    /// Opponents finished off
    pub kills: u32,
    /// Times died
    pub deaths: u32,
    /// Total health removed from others
    pub damage_dealt: f32,
}

/// A combatant in the arena.
#[derive(Debug, Clone)]
pub struct CombatEntity {
    id: EntityId,
    team: TeamId,
    archetype: String,

    position: Vec2,
    rotation: f32,
    velocity: Vec2,
    radius: f32,
    move_speed: f32,

    health: f32,
    max_health: f32,
    alive: bool,
    collidable: bool,
    state: EntityState,

    weapon: WeaponProfile,
    weapon_cooldown: Cooldown,
    skill: AbilityEffect,
    skill_cooldown: Cooldown,
    skill_lock_ms: u64,
    ultimate: AbilityEffect,
    ultimate_gauge: UltimateGauge,
    charge_per_attack: f32,
    charge_per_skill: f32,
    charge_per_hit: f32,

    effects: StatusEffects,
    lock_until: SimTime,
    lock_state: EntityState,

    respawn_at: Option<SimTime>,
    respawn_delay_ms: u64,
    respawn_invincible_ms: u64,

    record: CombatRecord,
}

impl CombatEntity {
    /// Creates a live entity from an archetype profile.
    #[must_use]
    pub fn from_profile(id: EntityId, team: TeamId, profile: &ArchetypeProfile, position: Vec2) -> Self {
        Self {
            id,
            team,
            archetype: profile.name.clone(),
            position,
            rotation: 0.0,
            velocity: Vec2::ZERO,
            radius: profile.radius,
            move_speed: profile.move_speed,
            health: profile.max_health,
            max_health: profile.max_health,
            alive: true,
            collidable: true,
            state: EntityState::Idle,
            weapon_cooldown: Cooldown::new(profile.weapon.cooldown_ms),
            weapon: profile.weapon.clone(),
            skill: profile.skill.clone(),
            skill_cooldown: Cooldown::new(profile.skill_cooldown_ms),
            skill_lock_ms: profile.skill_lock_ms,
            ultimate: profile.ultimate.clone(),
            ultimate_gauge: UltimateGauge::new(profile.ultimate_cooldown_ms, profile.ultimate_charge_max),
            charge_per_attack: profile.charge_per_attack,
            charge_per_skill: profile.charge_per_skill,
            charge_per_hit: profile.charge_per_hit,
            effects: StatusEffects::new(),
            lock_until: SimTime::ZERO,
            lock_state: EntityState::Idle,
            respawn_at: None,
            respawn_delay_ms: profile.respawn_delay_ms,
            respawn_invincible_ms: profile.respawn_invincible_ms,
            record: CombatRecord::default(),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Entity ID.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Team.
    #[must_use]
    pub fn team(&self) -> TeamId {
        self.team
    }

    /// Archetype name.
    #[must_use]
    pub fn archetype(&self) -> &str {
        &self.archetype
    }

    /// World position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Facing angle in radians.
    #[must_use]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Unit vector along the facing.
    #[must_use]
    pub fn facing(&self) -> Vec2 {
        direction_from_angle(self.rotation)
    }

    /// Current velocity.
    #[must_use]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Body radius.
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Top speed.
    #[must_use]
    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    /// Current health.
    #[must_use]
    pub fn health(&self) -> f32 {
        self.health
    }

    /// Maximum health.
    #[must_use]
    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Health as a fraction of maximum.
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            self.health / self.max_health
        }
    }

    /// Whether the entity is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Whether projectiles and contacts can touch the entity.
    #[must_use]
    pub fn is_collidable(&self) -> bool {
        self.collidable
    }

    /// Observable state.
    #[must_use]
    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Whether damage is currently rejected.
    #[must_use]
    pub fn is_invincible(&self, now: SimTime) -> bool {
        self.effects.is_invincible(now)
    }

    /// Whether a shield is up.
    #[must_use]
    pub fn is_shielded(&self, now: SimTime) -> bool {
        self.effects.is_active(EffectKind::Shield, now)
    }

    /// Whether a dash is in progress.
    #[must_use]
    pub fn is_dashing(&self, now: SimTime) -> bool {
        self.effects.is_active(EffectKind::Dash, now)
    }

    /// Equipped weapon.
    #[must_use]
    pub fn weapon(&self) -> &WeaponProfile {
        &self.weapon
    }

    /// Weapon cooldown clock.
    #[must_use]
    pub fn weapon_cooldown(&self) -> &Cooldown {
        &self.weapon_cooldown
    }

    /// Skill effect record.
    #[must_use]
    pub fn skill(&self) -> &AbilityEffect {
        &self.skill
    }

    /// Ultimate effect record.
    #[must_use]
    pub fn ultimate(&self) -> &AbilityEffect {
        &self.ultimate
    }

    /// Ultimate gauge.
    #[must_use]
    pub fn ultimate_gauge(&self) -> &UltimateGauge {
        &self.ultimate_gauge
    }

    /// Fraction of the skill cooldown that has elapsed.
    #[must_use]
    pub fn skill_cooldown_percent(&self, now: SimTime) -> f32 {
        self.skill_cooldown.percent(now)
    }

    /// Lower of ultimate cooldown and charge progress.
    #[must_use]
    pub fn ultimate_cooldown_percent(&self, now: SimTime) -> f32 {
        self.ultimate_gauge.percent(now)
    }

    /// Whether a skill cast would succeed now.
    #[must_use]
    pub fn skill_ready(&self, now: SimTime) -> bool {
        self.alive && !self.skill.is_none() && self.skill_cooldown.is_ready(now)
    }

    /// Whether an ultimate cast would succeed now.
    #[must_use]
    pub fn ultimate_ready(&self, now: SimTime) -> bool {
        self.alive && !self.ultimate.is_none() && self.ultimate_gauge.is_ready(now)
    }

    /// Status effects.
    #[must_use]
    pub fn effects(&self) -> &StatusEffects {
        &self.effects
    }

    /// Scheduled respawn time while dead.
    #[must_use]
    pub fn respawn_at(&self) -> Option<SimTime> {
        self.respawn_at
    }

    /// Whether a dead entity's respawn delay has run out.
    #[must_use]
    pub fn respawn_due(&self, now: SimTime) -> bool {
        !self.alive && self.respawn_at.is_some_and(|at| now.has_reached(at))
    }

    /// Match statistics.
    #[must_use]
    pub fn record(&self) -> &CombatRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut CombatRecord {
        &mut self.record
    }

    fn is_locked(&self, now: SimTime) -> bool {
        !now.has_reached(self.lock_until) || self.effects.dash().is_some()
    }

    fn lock(&mut self, now: SimTime, duration_ms: u64, state: EntityState) {
        let until = now.after(duration_ms);
        if until > self.lock_until || !self.is_locked(now) {
            self.lock_until = until;
            self.lock_state = state;
        }
    }

    // ------------------------------------------------------------------
    // Intent
    // ------------------------------------------------------------------

    /// Sets movement intent at full speed.
    ///
    /// A zero direction stops the entity. Ignored while dead or locked.
    pub fn move_in_direction(&mut self, direction: Vec2, now: SimTime) {
        self.steer(direction, 1.0, now);
    }

    /// Sets movement intent at a fraction of full speed.
    pub fn steer(&mut self, direction: Vec2, throttle: f32, now: SimTime) {
        if !self.alive || self.is_locked(now) {
            return;
        }
        match try_normalize(direction) {
            Some(dir) => {
                self.velocity = dir * self.move_speed * throttle.clamp(0.0, 1.0);
                if throttle >= 0.5 {
                    self.rotation = dir.y.atan2(dir.x);
                }
            },
            None => self.velocity = Vec2::ZERO,
        }
        self.refresh_state(now);
    }

    /// Commits one trigger pull toward `target`.
    ///
    /// Returns `None` while dead or on cooldown. On success the cooldown and
    /// charge are committed before the weapon resolves, so a shot dropped by
    /// an exhausted projectile pool still costs its cooldown.
    pub fn begin_attack(&mut self, target: Vec2, now: SimTime) -> Option<FireOrder> {
        if !self.alive {
            return None;
        }
        if !self.weapon_cooldown.is_ready(now) {
            debug!(entity = %self.id, remaining_ms = self.weapon_cooldown.remaining_ms(now), "attack on cooldown");
            return None;
        }

        let aim_angle = if target.distance_squared(self.position) > MOVING_EPSILON {
            angle_to(self.position, target)
        } else {
            self.rotation
        };
        self.rotation = aim_angle;
        self.weapon_cooldown.trigger(now);
        self.ultimate_gauge.add_charge(self.charge_per_attack);
        self.lock(now, self.weapon.attack_lock_ms, EntityState::Attacking);
        self.refresh_state(now);

        Some(FireOrder {
            shooter: self.id,
            team: self.team,
            origin: self.position,
            aim_angle,
            target_point: target,
            weapon: self.weapon.clone(),
            range_multiplier: self.effects.range_multiplier(now),
        })
    }

    /// Commits a skill cast.
    ///
    /// Without a target the cast aims [`DEFAULT_AIM_DISTANCE`] along the facing.
    pub fn begin_skill(&mut self, target: Option<Vec2>, now: SimTime) -> Option<AbilityCast> {
        if !self.skill_ready(now) {
            debug!(entity = %self.id, "skill rejected");
            return None;
        }
        let aim = self.resolve_aim(target);
        self.skill_cooldown.trigger(now);
        self.ultimate_gauge.add_charge(self.charge_per_skill);
        self.lock(now, self.skill_lock_ms, EntityState::UsingSkill);
        self.refresh_state(now);
        Some(self.cast(aim, self.skill.clone(), AbilitySlot::Skill))
    }

    /// Commits an ultimate cast. Resets the charge and restarts the cooldown.
    pub fn begin_ultimate(&mut self, target: Option<Vec2>, now: SimTime) -> Option<AbilityCast> {
        if !self.ultimate_ready(now) {
            debug!(entity = %self.id, "ultimate rejected");
            return None;
        }
        let aim = self.resolve_aim(target);
        self.ultimate_gauge.consume(now);
        self.lock(now, self.skill_lock_ms, EntityState::UsingSkill);
        self.refresh_state(now);
        Some(self.cast(aim, self.ultimate.clone(), AbilitySlot::Ultimate))
    }

    fn resolve_aim(&mut self, target: Option<Vec2>) -> Vec2 {
        match target {
            Some(point) => {
                if point.distance_squared(self.position) > MOVING_EPSILON {
                    self.rotation = angle_to(self.position, point);
                }
                point
            },
            None => self.position + self.facing() * DEFAULT_AIM_DISTANCE,
        }
    }

    fn cast(&self, aim: Vec2, effect: AbilityEffect, slot: AbilitySlot) -> AbilityCast {
        AbilityCast {
            caster: self.id,
            team: self.team,
            origin: self.position,
            aim,
            effect,
            slot,
        }
    }

    /// Swaps the weapon. The cooldown keeps its last-use stamp.
    pub fn set_weapon(&mut self, weapon: WeaponProfile) {
        self.weapon_cooldown.set_duration(weapon.cooldown_ms);
        self.weapon = weapon;
    }

    // ------------------------------------------------------------------
    // Incoming effects
    // ------------------------------------------------------------------

    /// Applies damage.
    ///
    /// Ignored while dead or invincible. A shield scales the amount by
    /// `1 - reduction`. Every accepted hit adds ultimate charge, shielded or not.
    pub fn take_damage(&mut self, amount: f32, now: SimTime) -> DamageOutcome {
        if !self.alive || !amount.is_finite() || amount <= 0.0 {
            return DamageOutcome::Ignored;
        }
        if self.effects.is_invincible(now) {
            debug!(entity = %self.id, amount, "damage blocked by invincibility");
            return DamageOutcome::Ignored;
        }

        self.ultimate_gauge.add_charge(self.charge_per_hit);
        let reduction = self.effects.shield_reduction(now).clamp(0.0, 1.0);
        let applied = amount * (1.0 - reduction);
        let dealt = applied.min(self.health);
        self.health = (self.health - applied).clamp(0.0, self.max_health);

        if self.health <= 0.0 {
            self.die(now);
            DamageOutcome::Killed { dealt }
        } else {
            DamageOutcome::Damaged { dealt }
        }
    }

    /// Restores health up to the maximum. Returns the amount restored.
    pub fn heal(&mut self, amount: f32) -> f32 {
        if !self.alive || !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let before = self.health;
        self.health = (self.health + amount).min(self.max_health);
        self.health - before
    }

    /// Applies a timed status effect.
    pub fn apply_status(&mut self, effect: StatusEffect, now: SimTime, duration_ms: u64) {
        if self.alive {
            self.effects.apply(effect, now, duration_ms);
        }
    }

    /// Starts a dash. Movement intent is suspended until it ends.
    pub fn start_dash(&mut self, motion: DashMotion, now: SimTime) {
        if !self.alive {
            return;
        }
        let duration_ms = motion.duration_ms;
        self.velocity = Vec2::ZERO;
        self.effects.apply(StatusEffect::Dash(motion), now, duration_ms);
        self.lock(now, duration_ms, EntityState::UsingSkill);
        self.refresh_state(now);
    }

    pub(crate) fn dash_mut(&mut self) -> Option<&mut DashMotion> {
        self.effects.dash_mut()
    }

    /// Kills the entity. Returns false if it was already dead.
    pub fn die(&mut self, now: SimTime) -> bool {
        if !self.alive {
            return false;
        }
        self.alive = false;
        self.health = 0.0;
        self.velocity = Vec2::ZERO;
        self.collidable = false;
        self.effects.clear();
        self.lock_until = SimTime::ZERO;
        self.respawn_at = Some(now.after(self.respawn_delay_ms));
        self.record.deaths += 1;
        self.state = EntityState::Dead;
        debug!(entity = %self.id, respawn_at = %now.after(self.respawn_delay_ms), "entity died");
        true
    }

    /// Brings the entity back at `position` with full health and a
    /// temporary invincibility window.
    pub fn respawn(&mut self, position: Vec2, now: SimTime) {
        self.alive = true;
        self.collidable = true;
        self.health = self.max_health;
        self.position = position;
        self.velocity = Vec2::ZERO;
        self.respawn_at = None;
        self.lock_until = SimTime::ZERO;
        self.effects.clear();
        if self.respawn_invincible_ms > 0 {
            self.effects
                .apply(StatusEffect::Invincible, now, self.respawn_invincible_ms);
        }
        self.state = EntityState::Idle;
    }

    pub(crate) fn place(&mut self, position: Vec2) {
        self.position = position;
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advances motion and sweeps expired effects.
    ///
    /// Movement resolves X and Y separately so bodies slide along walls.
    /// Returns the kinds of effects that ended this tick.
    pub fn tick(&mut self, now: SimTime, dt_secs: f32, map: &dyn ArenaMap) -> Vec<EffectKind> {
        if !self.alive {
            return Vec::new();
        }

        if let Some(dash) = self.effects.dash() {
            self.position = dash.position_at(now);
        } else if self.velocity.length_squared() > MOVING_EPSILON && dt_secs > 0.0 {
            let step = self.velocity * dt_secs;
            let along_x = self.position + Vec2::new(step.x, 0.0);
            if !map.blocks_circle(along_x, self.radius) {
                self.position = along_x;
            }
            let along_y = self.position + Vec2::new(0.0, step.y);
            if !map.blocks_circle(along_y, self.radius) {
                self.position = along_y;
            }
        }

        let expired = self.effects.sweep(now);
        self.refresh_state(now);
        expired
    }

    fn refresh_state(&mut self, now: SimTime) {
        self.state = if !self.alive {
            EntityState::Dead
        } else if self.is_locked(now) {
            if self.effects.dash().is_some() {
                EntityState::UsingSkill
            } else {
                self.lock_state
            }
        } else if self.velocity.length_squared() > MOVING_EPSILON {
            EntityState::Moving
        } else if !self.weapon_cooldown.is_ready(now) {
            EntityState::Reloading
        } else {
            EntityState::Idle
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::OpenMap;
    use proptest::prelude::*;
    use skirmish_common::Rect;

    fn t(ms: u64) -> SimTime {
        SimTime::from_millis(ms)
    }

    fn recruit() -> CombatEntity {
        CombatEntity::from_profile(
            EntityId::from_raw(1),
            TeamId::new(0),
            &ArchetypeProfile::default(),
            Vec2::new(100.0, 100.0),
        )
    }

    fn shielded_profile() -> ArchetypeProfile {
        ArchetypeProfile {
            skill: AbilityEffect::Shield {
                reduction: 0.3,
                duration_ms: 3000,
            },
            ..ArchetypeProfile::default()
        }
    }

    #[test]
    fn test_spawns_full_and_idle() {
        let e = recruit();
        assert_eq!(e.health(), e.max_health());
        assert_eq!(e.state(), EntityState::Idle);
        assert!(e.is_alive());
    }

    #[test]
    fn test_move_normalizes_and_faces() {
        let mut e = recruit();
        e.move_in_direction(Vec2::new(0.0, 10.0), t(0));
        assert!((e.velocity().length() - e.move_speed()).abs() < 1e-3);
        assert!((e.rotation() - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert_eq!(e.state(), EntityState::Moving);

        e.move_in_direction(Vec2::ZERO, t(0));
        assert_eq!(e.velocity(), Vec2::ZERO);
        assert_eq!(e.state(), EntityState::Idle);
    }

    #[test]
    fn test_move_ignored_during_attack_lock() {
        let mut e = recruit();
        assert!(e.begin_attack(Vec2::new(200.0, 100.0), t(0)).is_some());
        assert_eq!(e.state(), EntityState::Attacking);
        e.move_in_direction(Vec2::new(0.0, 1.0), t(10));
        assert_eq!(e.velocity(), Vec2::ZERO);

        let lock = e.weapon().attack_lock_ms;
        e.move_in_direction(Vec2::new(0.0, 1.0), t(lock));
        assert!(e.velocity().y > 0.0);
    }

    #[test]
    fn test_attack_respects_cooldown_and_charges() {
        let mut e = recruit();
        let order = e.begin_attack(Vec2::new(200.0, 100.0), t(0)).expect("ready");
        assert!(order.aim_angle.abs() < 1e-5);
        assert_eq!(order.shooter, e.id());
        assert!(e.begin_attack(Vec2::new(200.0, 100.0), t(100)).is_none());
        assert_eq!(e.ultimate_gauge().charge(), ArchetypeProfile::default().charge_per_attack);

        let cooldown = e.weapon().cooldown_ms;
        assert!(e.begin_attack(Vec2::new(200.0, 100.0), t(cooldown)).is_some());
    }

    #[test]
    fn test_dead_entity_rejects_everything() {
        let mut e = recruit();
        e.die(t(0));
        assert!(e.begin_attack(Vec2::ZERO, t(10)).is_none());
        assert!(e.begin_skill(None, t(10)).is_none());
        assert_eq!(e.heal(50.0), 0.0);
        assert_eq!(e.take_damage(10.0, t(10)), DamageOutcome::Ignored);
        e.move_in_direction(Vec2::X, t(10));
        assert_eq!(e.velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_shield_reduces_damage_by_factor() {
        let mut e = CombatEntity::from_profile(
            EntityId::from_raw(2),
            TeamId::new(0),
            &shielded_profile(),
            Vec2::ZERO,
        );
        e.apply_status(StatusEffect::Shield { reduction: 0.3 }, t(0), 3000);
        let before = e.health();
        let outcome = e.take_damage(100.0, t(10));
        assert!((before - e.health() - 70.0).abs() < 1e-4);
        assert!((outcome.dealt() - 70.0).abs() < 1e-4);

        // Expired shield no longer applies
        e.heal(1000.0);
        e.take_damage(10.0, t(3000));
        assert!((e.max_health() - e.health() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_hit_charges_gauge_even_when_shielded() {
        let mut e = recruit();
        e.apply_status(StatusEffect::Shield { reduction: 0.9 }, t(0), 3000);
        e.take_damage(5.0, t(1));
        assert_eq!(e.ultimate_gauge().charge(), ArchetypeProfile::default().charge_per_hit);
    }

    #[test]
    fn test_death_and_respawn_round_trip() {
        let mut e = recruit();
        let outcome = e.take_damage(e.max_health() + 50.0, t(1000));
        assert!(outcome.is_kill());
        assert_eq!(e.health(), 0.0);
        assert_eq!(e.state(), EntityState::Dead);
        assert!(!e.is_alive());
        assert!(!e.is_collidable());

        // die is idempotent
        assert!(!e.die(t(1100)));
        assert_eq!(e.record().deaths, 1);

        let delay = ArchetypeProfile::default().respawn_delay_ms;
        assert!(!e.respawn_due(t(1000 + delay - 1)));
        assert!(e.respawn_due(t(1000 + delay)));

        let back = t(1000 + delay);
        e.respawn(Vec2::new(5.0, 5.0), back);
        assert_eq!(e.health(), e.max_health());
        assert_eq!(e.state(), EntityState::Idle);
        assert!(e.is_alive());
        assert_eq!(e.take_damage(30.0, back.after(10)), DamageOutcome::Ignored);
        assert_eq!(e.health(), e.max_health());

        let window = ArchetypeProfile::default().respawn_invincible_ms;
        assert!(matches!(
            e.take_damage(30.0, back.after(window)),
            DamageOutcome::Damaged { .. }
        ));
    }

    #[test]
    fn test_skill_default_aim_and_cooldown_reset() {
        let mut e = CombatEntity::from_profile(
            EntityId::from_raw(3),
            TeamId::new(0),
            &shielded_profile(),
            Vec2::ZERO,
        );
        assert_eq!(e.skill_cooldown_percent(t(500)), 1.0);
        let cast = e.begin_skill(None, t(500)).expect("ready");
        assert_eq!(cast.aim, Vec2::new(DEFAULT_AIM_DISTANCE, 0.0));
        assert_eq!(cast.slot, AbilitySlot::Skill);
        assert_eq!(e.skill_cooldown_percent(t(500)), 0.0);
        assert!(e.begin_skill(Some(Vec2::ONE), t(600)).is_none());
    }

    #[test]
    fn test_entity_without_skill_cannot_cast() {
        let mut e = recruit();
        assert!(e.skill().is_none());
        assert!(e.begin_skill(None, t(0)).is_none());
    }

    #[test]
    fn test_ultimate_needs_full_gauge() {
        let profile = ArchetypeProfile {
            ultimate: AbilityEffect::Barrage { projectiles: 8 },
            ultimate_charge_max: 20.0,
            charge_per_attack: 10.0,
            ..ArchetypeProfile::default()
        };
        let mut e = CombatEntity::from_profile(EntityId::from_raw(4), TeamId::new(0), &profile, Vec2::ZERO);
        assert!(e.begin_ultimate(None, t(0)).is_none());
        let cd = e.weapon().cooldown_ms;
        e.begin_attack(Vec2::X * 100.0, t(0));
        e.begin_attack(Vec2::X * 100.0, t(cd));
        assert!(e.ultimate_ready(t(cd)));
        let cast = e.begin_ultimate(None, t(cd)).expect("ready");
        assert_eq!(cast.slot, AbilitySlot::Ultimate);
        assert_eq!(e.ultimate_gauge().charge(), 0.0);
        assert_eq!(e.ultimate_cooldown_percent(t(cd)), 0.0);
    }

    #[test]
    fn test_slides_along_wall() {
        let map = OpenMap::new(1000.0, 1000.0)
            .with_wall(Rect::new(Vec2::new(130.0, 0.0), Vec2::new(200.0, 1000.0)));
        let mut e = recruit();
        e.move_in_direction(Vec2::new(1.0, 1.0), t(0));
        for step in 1..=20 {
            e.tick(t(step * 50), 0.05, &map);
        }
        // Blocked on X by the wall, still travelled on Y
        assert!(e.position().x + e.radius() <= 130.0);
        assert!(e.position().y > 200.0);
    }

    #[test]
    fn test_dash_moves_and_ends() {
        let map = OpenMap::default();
        let mut e = recruit();
        e.start_dash(
            DashMotion {
                from: e.position(),
                to: e.position() + Vec2::new(100.0, 0.0),
                started: t(0),
                duration_ms: 200,
                contact_damage: 0.0,
                contact_radius: 0.0,
                hit: ahash::AHashSet::new(),
            },
            t(0),
        );
        assert_eq!(e.state(), EntityState::UsingSkill);
        e.tick(t(100), 0.1, &map);
        assert!((e.position().x - 150.0).abs() < 1e-3);
        assert!(e.is_invincible(t(100)));
        let expired = e.tick(t(200), 0.1, &map);
        assert!((e.position().x - 200.0).abs() < 1e-3);
        assert_eq!(expired, vec![EffectKind::Dash]);
        assert!(!e.is_invincible(t(200)));
        assert_eq!(e.state(), EntityState::Idle);
    }

    proptest! {
        #[test]
        fn prop_health_stays_clamped(ops in proptest::collection::vec((any::<bool>(), -50.0f32..400.0), 1..60)) {
            let mut e = recruit();
            let mut now = 0u64;
            for (is_damage, amount) in ops {
                now += 10;
                if is_damage {
                    e.take_damage(amount, t(now));
                } else {
                    e.heal(amount);
                }
                prop_assert!(e.health() >= 0.0);
                prop_assert!(e.health() <= e.max_health());
                prop_assert_eq!(e.is_alive(), e.health() > 0.0);
                prop_assert_eq!(e.state() == EntityState::Dead, !e.is_alive());
            }
        }
    }
}
