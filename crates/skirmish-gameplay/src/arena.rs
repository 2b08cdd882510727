//! Arena: the per-frame tick driver.
//!
//! The arena owns every subsystem and runs one `update(time, delta)` pass
//! per host frame:
//! 1. Bots re-evaluate and issue intents through the public combat API
//! 2. Dash contacts resolve along each dasher's path for this frame
//! 3. Entities respawn or advance motion and sweep expired effects
//! 4. Projectiles travel and collide
//! 5. Hazards fire fuses, triggers and heal ticks
//! 6. Queued removals are applied
//!
//! Removals are deferred to the end of the pass so no system iterates a
//! roster that is shrinking under it.

use std::mem;

use glam::Vec2;
use thiserror::Error;
use tracing::{debug, info};

use skirmish_common::{
    segment_hits_circle, DataError, EntityId, IdAllocator, ProjectileId, Rect, SimClock, SimTime,
    TeamId,
};

use crate::ai::{BotAi, CombatControls, CombatView, CombatantView, Difficulty};
use crate::archetype::{ArchetypeProfile, ArchetypeTable};
use crate::entity::{CombatEntity, DamageOutcome};
use crate::events::{CombatEvent, EventBus};
use crate::hazard::Hazards;
use crate::map::ArenaMap;
use crate::projectile::{ProjectileSystem, DEFAULT_POOL_CAPACITY};
use crate::roster::Roster;
use crate::skills::{resolve, AbilityCast, AbilityContext};

/// Errors from the fallible setup APIs.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ArenaError {
    /// No entity with that ID
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// A bot already drives the entity
    #[error("Entity {0} already has a bot attached")]
    BotAlreadyAttached(EntityId),

    /// A supplied profile failed validation
    #[error("Invalid archetype: {0}")]
    InvalidArchetype(#[from] DataError),
}

/// Result type for arena setup operations.
pub type ArenaResult<T> = Result<T, ArenaError>;

/// Construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaSettings {
    /// Projectile pool size
    pub projectile_capacity: usize,
    /// Event bus capacity
    pub event_capacity: usize,
    /// Seed for weapon jitter, ability scatter and bot rolls
    pub seed: u64,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            projectile_capacity: DEFAULT_POOL_CAPACITY,
            event_capacity: 4096,
            seed: 0x5EED,
        }
    }
}

/// The combat simulation.
pub struct Arena {
    clock: SimClock,
    map: Box<dyn ArenaMap>,
    archetypes: ArchetypeTable,
    roster: Roster,
    projectiles: ProjectileSystem,
    hazards: Hazards,
    bots: Vec<BotAi>,
    events: EventBus,
    rng: fastrand::Rng,
    seed: u64,
    ids: IdAllocator,
    pending_removals: Vec<EntityId>,
}

impl Arena {
    /// Creates an empty arena at time zero.
    #[must_use]
    pub fn new(map: Box<dyn ArenaMap>, archetypes: ArchetypeTable, settings: ArenaSettings) -> Self {
        Self {
            clock: SimClock::new(),
            map,
            archetypes,
            roster: Roster::new(),
            projectiles: ProjectileSystem::new(settings.projectile_capacity),
            hazards: Hazards::new(),
            bots: Vec::new(),
            events: EventBus::new(settings.event_capacity),
            rng: fastrand::Rng::with_seed(settings.seed),
            seed: settings.seed,
            ids: IdAllocator::new(),
            pending_removals: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current simulation time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// The simulation clock.
    pub fn clock_mut(&mut self) -> &mut SimClock {
        &mut self.clock
    }

    /// Level geometry.
    #[must_use]
    pub fn map(&self) -> &dyn ArenaMap {
        self.map.as_ref()
    }

    /// Archetype table in use.
    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeTable {
        &self.archetypes
    }

    /// All combatants.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Live projectiles.
    #[must_use]
    pub fn projectiles(&self) -> &ProjectileSystem {
        &self.projectiles
    }

    /// Placed hazards.
    #[must_use]
    pub fn hazards(&self) -> &Hazards {
        &self.hazards
    }

    /// Event bus for presentation layers.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Takes every pending event.
    pub fn drain_events(&self) -> Vec<CombatEvent> {
        self.events.drain()
    }

    /// Looks up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&CombatEntity> {
        self.roster.get(id)
    }

    /// Looks up an entity, failing if it does not exist.
    pub fn try_entity(&self, id: EntityId) -> ArenaResult<&CombatEntity> {
        self.roster.get(id).ok_or(ArenaError::UnknownEntity(id))
    }

    /// Attached bots.
    pub fn bots(&self) -> impl Iterator<Item = &BotAi> {
        self.bots.iter()
    }

    /// The bot driving `owner`.
    pub fn bot_mut(&mut self, owner: EntityId) -> Option<&mut BotAi> {
        self.bots.iter_mut().find(|b| b.owner() == owner)
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Spawns an archetype at its team's spawn point.
    ///
    /// Unknown archetype names fall back to the neutral profile.
    pub fn spawn(&mut self, archetype: &str, team: TeamId) -> EntityId {
        let position = self.map.spawn_point(team);
        self.spawn_at(archetype, team, position)
    }

    /// Spawns an archetype at a fixed position.
    pub fn spawn_at(&mut self, archetype: &str, team: TeamId, position: Vec2) -> EntityId {
        let id = EntityId::from_raw(self.ids.next_raw());
        let entity = CombatEntity::from_profile(id, team, self.archetypes.get_or_default(archetype), position);
        self.insert(entity)
    }

    /// Spawns from an ad-hoc profile after validating it.
    pub fn spawn_profile(
        &mut self,
        profile: &ArchetypeProfile,
        team: TeamId,
        position: Vec2,
    ) -> ArenaResult<EntityId> {
        profile.validate()?;
        let id = EntityId::from_raw(self.ids.next_raw());
        Ok(self.insert(CombatEntity::from_profile(id, team, profile, position)))
    }

    fn insert(&mut self, entity: CombatEntity) -> EntityId {
        let (team, position) = (entity.team(), entity.position());
        info!(entity = %entity.id(), archetype = entity.archetype(), %team, "entity spawned");
        let id = self.roster.insert(entity);
        self.events.publish(CombatEvent::Spawned {
            entity_id: id,
            team,
            position,
        });
        id
    }

    /// Queues an entity for removal at the end of the next update.
    ///
    /// Returns false if the entity does not exist.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        if !self.roster.contains(id) {
            return false;
        }
        if !self.pending_removals.contains(&id) {
            self.pending_removals.push(id);
        }
        true
    }

    /// Binds a bot to `owner`, chasing `target`.
    pub fn attach_bot(
        &mut self,
        owner: EntityId,
        target: Option<EntityId>,
        difficulty: Difficulty,
    ) -> ArenaResult<()> {
        if !self.roster.contains(owner) {
            return Err(ArenaError::UnknownEntity(owner));
        }
        if self.bots.iter().any(|b| b.owner() == owner) {
            return Err(ArenaError::BotAlreadyAttached(owner));
        }
        let seed = self.seed ^ owner.raw().wrapping_mul(0x9E37_79B9_7F4A_7C15);
        self.bots.push(BotAi::new(owner, target, difficulty, seed));
        debug!(entity = %owner, ?target, ?difficulty, "bot attached");
        Ok(())
    }

    /// Unbinds the bot driving `owner`. Returns false if there was none.
    pub fn detach_bot(&mut self, owner: EntityId) -> bool {
        let before = self.bots.len();
        self.bots.retain(|b| b.owner() != owner);
        self.bots.len() != before
    }

    // ========================================================================
    // Combat API
    // ========================================================================

    /// Sets full-speed movement intent.
    pub fn move_entity(&mut self, id: EntityId, direction: Vec2) {
        self.steer(id, direction, 1.0);
    }

    /// Sets movement intent at a fraction of full speed.
    pub fn steer(&mut self, id: EntityId, direction: Vec2, throttle: f32) {
        let now = self.clock.now();
        if let Some(entity) = self.roster.get_mut(id) {
            entity.steer(direction, throttle, now);
        }
    }

    /// Fires the entity's weapon at `target`. False if rejected.
    pub fn attack(&mut self, id: EntityId, target: Vec2) -> bool {
        let now = self.clock.now();
        let Some(order) = self
            .roster
            .get_mut(id)
            .and_then(|e| e.begin_attack(target, now))
        else {
            return false;
        };
        self.projectiles.fire(
            &order,
            now,
            &mut self.roster,
            self.map.as_ref(),
            &self.events,
            &mut self.rng,
        );
        true
    }

    /// Casts the skill. False if rejected.
    pub fn use_skill(&mut self, id: EntityId, target: Option<Vec2>) -> bool {
        let now = self.clock.now();
        match self.roster.get_mut(id).and_then(|e| e.begin_skill(target, now)) {
            Some(cast) => self.resolve_cast(&cast),
            None => false,
        }
    }

    /// Casts the ultimate. False if rejected.
    pub fn use_ultimate(&mut self, id: EntityId, target: Option<Vec2>) -> bool {
        let now = self.clock.now();
        match self
            .roster
            .get_mut(id)
            .and_then(|e| e.begin_ultimate(target, now))
        {
            Some(cast) => self.resolve_cast(&cast),
            None => false,
        }
    }

    fn resolve_cast(&mut self, cast: &AbilityCast) -> bool {
        let mut ctx = AbilityContext {
            now: self.clock.now(),
            roster: &mut self.roster,
            projectiles: &mut self.projectiles,
            hazards: &mut self.hazards,
            map: self.map.as_ref(),
            events: &self.events,
            rng: &mut self.rng,
        };
        resolve(cast, &mut ctx)
    }

    /// Applies damage from outside the weapon system.
    pub fn take_damage(&mut self, id: EntityId, amount: f32, source: Option<EntityId>) -> DamageOutcome {
        let now = self.clock.now();
        self.roster.apply_damage(id, amount, source, now, &self.events)
    }

    /// Heals an entity. Returns health restored.
    pub fn heal(&mut self, id: EntityId, amount: f32) -> f32 {
        self.roster.apply_heal(id, amount, &self.events)
    }

    /// Detonates a projectile early. False if it no longer exists.
    pub fn explode_projectile(&mut self, id: ProjectileId) -> bool {
        let now = self.clock.now();
        self.projectiles
            .explode(id, now, &mut self.roster, &self.events)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advances the clock by `delta_ms` and runs one pass.
    pub fn step(&mut self, delta_ms: u64) {
        let now = self.clock.advance(delta_ms);
        self.update(now, delta_ms);
    }

    /// Runs one pass at host time `time`, `delta_ms` after the previous one.
    ///
    /// Times earlier than the current clock are clamped to it.
    pub fn update(&mut self, time: SimTime, delta_ms: u64) {
        let now = self.clock.sync_to(time);
        let dt_secs = delta_ms as f32 / 1000.0;

        let mut bots = mem::take(&mut self.bots);
        for bot in &mut bots {
            bot.update(now, self);
        }
        bots.append(&mut self.bots);
        self.bots = bots;

        self.resolve_dash_contacts(now, delta_ms);
        self.tick_entities(now, dt_secs);
        self.projectiles
            .update(now, dt_secs, &mut self.roster, self.map.as_ref(), &self.events);
        self.hazards.update(now, &mut self.roster, &self.events);
        self.flush_removals();
    }

    fn resolve_dash_contacts(&mut self, now: SimTime, delta_ms: u64) {
        let previous = SimTime::from_millis(now.as_millis().saturating_sub(delta_ms));
        let dashers: Vec<(EntityId, TeamId, Vec2, Vec2, f32, f32)> = self
            .roster
            .iter()
            .filter(|e| e.is_alive())
            .filter_map(|e| {
                let dash = e.effects().dash()?;
                (dash.contact_damage > 0.0).then(|| {
                    (
                        e.id(),
                        e.team(),
                        dash.position_at(previous),
                        dash.position_at(now),
                        e.radius() + dash.contact_radius,
                        dash.contact_damage,
                    )
                })
            })
            .collect();

        for (dasher, team, from, to, reach, damage) in dashers {
            let already_hit = |id: EntityId| {
                self.roster
                    .get(dasher)
                    .and_then(|e| e.effects().dash())
                    .is_some_and(|d| d.hit.contains(&id))
            };
            let victims: Vec<EntityId> = self
                .roster
                .opponents_of(team)
                .filter(|o| segment_hits_circle(from, to, o.position(), reach + o.radius()))
                .map(CombatEntity::id)
                .filter(|id| !already_hit(*id))
                .collect();

            for victim in victims {
                if let Some(dash) = self.roster.get_mut(dasher).and_then(|e| e.dash_mut()) {
                    dash.hit.insert(victim);
                }
                debug!(entity = %dasher, %victim, damage, "dash contact");
                self.roster
                    .apply_damage(victim, damage, Some(dasher), now, &self.events);
            }
        }
    }

    fn tick_entities(&mut self, now: SimTime, dt_secs: f32) {
        for id in self.roster.ids() {
            let Some(entity) = self.roster.get_mut(id) else {
                continue;
            };
            if entity.respawn_due(now) {
                let position = self.map.spawn_point(entity.team());
                entity.respawn(position, now);
                info!(entity = %id, x = position.x, y = position.y, "entity respawned");
                self.events.publish(CombatEvent::Respawned {
                    entity_id: id,
                    position,
                });
                continue;
            }
            for effect in entity.tick(now, dt_secs, self.map.as_ref()) {
                self.events.publish(CombatEvent::EffectExpired {
                    entity_id: id,
                    effect,
                });
            }
        }
    }

    fn flush_removals(&mut self) {
        for id in mem::take(&mut self.pending_removals) {
            if self.roster.remove(id).is_none() {
                continue;
            }
            self.projectiles.forget_target(id);
            self.bots.retain(|b| b.owner() != id);
            info!(entity = %id, "entity removed");
            self.events.publish(CombatEvent::Removed { entity_id: id });
        }
    }
}

impl CombatControls for Arena {
    fn move_entity(&mut self, id: EntityId, direction: Vec2) {
        Arena::move_entity(self, id, direction);
    }

    fn move_entity_with_throttle(&mut self, id: EntityId, direction: Vec2, throttle: f32) {
        self.steer(id, direction, throttle);
    }

    fn attack(&mut self, id: EntityId, target: Vec2) -> bool {
        Arena::attack(self, id, target)
    }

    fn use_skill(&mut self, id: EntityId, target: Option<Vec2>) -> bool {
        Arena::use_skill(self, id, target)
    }

    fn use_ultimate(&mut self, id: EntityId, target: Option<Vec2>) -> bool {
        Arena::use_ultimate(self, id, target)
    }
}

impl CombatView for Arena {
    fn combatant(&self, id: EntityId) -> Option<CombatantView> {
        let now = self.clock.now();
        self.roster.get(id).map(|e| CombatantView {
            position: e.position(),
            health: e.health(),
            max_health: e.max_health(),
            alive: e.is_alive(),
            skill_ready: e.skill_ready(now),
            ultimate_ready: e.ultimate_ready(now),
        })
    }

    fn world_bounds(&self) -> Rect {
        self.map.bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityState;
    use crate::map::OpenMap;

    fn arena(map: OpenMap) -> Arena {
        Arena::new(Box::new(map), ArchetypeTable::builtin(), ArenaSettings::default())
    }

    fn duel_map() -> OpenMap {
        OpenMap::new(1000.0, 1000.0)
            .with_spawn(TeamId::new(0), Vec2::new(100.0, 500.0))
            .with_spawn(TeamId::new(1), Vec2::new(300.0, 500.0))
    }

    #[test]
    fn test_spawn_uses_map_and_falls_back_to_neutral() {
        let mut arena = arena(duel_map());
        let medic = arena.spawn("medic", TeamId::new(0));
        let stranger = arena.spawn("pirate", TeamId::new(1));

        let medic = arena.entity(medic).expect("spawned");
        assert_eq!(medic.archetype(), "medic");
        assert_eq!(medic.position(), Vec2::new(100.0, 500.0));
        assert_eq!(arena.entity(stranger).map(CombatEntity::archetype), Some("recruit"));
        assert_eq!(
            arena
                .drain_events()
                .iter()
                .filter(|e| matches!(e, CombatEvent::Spawned { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_spawn_profile_rejects_invalid_data() {
        let mut arena = arena(duel_map());
        let bad = ArchetypeProfile::named("glass").with_health(-5.0);
        assert!(matches!(
            arena.spawn_profile(&bad, TeamId::new(0), Vec2::ZERO),
            Err(ArenaError::InvalidArchetype(_))
        ));
        assert!(arena.roster().is_empty());
    }

    #[test]
    fn test_shots_kill_then_respawn_with_invincibility() {
        let mut arena = arena(duel_map());
        let shooter = arena.spawn("recruit", TeamId::new(0));
        let target = arena.spawn("recruit", TeamId::new(1));
        let mut events = Vec::new();

        for _ in 0..200 {
            if !arena.entity(target).is_some_and(CombatEntity::is_alive) {
                break;
            }
            arena.attack(shooter, Vec2::new(300.0, 500.0));
            arena.step(50);
            events.extend(arena.drain_events());
        }
        let victim = arena.entity(target).expect("still in roster");
        assert_eq!(victim.state(), EntityState::Dead);
        assert_eq!(victim.health(), 0.0);
        assert!(events
            .iter()
            .any(|e| matches!(e, CombatEvent::Died { entity_id, killer: Some(k), .. } if *entity_id == target && *k == shooter)));
        assert_eq!(arena.entity(shooter).map(|e| e.record().kills), Some(1));

        for _ in 0..70 {
            arena.step(50);
        }
        let victim = arena.entity(target).expect("respawned");
        assert!(victim.is_alive());
        assert_eq!(victim.health(), victim.max_health());
        assert_eq!(victim.position(), Vec2::new(300.0, 500.0));
        assert!(victim.is_invincible(arena.now()));
        assert!(arena
            .drain_events()
            .iter()
            .any(|e| matches!(e, CombatEvent::Respawned { entity_id, .. } if *entity_id == target)));
    }

    #[test]
    fn test_skill_through_arena_publishes_activation() {
        let mut arena = arena(duel_map());
        let guardian = arena.spawn("guardian", TeamId::new(0));
        assert!(arena.use_skill(guardian, None));
        assert!(!arena.use_skill(guardian, None));
        assert!(arena.entity(guardian).is_some_and(|e| e.is_shielded(arena.now())));
        assert!(arena
            .drain_events()
            .iter()
            .any(|e| matches!(e, CombatEvent::AbilityActivated { effect, .. } if effect == "shield")));
    }

    #[test]
    fn test_dash_contact_hits_each_opponent_once() {
        let mut arena = arena(OpenMap::new(1000.0, 1000.0));
        let striker = arena.spawn_at("striker", TeamId::new(0), Vec2::new(100.0, 500.0));
        let enemy = arena.spawn_at("recruit", TeamId::new(1), Vec2::new(200.0, 500.0));
        let ally = arena.spawn_at("recruit", TeamId::new(0), Vec2::new(150.0, 500.0));

        assert!(arena.use_skill(striker, Some(Vec2::new(400.0, 500.0))));
        for _ in 0..6 {
            arena.step(50);
        }
        assert_eq!(arena.entity(enemy).map(CombatEntity::health), Some(75.0));
        assert_eq!(arena.entity(ally).map(CombatEntity::health), Some(100.0));
        let striker = arena.entity(striker).expect("striker");
        assert!(striker.position().x > 300.0);
        assert!(!striker.is_dashing(arena.now()));
    }

    #[test]
    fn test_removal_is_deferred_and_drops_bot() {
        let mut arena = arena(duel_map());
        let a = arena.spawn("recruit", TeamId::new(0));
        let b = arena.spawn("recruit", TeamId::new(1));
        arena.attach_bot(a, Some(b), Difficulty::Normal).expect("attached");

        assert!(arena.remove_entity(a));
        assert!(arena.entity(a).is_some());
        arena.step(16);
        assert!(arena.entity(a).is_none());
        assert_eq!(arena.bots().count(), 0);
        assert!(!arena.remove_entity(a));
        assert!(arena
            .drain_events()
            .iter()
            .any(|e| matches!(e, CombatEvent::Removed { entity_id } if *entity_id == a)));
    }

    #[test]
    fn test_attach_bot_errors() {
        let mut arena = arena(duel_map());
        let a = arena.spawn("recruit", TeamId::new(0));
        assert_eq!(
            arena.attach_bot(EntityId::from_raw(999), None, Difficulty::Easy),
            Err(ArenaError::UnknownEntity(EntityId::from_raw(999)))
        );
        assert!(arena.attach_bot(a, None, Difficulty::Easy).is_ok());
        assert_eq!(
            arena.attach_bot(a, None, Difficulty::Hard),
            Err(ArenaError::BotAlreadyAttached(a))
        );
        assert!(arena.detach_bot(a));
        assert!(!arena.detach_bot(a));
    }

    #[test]
    fn test_bots_fight_each_other() {
        let map = OpenMap::new(1000.0, 1000.0)
            .with_spawn(TeamId::new(0), Vec2::new(300.0, 500.0))
            .with_spawn(TeamId::new(1), Vec2::new(700.0, 500.0));
        let mut arena = arena(map);
        let a = arena.spawn("striker", TeamId::new(0));
        let b = arena.spawn("guardian", TeamId::new(1));
        arena.attach_bot(a, Some(b), Difficulty::Insane).expect("attached");
        arena.attach_bot(b, Some(a), Difficulty::Insane).expect("attached");

        let mut damaged = 0;
        for _ in 0..(60 * 30) {
            arena.step(33);
            damaged += arena
                .drain_events()
                .iter()
                .filter(|e| matches!(e, CombatEvent::Damaged { .. }))
                .count();
        }
        assert!(damaged > 0);
    }

    #[test]
    fn test_update_never_moves_clock_backwards() {
        let mut arena = arena(duel_map());
        arena.update(SimTime::from_millis(500), 500);
        arena.update(SimTime::from_millis(200), 16);
        assert_eq!(arena.now(), SimTime::from_millis(500));
    }
}
