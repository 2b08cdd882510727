//! The set of combatants passed explicitly to resolvers.
//!
//! Weapons, hazards, abilities and bots never reach for a global list of
//! enemies; they receive a [`Roster`] and filter it by team.

use ahash::AHashMap;
use glam::Vec2;
use tracing::info;

use skirmish_common::{EntityId, SimTime, TeamId};

use crate::entity::{CombatEntity, DamageOutcome};
use crate::events::{CombatEvent, EventBus};

/// Entities indexed by ID, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entities: Vec<CombatEntity>,
    index: AHashMap<EntityId, usize>,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity, replacing any entity with the same ID.
    pub fn insert(&mut self, entity: CombatEntity) -> EntityId {
        let id = entity.id();
        if let Some(&slot) = self.index.get(&id) {
            self.entities[slot] = entity;
        } else {
            self.index.insert(id, self.entities.len());
            self.entities.push(entity);
        }
        id
    }

    /// Removes and returns an entity.
    pub fn remove(&mut self, id: EntityId) -> Option<CombatEntity> {
        let slot = self.index.remove(&id)?;
        let removed = self.entities.swap_remove(slot);
        if let Some(moved) = self.entities.get(slot) {
            self.index.insert(moved.id(), slot);
        }
        Some(removed)
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&CombatEntity> {
        self.index.get(&id).and_then(|&slot| self.entities.get(slot))
    }

    /// Looks up an entity mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut CombatEntity> {
        let slot = *self.index.get(&id)?;
        self.entities.get_mut(slot)
    }

    /// Whether the ID is present.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities.
    pub fn iter(&self) -> impl Iterator<Item = &CombatEntity> {
        self.entities.iter()
    }

    /// All entities, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CombatEntity> {
        self.entities.iter_mut()
    }

    /// Snapshot of all IDs.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(CombatEntity::id).collect()
    }

    /// Live, collidable entities hostile to `team`.
    pub fn opponents_of(&self, team: TeamId) -> impl Iterator<Item = &CombatEntity> {
        self.entities
            .iter()
            .filter(move |e| e.is_alive() && e.is_collidable() && team.is_hostile_to(e.team()))
    }

    /// Live entities on `team`.
    pub fn allies_of(&self, team: TeamId) -> impl Iterator<Item = &CombatEntity> {
        self.entities
            .iter()
            .filter(move |e| e.is_alive() && e.team() == team)
    }

    /// Closest live opponent to `point` within `max_distance`.
    #[must_use]
    pub fn nearest_opponent(&self, team: TeamId, point: Vec2, max_distance: f32) -> Option<EntityId> {
        self.opponents_of(team)
            .map(|e| (e.id(), e.position().distance(point)))
            .filter(|(_, d)| *d <= max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Damages `target` on behalf of `source` and publishes the result.
    ///
    /// Missing targets are a no-op. Kills are credited to the source if it
    /// still exists and is not the target.
    pub fn apply_damage(
        &mut self,
        target: EntityId,
        amount: f32,
        source: Option<EntityId>,
        now: SimTime,
        events: &EventBus,
    ) -> DamageOutcome {
        let Some(entity) = self.get_mut(target) else {
            return DamageOutcome::Ignored;
        };
        let outcome = entity.take_damage(amount, now);
        let remaining = entity.health();
        let respawn_at = entity.respawn_at();

        if outcome == DamageOutcome::Ignored {
            return outcome;
        }
        events.publish(CombatEvent::Damaged {
            entity_id: target,
            amount: outcome.dealt(),
            remaining,
            source,
        });

        let credited = source
            .filter(|s| *s != target)
            .and_then(|s| self.get_mut(s));
        if let Some(attacker) = credited {
            let record = attacker.record_mut();
            record.damage_dealt += outcome.dealt();
            if outcome.is_kill() {
                record.kills += 1;
            }
        }

        if outcome.is_kill() {
            info!(entity = %target, killer = ?source, "entity killed");
            events.publish(CombatEvent::Died {
                entity_id: target,
                killer: source,
                respawn_at: respawn_at.unwrap_or(now),
            });
        }
        outcome
    }

    /// Heals `target` and publishes the result. Returns health restored.
    pub fn apply_heal(&mut self, target: EntityId, amount: f32, events: &EventBus) -> f32 {
        let restored = self.get_mut(target).map_or(0.0, |e| e.heal(amount));
        if restored > 0.0 {
            events.publish(CombatEvent::Healed {
                entity_id: target,
                amount: restored,
            });
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::ArchetypeProfile;

    fn spawn(roster: &mut Roster, raw: u64, team: u8, pos: Vec2) -> EntityId {
        roster.insert(CombatEntity::from_profile(
            EntityId::from_raw(raw),
            TeamId::new(team),
            &ArchetypeProfile::default(),
            pos,
        ))
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut roster = Roster::new();
        let a = spawn(&mut roster, 1, 0, Vec2::ZERO);
        let b = spawn(&mut roster, 2, 0, Vec2::ZERO);
        let c = spawn(&mut roster, 3, 1, Vec2::ZERO);
        assert!(roster.remove(a).is_some());
        assert!(roster.remove(a).is_none());
        assert_eq!(roster.get(c).map(CombatEntity::id), Some(c));
        assert_eq!(roster.get(b).map(CombatEntity::id), Some(b));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_opponents_exclude_team_and_dead() {
        let mut roster = Roster::new();
        spawn(&mut roster, 1, 0, Vec2::ZERO);
        spawn(&mut roster, 2, 0, Vec2::ZERO);
        let enemy = spawn(&mut roster, 3, 1, Vec2::ZERO);
        let corpse = spawn(&mut roster, 4, 1, Vec2::ZERO);
        if let Some(e) = roster.get_mut(corpse) {
            e.die(SimTime::ZERO);
        }
        let ids: Vec<_> = roster.opponents_of(TeamId::new(0)).map(CombatEntity::id).collect();
        assert_eq!(ids, vec![enemy]);
    }

    #[test]
    fn test_kill_credit_and_events() {
        let bus = EventBus::new(16);
        let mut roster = Roster::new();
        let shooter = spawn(&mut roster, 1, 0, Vec2::ZERO);
        let victim = spawn(&mut roster, 2, 1, Vec2::X * 50.0);

        let outcome = roster.apply_damage(victim, 500.0, Some(shooter), SimTime::ZERO, &bus);
        assert!(outcome.is_kill());
        let record = roster.get(shooter).map(|e| *e.record()).unwrap_or_default();
        assert_eq!(record.kills, 1);
        assert_eq!(record.damage_dealt, 100.0);

        let events = bus.drain();
        assert!(matches!(events[0], CombatEvent::Damaged { amount, .. } if amount == 100.0));
        assert!(matches!(events[1], CombatEvent::Died { killer: Some(k), .. } if k == shooter));
    }

    #[test]
    fn test_missing_target_is_ignored() {
        let bus = EventBus::new(4);
        let mut roster = Roster::new();
        let outcome = roster.apply_damage(EntityId::from_raw(99), 10.0, None, SimTime::ZERO, &bus);
        assert_eq!(outcome, DamageOutcome::Ignored);
        assert_eq!(roster.apply_heal(EntityId::from_raw(99), 10.0, &bus), 0.0);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_nearest_opponent() {
        let mut roster = Roster::new();
        spawn(&mut roster, 1, 0, Vec2::ZERO);
        let near = spawn(&mut roster, 2, 1, Vec2::new(40.0, 0.0));
        spawn(&mut roster, 3, 1, Vec2::new(90.0, 0.0));
        assert_eq!(roster.nearest_opponent(TeamId::new(0), Vec2::new(50.0, 0.0), 100.0), Some(near));
        assert_eq!(roster.nearest_opponent(TeamId::new(0), Vec2::new(500.0, 0.0), 100.0), None);
    }
}
