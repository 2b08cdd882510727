//! Placed hazards: bombs, mines and heal fields.
//!
//! Hazards are records with timestamps, swept once per tick. The owner is
//! looked up again on every sweep and may have died or left the arena in
//! the meantime; hazards keep working on their own team's behalf either way.

use glam::Vec2;
use tracing::debug;

use skirmish_common::{EntityId, HazardId, IdAllocator, ParabolicArc, SimTime, TeamId};

use crate::events::{CombatEvent, EventBus};
use crate::projectile::resolve_area_damage;
use crate::roster::Roster;

/// What a hazard does.
#[derive(Debug, Clone, PartialEq)]
pub enum HazardKind {
    /// Detonates once its fuse runs out.
    Bomb {
        /// Damage at the blast centre
        damage: f32,
        /// Blast radius
        radius: f32,
        /// Throw arc for presentation, if lobbed
        arc: Option<ParabolicArc>,
    },
    /// Detonates when an opponent steps close after arming, or at end of life.
    Mine {
        /// Damage at the blast centre
        damage: f32,
        /// Blast radius
        radius: f32,
        /// Proximity that sets it off
        trigger_radius: f32,
        /// When it starts reacting to proximity
        armed_at: SimTime,
    },
    /// Heals periodically until it expires.
    HealField {
        /// Health per tick
        amount: f32,
        /// Reach of each tick
        radius: f32,
        /// Time between ticks
        tick_ms: u64,
        /// Next tick time
        next_tick: SimTime,
        /// Heal allies in range, or only the owner
        affects_allies: bool,
    },
}

/// A placed hazard.
#[derive(Debug, Clone)]
pub struct Hazard {
    /// Hazard ID
    pub id: HazardId,
    /// Who placed it
    pub owner: EntityId,
    /// Owner's team at placement
    pub team: TeamId,
    /// Where it sits
    pub position: Vec2,
    /// When it was placed
    pub placed_at: SimTime,
    /// Fuse end for bombs, lifetime end for mines and fields
    pub expires_at: SimTime,
    /// Behaviour
    pub kind: HazardKind,
}

/// All live hazards.
#[derive(Debug, Clone, Default)]
pub struct Hazards {
    active: Vec<Hazard>,
    ids: IdAllocator,
}

impl Hazards {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live hazards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether there are none.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// All live hazards.
    pub fn iter(&self) -> impl Iterator<Item = &Hazard> {
        self.active.iter()
    }

    /// Places a hazard that lasts until `expires_at`.
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        &mut self,
        owner: EntityId,
        team: TeamId,
        position: Vec2,
        kind: HazardKind,
        now: SimTime,
        expires_at: SimTime,
        events: &EventBus,
    ) -> HazardId {
        let id = HazardId::new(self.ids.next_raw());
        events.publish(CombatEvent::HazardPlaced {
            hazard_id: id,
            owner,
            position,
        });
        self.active.push(Hazard {
            id,
            owner,
            team,
            position,
            placed_at: now,
            expires_at,
            kind,
        });
        id
    }

    /// Fires fuses, proximity triggers and heal ticks due at `now`.
    pub fn update(&mut self, now: SimTime, roster: &mut Roster, events: &EventBus) {
        self.active
            .retain_mut(|hazard| sweep_hazard(hazard, now, roster, events));
    }

    /// Removes everything without resolving it.
    pub fn clear(&mut self) {
        self.active.clear();
    }
}

/// Returns false once the hazard is spent.
fn sweep_hazard(hazard: &mut Hazard, now: SimTime, roster: &mut Roster, events: &EventBus) -> bool {
    let expired = now.has_reached(hazard.expires_at);
    match &mut hazard.kind {
        HazardKind::Bomb { damage, radius, .. } => {
            if !expired {
                return true;
            }
            detonate(hazard.owner, hazard.team, hazard.position, *damage, *radius, now, roster, events);
            false
        },
        HazardKind::Mine {
            damage,
            radius,
            trigger_radius,
            armed_at,
        } => {
            let tripped = now.has_reached(*armed_at)
                && roster.opponents_of(hazard.team).any(|e| {
                    e.position().distance(hazard.position) <= *trigger_radius + e.radius()
                });
            if !(tripped || expired) {
                return true;
            }
            debug!(hazard = hazard.id.raw(), tripped, "mine detonating");
            detonate(hazard.owner, hazard.team, hazard.position, *damage, *radius, now, roster, events);
            false
        },
        HazardKind::HealField {
            amount,
            radius,
            tick_ms,
            next_tick,
            affects_allies,
        } => {
            let step = (*tick_ms).max(1);
            while now.has_reached(*next_tick) && *next_tick < hazard.expires_at {
                let targets: Vec<EntityId> = if *affects_allies {
                    roster
                        .allies_of(hazard.team)
                        .filter(|e| e.position().distance(hazard.position) <= *radius)
                        .map(|e| e.id())
                        .collect()
                } else {
                    // Owner-only fields follow the owner; a dead or removed owner gets nothing
                    roster
                        .get(hazard.owner)
                        .filter(|e| e.is_alive())
                        .map(|e| e.id())
                        .into_iter()
                        .collect()
                };
                for id in targets {
                    roster.apply_heal(id, *amount, events);
                }
                *next_tick = next_tick.after(step);
            }
            !expired
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn detonate(
    owner: EntityId,
    team: TeamId,
    position: Vec2,
    damage: f32,
    radius: f32,
    now: SimTime,
    roster: &mut Roster,
    events: &EventBus,
) {
    let source = roster.contains(owner).then_some(owner);
    resolve_area_damage(position, radius, damage, source, team, now, roster, events);
}
