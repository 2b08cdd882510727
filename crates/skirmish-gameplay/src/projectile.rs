//! Weapon and projectile resolver.
//!
//! This module provides:
//! - Turning a [`FireOrder`] into projectiles or an instant cone check
//! - Per-tick travel for straight and lobbed projectiles
//! - Wall-first collision adjudication, then opposing bodies
//! - Piercing hit sets, homing, and area damage with linear falloff
//!
//! Projectiles live in a fixed-capacity pool; a shot with no free slot is
//! dropped after the shooter has already paid its cooldown.

use ahash::AHashSet;
use glam::Vec2;
use tracing::debug;

use skirmish_common::{
    angle_between, angle_to, closest_point_on_segment, direction_from_angle, falloff_damage,
    segment_hits_circle, wrap_angle, EntityId, IdAllocator, ParabolicArc, ProjectileId, SimTime,
    TeamId, EPSILON,
};

use crate::entity::CombatEntity;
use crate::events::{CombatEvent, EventBus, ExpireReason};
use crate::map::ArenaMap;
use crate::random::RandomSource;
use crate::roster::Roster;
use crate::weapon::{Trajectory, WeaponProfile};

/// Default number of projectile slots.
pub const DEFAULT_POOL_CAPACITY: usize = 256;

/// Lobbed projectiles above this height pass over walls and bodies.
pub const LOB_CLEARANCE_HEIGHT: f32 = 24.0;

/// How far from the aim point a homing shot looks for a target to track.
pub const HOMING_ACQUIRE_RADIUS: f32 = 96.0;

/// One committed trigger pull, produced by the shooter's own bookkeeping.
#[derive(Debug, Clone)]
pub struct FireOrder {
    /// Shooter
    pub shooter: EntityId,
    /// Shooter's team
    pub team: TeamId,
    /// Shooter position at fire time
    pub origin: Vec2,
    /// Aim heading in radians
    pub aim_angle: f32,
    /// Point the shooter aimed at
    pub target_point: Vec2,
    /// Weapon snapshot
    pub weapon: WeaponProfile,
    /// Range multiplier in force (scope)
    pub range_multiplier: f32,
}

/// How a projectile is moving.
#[derive(Debug, Clone, PartialEq)]
pub enum Flight {
    /// Constant-speed straight line
    Straight {
        /// Unit heading
        direction: Vec2,
        /// Distance left before expiry
        remaining_range: f32,
    },
    /// Ballistic arc to a landing point
    Lobbed {
        /// Trajectory
        arc: ParabolicArc,
        /// Time in the air
        elapsed_secs: f32,
    },
}

/// A live projectile.
#[derive(Debug, Clone)]
pub struct Projectile {
    id: ProjectileId,
    owner: EntityId,
    team: TeamId,
    position: Vec2,
    speed: f32,
    damage: f32,
    radius: f32,
    piercing: bool,
    aoe_radius: f32,
    flight: Flight,
    hit: AHashSet<EntityId>,
    tracking: Option<EntityId>,
    turn_rate: f32,
}

impl Projectile {
    /// Projectile ID.
    #[must_use]
    pub fn id(&self) -> ProjectileId {
        self.id
    }

    /// Firing entity.
    #[must_use]
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Firing entity's team.
    #[must_use]
    pub fn team(&self) -> TeamId {
        self.team
    }

    /// Ground position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Height above ground; zero for straight shots.
    #[must_use]
    pub fn height(&self) -> f32 {
        match &self.flight {
            Flight::Straight { .. } => 0.0,
            Flight::Lobbed { arc, elapsed_secs } => arc.height(*elapsed_secs),
        }
    }

    /// Damage per hit (or at the blast centre).
    #[must_use]
    pub fn damage(&self) -> f32 {
        self.damage
    }

    /// Whether it passes through bodies.
    #[must_use]
    pub fn is_piercing(&self) -> bool {
        self.piercing
    }

    /// Detonation radius.
    #[must_use]
    pub fn aoe_radius(&self) -> f32 {
        self.aoe_radius
    }

    /// Flight state.
    #[must_use]
    pub fn flight(&self) -> &Flight {
        &self.flight
    }

    /// Entity being homed on.
    #[must_use]
    pub fn tracking(&self) -> Option<EntityId> {
        self.tracking
    }

    /// Whether this projectile already damaged `entity`.
    #[must_use]
    pub fn has_hit(&self, entity: EntityId) -> bool {
        self.hit.contains(&entity)
    }
}

/// What one fire request produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireReport {
    /// Projectiles put into the world
    pub spawned: u32,
    /// Bullets lost to an exhausted pool
    pub dropped: u32,
    /// Bodies struck by an instant cone
    pub cone_hits: u32,
}

/// Fixed-capacity projectile pool.
#[derive(Debug, Clone)]
pub struct ProjectileSystem {
    live: Vec<Projectile>,
    capacity: usize,
    ids: IdAllocator,
}

impl Default for ProjectileSystem {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl ProjectileSystem {
    /// Creates a pool with `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            live: Vec::with_capacity(capacity.min(4096)),
            capacity,
            ids: IdAllocator::new(),
        }
    }

    /// Slot count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live projectiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Unused slots.
    #[must_use]
    pub fn free_slots(&self) -> usize {
        self.capacity.saturating_sub(self.live.len())
    }

    /// Looks up a projectile.
    #[must_use]
    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.live.iter().find(|p| p.id == id)
    }

    /// All live projectiles.
    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.live.iter()
    }

    /// Resolves one trigger pull.
    pub fn fire(
        &mut self,
        order: &FireOrder,
        now: SimTime,
        roster: &mut Roster,
        map: &dyn ArenaMap,
        events: &EventBus,
        rng: &mut dyn RandomSource,
    ) -> FireReport {
        if order.weapon.trajectory == Trajectory::Spread {
            let range = order.weapon.effective_range(order.range_multiplier);
            let hits = resolve_cone(order, range, now, roster, map, events);
            events.publish(CombatEvent::WeaponFired {
                entity_id: order.shooter,
                aim_angle: order.aim_angle,
                projectiles: 0,
            });
            return FireReport {
                cone_hits: hits,
                ..FireReport::default()
            };
        }
        let angles = order.weapon.shot_angles(order.aim_angle, rng);
        self.fire_volley(order, &angles, now, roster, map, events)
    }

    /// Spawns one projectile per heading using the order's weapon.
    ///
    /// Spread weapons fall back to straight bullets here.
    pub fn fire_volley(
        &mut self,
        order: &FireOrder,
        angles: &[f32],
        now: SimTime,
        roster: &mut Roster,
        map: &dyn ArenaMap,
        events: &EventBus,
    ) -> FireReport {
        let mut report = FireReport::default();
        let tracking = (order.weapon.homing_turn_rate > 0.0)
            .then(|| roster.nearest_opponent(order.team, order.target_point, HOMING_ACQUIRE_RADIUS))
            .flatten();

        for &angle in angles {
            if self.live.len() >= self.capacity {
                debug!(shooter = %order.shooter, capacity = self.capacity, "projectile pool exhausted, shot dropped");
                events.publish(CombatEvent::ShotDropped {
                    entity_id: order.shooter,
                });
                report.dropped += 1;
                continue;
            }
            let projectile = self.launch(order, angle, tracking);
            report.spawned += 1;

            // A muzzle buried in a wall ends the shot on the spot
            if let Flight::Straight { .. } = projectile.flight {
                if map.first_wall_on_segment(order.origin, projectile.position).is_some() {
                    let stop = map.last_open_point(order.origin, projectile.position);
                    terminate(&projectile, stop, ExpireReason::Wall, now, roster, events);
                    continue;
                }
            }
            self.live.push(projectile);
        }

        events.publish(CombatEvent::WeaponFired {
            entity_id: order.shooter,
            aim_angle: order.aim_angle,
            projectiles: report.spawned,
        });
        report
    }

    fn launch(&mut self, order: &FireOrder, angle: f32, tracking: Option<EntityId>) -> Projectile {
        let weapon = &order.weapon;
        let range = weapon.effective_range(order.range_multiplier);
        let direction = direction_from_angle(angle);

        let (position, flight) = match weapon.trajectory {
            Trajectory::Parabolic { gravity } => {
                let reach = order.origin.distance(order.target_point).min(range);
                let landing = order.origin + direction * reach;
                let arc = ParabolicArc::with_speed(order.origin, landing, weapon.projectile_speed, gravity);
                (
                    order.origin,
                    Flight::Lobbed {
                        arc,
                        elapsed_secs: 0.0,
                    },
                )
            },
            Trajectory::Linear | Trajectory::Spread => (
                order.origin + direction * weapon.muzzle_offset,
                Flight::Straight {
                    direction,
                    remaining_range: (range - weapon.muzzle_offset).max(0.0),
                },
            ),
        };

        Projectile {
            id: ProjectileId::new(self.ids.next_raw()),
            owner: order.shooter,
            team: order.team,
            position,
            speed: weapon.projectile_speed,
            damage: weapon.damage,
            radius: weapon.projectile_radius,
            piercing: weapon.piercing,
            aoe_radius: weapon.aoe_radius,
            flight,
            hit: AHashSet::new(),
            tracking,
            turn_rate: weapon.homing_turn_rate,
        }
    }

    /// Advances every projectile by `dt_secs`.
    pub fn update(
        &mut self,
        now: SimTime,
        dt_secs: f32,
        roster: &mut Roster,
        map: &dyn ArenaMap,
        events: &EventBus,
    ) {
        if dt_secs <= 0.0 {
            return;
        }
        self.live
            .retain_mut(|p| step_projectile(p, now, dt_secs, roster, map, events));
    }

    /// Detonates (or simply ends) a projectile now. Returns false if unknown.
    pub fn explode(
        &mut self,
        id: ProjectileId,
        now: SimTime,
        roster: &mut Roster,
        events: &EventBus,
    ) -> bool {
        let Some(slot) = self.live.iter().position(|p| p.id == id) else {
            return false;
        };
        let projectile = self.live.remove(slot);
        terminate(
            &projectile,
            projectile.position,
            ExpireReason::Exhausted,
            now,
            roster,
            events,
        );
        true
    }

    /// Drops tracking on `target` so homing shots fly on as misses.
    pub fn forget_target(&mut self, target: EntityId) {
        for p in &mut self.live {
            if p.tracking == Some(target) {
                p.tracking = None;
            }
        }
    }

    /// Removes every projectile without resolving it.
    pub fn clear(&mut self) {
        self.live.clear();
    }
}

/// Applies falloff damage to every opponent of `team` around `center`.
///
/// Damage is `base * (1 - distance / radius)`, zero at and beyond the
/// edge. Returns the number of entities damaged.
#[allow(clippy::too_many_arguments)]
pub fn resolve_area_damage(
    center: Vec2,
    radius: f32,
    base_damage: f32,
    source: Option<EntityId>,
    team: TeamId,
    now: SimTime,
    roster: &mut Roster,
    events: &EventBus,
) -> u32 {
    events.publish(CombatEvent::Detonated {
        source,
        position: center,
        radius,
    });
    let victims: Vec<(EntityId, f32)> = roster
        .opponents_of(team)
        .map(|e| {
            let amount = falloff_damage(base_damage, e.position().distance(center), radius);
            (e.id(), amount)
        })
        .filter(|(_, amount)| *amount > 0.0)
        .collect();
    for (id, amount) in &victims {
        roster.apply_damage(*id, *amount, source, now, events);
    }
    victims.len() as u32
}

fn resolve_cone(
    order: &FireOrder,
    range: f32,
    now: SimTime,
    roster: &mut Roster,
    map: &dyn ArenaMap,
    events: &EventBus,
) -> u32 {
    let half_angle = order.weapon.spread_angle;
    let victims: Vec<EntityId> = roster
        .opponents_of(order.team)
        .filter(|e| e.id() != order.shooter)
        .filter(|e| {
            let offset = e.position() - order.origin;
            let dist = offset.length();
            if dist - e.radius() > range {
                return false;
            }
            if dist <= e.radius() {
                return true;
            }
            let slack = (e.radius() / dist).asin();
            angle_between(offset.y.atan2(offset.x), order.aim_angle) <= half_angle + slack
        })
        .filter(|e| map.has_line_of_sight(order.origin, e.position()))
        .map(CombatEntity::id)
        .collect();
    for id in &victims {
        roster.apply_damage(*id, order.weapon.damage, Some(order.shooter), now, events);
    }
    victims.len() as u32
}

fn terminate(
    projectile: &Projectile,
    at: Vec2,
    reason: ExpireReason,
    now: SimTime,
    roster: &mut Roster,
    events: &EventBus,
) {
    if projectile.aoe_radius > 0.0 {
        resolve_area_damage(
            at,
            projectile.aoe_radius,
            projectile.damage,
            Some(projectile.owner),
            projectile.team,
            now,
            roster,
            events,
        );
    } else {
        events.publish(CombatEvent::ProjectileExpired {
            projectile_id: projectile.id,
            position: at,
            reason,
        });
    }
}

/// Returns false once the projectile is finished.
fn step_projectile(
    p: &mut Projectile,
    now: SimTime,
    dt: f32,
    roster: &mut Roster,
    map: &dyn ArenaMap,
    events: &EventBus,
) -> bool {
    match p.flight {
        Flight::Straight { .. } => step_straight(p, now, dt, roster, map, events),
        Flight::Lobbed { .. } => step_lobbed(p, now, dt, roster, map, events),
    }
}

fn steer_homing(p: &mut Projectile, dt: f32, roster: &Roster) {
    let Some(target) = p.tracking else {
        return;
    };
    let Flight::Straight {
        direction,
        remaining_range,
    } = p.flight
    else {
        return;
    };
    match roster
        .get(target)
        .filter(|e| e.is_alive() && e.is_collidable())
    {
        None => p.tracking = None,
        Some(e) => {
            let current = direction.y.atan2(direction.x);
            let desired = angle_to(p.position, e.position());
            let max_turn = p.turn_rate * dt;
            let turn = wrap_angle(desired - current).clamp(-max_turn, max_turn);
            p.flight = Flight::Straight {
                direction: direction_from_angle(current + turn),
                remaining_range,
            };
        },
    }
}

fn step_straight(
    p: &mut Projectile,
    now: SimTime,
    dt: f32,
    roster: &mut Roster,
    map: &dyn ArenaMap,
    events: &EventBus,
) -> bool {
    steer_homing(p, dt, roster);
    let Flight::Straight {
        direction,
        remaining_range,
    } = p.flight
    else {
        return false;
    };

    let travel = (p.speed * dt).min(remaining_range);
    let from = p.position;
    let mut to = from + direction * travel;

    // Walls bound the segment; nothing behind them can be hit
    let wall = map.first_wall_on_segment(from, to).is_some();
    if wall {
        to = map.last_open_point(from, to);
    }
    if sweep_bodies(p, from, to, now, roster, events) {
        return false;
    }
    p.position = to;
    if wall {
        terminate(p, to, ExpireReason::Wall, now, roster, events);
        return false;
    }

    let remaining_range = remaining_range - travel;
    p.flight = Flight::Straight {
        direction,
        remaining_range,
    };
    if remaining_range <= EPSILON {
        terminate(p, to, ExpireReason::Exhausted, now, roster, events);
        return false;
    }
    true
}

fn step_lobbed(
    p: &mut Projectile,
    now: SimTime,
    dt: f32,
    roster: &mut Roster,
    map: &dyn ArenaMap,
    events: &EventBus,
) -> bool {
    let Flight::Lobbed { arc, elapsed_secs } = p.flight else {
        return false;
    };
    let elapsed = elapsed_secs + dt;
    p.flight = Flight::Lobbed {
        arc,
        elapsed_secs: elapsed,
    };
    let from = p.position;
    let to = arc.ground_point(elapsed);

    if arc.height(elapsed) < LOB_CLEARANCE_HEIGHT {
        if map.first_wall_on_segment(from, to).is_some() {
            let stop = map.last_open_point(from, to);
            p.position = stop;
            terminate(p, stop, ExpireReason::Wall, now, roster, events);
            return false;
        }
        if sweep_bodies(p, from, to, now, roster, events) {
            return false;
        }
    }

    p.position = to;
    if arc.has_landed(elapsed) {
        terminate(p, to, ExpireReason::Landed, now, roster, events);
        return false;
    }
    true
}

/// Hits opposing bodies along `from..to` in path order.
///
/// Returns true if the projectile was consumed (non-piercing hit or detonation).
fn sweep_bodies(
    p: &mut Projectile,
    from: Vec2,
    to: Vec2,
    now: SimTime,
    roster: &mut Roster,
    events: &EventBus,
) -> bool {
    let mut candidates: Vec<(EntityId, f32, Vec2)> = roster
        .opponents_of(p.team)
        .filter(|e| e.id() != p.owner && !p.hit.contains(&e.id()))
        .filter(|e| segment_hits_circle(from, to, e.position(), e.radius() + p.radius))
        .map(|e| {
            let contact = closest_point_on_segment(from, to, e.position());
            (e.id(), from.distance_squared(contact), contact)
        })
        .collect();
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

    for (id, _, contact) in candidates {
        if p.aoe_radius > 0.0 {
            p.position = contact;
            terminate(p, contact, ExpireReason::Exhausted, now, roster, events);
            return true;
        }
        roster.apply_damage(id, p.damage, Some(p.owner), now, events);
        if p.piercing {
            p.hit.insert(id);
        } else {
            p.position = contact;
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::ArchetypeProfile;
    use crate::map::OpenMap;
    use crate::random::ScriptedRandom;
    use skirmish_common::Rect;

    fn t(ms: u64) -> SimTime {
        SimTime::from_millis(ms)
    }

    fn spawn(roster: &mut Roster, raw: u64, team: u8, pos: Vec2) -> EntityId {
        roster.insert(CombatEntity::from_profile(
            EntityId::from_raw(raw),
            TeamId::new(team),
            &ArchetypeProfile::default(),
            pos,
        ))
    }

    fn health(roster: &Roster, id: EntityId) -> f32 {
        roster.get(id).map_or(-1.0, CombatEntity::health)
    }

    fn order(shooter: EntityId, origin: Vec2, target: Vec2, weapon: WeaponProfile) -> FireOrder {
        FireOrder {
            shooter,
            team: TeamId::new(0),
            origin,
            aim_angle: angle_to(origin, target),
            target_point: target,
            weapon,
            range_multiplier: 1.0,
        }
    }

    fn run(
        system: &mut ProjectileSystem,
        roster: &mut Roster,
        map: &dyn ArenaMap,
        bus: &EventBus,
        ticks: u64,
    ) {
        for i in 1..=ticks {
            system.update(t(i * 50), 0.05, roster, map, bus);
        }
    }

    #[test]
    fn test_non_piercing_stops_at_first_body() {
        let map = OpenMap::new(1000.0, 1000.0);
        let bus = EventBus::new(64);
        let mut roster = Roster::new();
        let shooter = spawn(&mut roster, 1, 0, Vec2::new(100.0, 100.0));
        let front = spawn(&mut roster, 2, 1, Vec2::new(200.0, 100.0));
        let back = spawn(&mut roster, 3, 1, Vec2::new(260.0, 100.0));
        let mut system = ProjectileSystem::default();
        let mut rng = ScriptedRandom::constant(0.5);

        let fire = order(shooter, Vec2::new(100.0, 100.0), Vec2::new(300.0, 100.0), WeaponProfile::default());
        let report = system.fire(&fire, t(0), &mut roster, &map, &bus, &mut rng);
        assert_eq!(report.spawned, 1);

        run(&mut system, &mut roster, &map, &bus, 3);
        assert_eq!(health(&roster, front), 80.0);
        assert!(system.is_empty());
        run(&mut system, &mut roster, &map, &bus, 10);
        assert_eq!(health(&roster, back), 100.0);
    }

    #[test]
    fn test_piercing_hits_each_body_once() {
        let map = OpenMap::new(1000.0, 1000.0);
        let bus = EventBus::new(64);
        let mut roster = Roster::new();
        let shooter = spawn(&mut roster, 1, 0, Vec2::new(100.0, 100.0));
        let a = spawn(&mut roster, 2, 1, Vec2::new(200.0, 100.0));
        let b = spawn(&mut roster, 3, 1, Vec2::new(260.0, 100.0));
        let mut system = ProjectileSystem::default();
        let mut rng = ScriptedRandom::constant(0.5);

        let weapon = WeaponProfile::default().piercing().with_speed(200.0);
        let fire = order(shooter, Vec2::new(100.0, 100.0), Vec2::new(300.0, 100.0), weapon);
        system.fire(&fire, t(0), &mut roster, &map, &bus, &mut rng);
        run(&mut system, &mut roster, &map, &bus, 60);

        assert_eq!(health(&roster, a), 80.0);
        assert_eq!(health(&roster, b), 80.0);
        assert!(system.is_empty());
    }

    #[test]
    fn test_shooter_and_team_never_damaged() {
        let map = OpenMap::new(1000.0, 1000.0);
        let bus = EventBus::new(64);
        let mut roster = Roster::new();
        let shooter = spawn(&mut roster, 1, 0, Vec2::new(100.0, 100.0));
        let mate = spawn(&mut roster, 2, 0, Vec2::new(200.0, 100.0));
        let enemy = spawn(&mut roster, 3, 1, Vec2::new(300.0, 100.0));
        let mut system = ProjectileSystem::default();
        let mut rng = ScriptedRandom::constant(0.5);

        let fire = order(shooter, Vec2::new(100.0, 100.0), Vec2::new(300.0, 100.0), WeaponProfile::default());
        system.fire(&fire, t(0), &mut roster, &map, &bus, &mut rng);
        run(&mut system, &mut roster, &map, &bus, 20);
        assert_eq!(health(&roster, mate), 100.0);
        assert_eq!(health(&roster, enemy), 80.0);

        // A blast centred on the shooter leaves its own side alone
        resolve_area_damage(
            Vec2::new(100.0, 100.0),
            150.0,
            100.0,
            Some(shooter),
            TeamId::new(0),
            t(2000),
            &mut roster,
            &bus,
        );
        assert_eq!(health(&roster, shooter), 100.0);
        assert_eq!(health(&roster, mate), 100.0);
    }

    #[test]
    fn test_wall_stops_piercing_projectile() {
        let map = OpenMap::new(1000.0, 1000.0)
            .with_wall(Rect::new(Vec2::new(150.0, 0.0), Vec2::new(170.0, 1000.0)));
        let bus = EventBus::new(64);
        let mut roster = Roster::new();
        let shooter = spawn(&mut roster, 1, 0, Vec2::new(100.0, 100.0));
        let enemy = spawn(&mut roster, 2, 1, Vec2::new(250.0, 100.0));
        let mut system = ProjectileSystem::default();
        let mut rng = ScriptedRandom::constant(0.5);

        let weapon = WeaponProfile::default().piercing();
        let fire = order(shooter, Vec2::new(100.0, 100.0), Vec2::new(250.0, 100.0), weapon);
        system.fire(&fire, t(0), &mut roster, &map, &bus, &mut rng);
        run(&mut system, &mut roster, &map, &bus, 10);

        assert_eq!(health(&roster, enemy), 100.0);
        assert!(system.is_empty());
        assert!(bus.drain().iter().any(|e| matches!(
            e,
            CombatEvent::ProjectileExpired {
                reason: ExpireReason::Wall,
                ..
            }
        )));
    }

    #[test]
    fn test_exhausted_pool_drops_shot() {
        let map = OpenMap::new(1000.0, 1000.0);
        let bus = EventBus::new(64);
        let mut roster = Roster::new();
        let shooter = spawn(&mut roster, 1, 0, Vec2::new(100.0, 100.0));
        let mut system = ProjectileSystem::new(1);
        let mut rng = ScriptedRandom::constant(0.5);

        let fire = order(shooter, Vec2::new(100.0, 100.0), Vec2::new(300.0, 100.0), WeaponProfile::default());
        assert_eq!(system.fire(&fire, t(0), &mut roster, &map, &bus, &mut rng).spawned, 1);
        let second = system.fire(&fire, t(10), &mut roster, &map, &bus, &mut rng);
        assert_eq!(second.spawned, 0);
        assert_eq!(second.dropped, 1);
        assert_eq!(system.len(), 1);
        assert!(bus
            .drain()
            .iter()
            .any(|e| matches!(e, CombatEvent::ShotDropped { entity_id } if *entity_id == shooter)));
    }

    #[test]
    fn test_area_damage_falloff() {
        let bus = EventBus::new(64);
        let mut roster = Roster::new();
        let half = spawn(&mut roster, 1, 1, Vec2::new(50.0, 0.0));
        let edge = spawn(&mut roster, 2, 1, Vec2::new(100.0, 0.0));
        let center = spawn(&mut roster, 3, 1, Vec2::new(0.0, 0.0));
        let hits = resolve_area_damage(Vec2::ZERO, 100.0, 60.0, None, TeamId::new(0), t(0), &mut roster, &bus);
        assert_eq!(hits, 2);
        assert!((health(&roster, half) - 70.0).abs() < 1e-4);
        assert_eq!(health(&roster, edge), 100.0);
        assert!((health(&roster, center) - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_spread_cone_is_instant() {
        let map = OpenMap::new(1000.0, 1000.0);
        let bus = EventBus::new(64);
        let mut roster = Roster::new();
        let origin = Vec2::new(500.0, 500.0);
        let shooter = spawn(&mut roster, 1, 0, origin);
        let inside = spawn(&mut roster, 2, 1, origin + Vec2::new(100.0, 10.0));
        let beside = spawn(&mut roster, 3, 1, origin + Vec2::new(0.0, 100.0));
        let far = spawn(&mut roster, 4, 1, origin + Vec2::new(300.0, 0.0));
        let mut system = ProjectileSystem::default();
        let mut rng = ScriptedRandom::constant(0.5);

        let weapon = WeaponProfile::named("scattergun")
            .with_trajectory(Trajectory::Spread)
            .with_bullets(6, 0.3)
            .with_range(200.0)
            .with_damage(35.0);
        let fire = order(shooter, origin, origin + Vec2::X * 100.0, weapon);
        let report = system.fire(&fire, t(0), &mut roster, &map, &bus, &mut rng);

        assert_eq!(report.cone_hits, 1);
        assert!(system.is_empty());
        assert_eq!(health(&roster, inside), 65.0);
        assert_eq!(health(&roster, beside), 100.0);
        assert_eq!(health(&roster, far), 100.0);
    }

    #[test]
    fn test_homing_drops_removed_target() {
        let map = OpenMap::new(1000.0, 1000.0);
        let bus = EventBus::new(64);
        let mut roster = Roster::new();
        let shooter = spawn(&mut roster, 1, 0, Vec2::new(100.0, 100.0));
        let target = spawn(&mut roster, 2, 1, Vec2::new(400.0, 160.0));
        let mut system = ProjectileSystem::default();
        let mut rng = ScriptedRandom::constant(0.5);

        let weapon = WeaponProfile::default().with_homing(4.0).with_speed(100.0);
        let fire = order(shooter, Vec2::new(100.0, 100.0), Vec2::new(400.0, 150.0), weapon);
        system.fire(&fire, t(0), &mut roster, &map, &bus, &mut rng);
        let id = system.iter().next().map(Projectile::id).expect("spawned");
        assert_eq!(system.get(id).and_then(Projectile::tracking), Some(target));

        roster.remove(target);
        run(&mut system, &mut roster, &map, &bus, 1);
        let p = system.get(id).expect("still flying");
        assert_eq!(p.tracking(), None);
        let Flight::Straight { direction, .. } = *p.flight() else {
            panic!("expected straight flight");
        };
        run(&mut system, &mut roster, &map, &bus, 1);
        let Some(Flight::Straight { direction: after, .. }) = system.get(id).map(|p| p.flight().clone()) else {
            panic!("expected straight flight");
        };
        assert!((direction - after).length() < 1e-6);
    }

    #[test]
    fn test_lob_clears_wall_and_detonates() {
        let map = OpenMap::new(1000.0, 1000.0)
            .with_wall(Rect::new(Vec2::new(180.0, 0.0), Vec2::new(200.0, 1000.0)));
        let bus = EventBus::new(64);
        let mut roster = Roster::new();
        let shooter = spawn(&mut roster, 1, 0, Vec2::new(100.0, 100.0));
        let enemy = spawn(&mut roster, 2, 1, Vec2::new(300.0, 100.0));
        let mut system = ProjectileSystem::default();
        let mut rng = ScriptedRandom::constant(0.5);

        let weapon = WeaponProfile::named("mortar")
            .with_trajectory(Trajectory::Parabolic { gravity: 900.0 })
            .with_speed(300.0)
            .with_damage(40.0)
            .with_aoe(50.0);
        let fire = order(shooter, Vec2::new(100.0, 100.0), Vec2::new(300.0, 100.0), weapon);
        system.fire(&fire, t(0), &mut roster, &map, &bus, &mut rng);
        run(&mut system, &mut roster, &map, &bus, 20);

        assert!(system.is_empty());
        assert!(health(&roster, enemy) < 100.0);
        assert!(bus
            .drain()
            .iter()
            .any(|e| matches!(e, CombatEvent::Detonated { .. })));
    }

    #[test]
    fn test_explode_detonates_in_place() {
        let map = OpenMap::new(1000.0, 1000.0);
        let bus = EventBus::new(64);
        let mut roster = Roster::new();
        let shooter = spawn(&mut roster, 1, 0, Vec2::new(100.0, 100.0));
        let enemy = spawn(&mut roster, 2, 1, Vec2::new(140.0, 100.0));
        let mut system = ProjectileSystem::default();
        let mut rng = ScriptedRandom::constant(0.5);

        // Fired away from the enemy so only the blast can reach it
        let weapon = WeaponProfile::named("rocket").with_aoe(80.0).with_damage(50.0);
        let fire = order(shooter, Vec2::new(100.0, 100.0), Vec2::new(100.0, 300.0), weapon);
        system.fire(&fire, t(0), &mut roster, &map, &bus, &mut rng);
        let id = system.iter().next().map(Projectile::id).expect("spawned");

        assert!(system.explode(id, t(10), &mut roster, &bus));
        assert!(!system.explode(id, t(10), &mut roster, &bus));
        assert!(system.is_empty());
        assert!(health(&roster, enemy) < 100.0);
    }
}
