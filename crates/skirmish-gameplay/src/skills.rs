//! Skill and ultimate resolution.
//!
//! This module provides:
//! - [`AbilityEffect`], the tagged effect records archetype tables bind to the skill and ultimate slots
//! - A single resolver that dispatches on the effect kind
//!
//! Adding an archetype means adding table rows. The combat loop always calls
//! [`resolve`] the same way regardless of which effect is bound.

use std::f32::consts::TAU;

use ahash::AHashSet;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use skirmish_common::{
    direction_from_angle, try_normalize, DataError, EntityId, ParabolicArc, SimTime, TeamId,
};

use crate::effects::{DashMotion, StatusEffect};
use crate::events::{CombatEvent, EventBus};
use crate::hazard::{HazardKind, Hazards};
use crate::map::ArenaMap;
use crate::projectile::{FireOrder, ProjectileSystem};
use crate::random::RandomSource;
use crate::roster::Roster;
use crate::weapon::{ensure, DEFAULT_GRAVITY};

/// Horizontal speed of thrown bombs.
pub const BOMB_THROW_SPEED: f32 = 400.0;

/// Which slot an ability was cast from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilitySlot {
    /// Regular skill
    Skill,
    /// Ultimate
    Ultimate,
}

/// Effect bound to a skill or ultimate slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbilityEffect {
    /// Nothing bound; casts are rejected.
    #[default]
    None,
    /// Damage reduction for a while.
    Shield {
        /// Fraction of incoming damage absorbed, in `[0, 1)`
        reduction: f32,
        /// Duration
        duration_ms: u64,
    },
    /// Fast displacement toward the aim with contact damage.
    Dash {
        /// Maximum distance
        distance: f32,
        /// Duration
        duration_ms: u64,
        /// Damage to each opponent touched
        contact_damage: f32,
        /// Reach beyond the caster's body
        contact_radius: f32,
    },
    /// Instant self heal.
    Heal {
        /// Fraction of maximum health restored
        fraction: f32,
    },
    /// Periodic heal at the cast position.
    HealField {
        /// Health per tick
        amount: f32,
        /// Time between ticks
        tick_ms: u64,
        /// Field lifetime
        duration_ms: u64,
        /// Reach
        radius: f32,
        /// Heal allies in range rather than only the caster
        affects_allies: bool,
    },
    /// Weapon range multiplier for a while.
    Scope {
        /// Multiplier, greater than 1
        range_multiplier: f32,
        /// Duration
        duration_ms: u64,
    },
    /// Delayed explosive thrown toward the aim.
    Bomb {
        /// Damage at the centre
        damage: f32,
        /// Blast radius
        radius: f32,
        /// Fuse after landing
        fuse_ms: u64,
        /// Throw distance cap
        max_distance: f32,
        /// Lobbed over walls rather than thrown straight
        lobbed: bool,
    },
    /// A row of proximity mines across the aim point.
    Minefield {
        /// Damage at the centre
        damage: f32,
        /// Blast radius
        radius: f32,
        /// Proximity trigger distance
        trigger_radius: f32,
        /// Number of mines
        count: u32,
        /// Gap between mines
        spacing: f32,
        /// Arming delay
        arm_ms: u64,
        /// Lifetime before self-detonation
        lifetime_ms: u64,
    },
    /// Ring of weapon projectiles around the caster.
    Barrage {
        /// Projectiles in the ring
        projectiles: u32,
    },
    /// Staggered bombs scattered around the aim point.
    Airstrike {
        /// Damage per bomb
        damage: f32,
        /// Blast radius per bomb
        radius: f32,
        /// Bombs
        count: u32,
        /// Scatter radius around the aim
        scatter: f32,
        /// Fuse of the first bomb
        fuse_ms: u64,
        /// Extra delay per following bomb
        stagger_ms: u64,
    },
}

impl AbilityEffect {
    /// Whether nothing is bound.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Table key of the effect kind.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Shield { .. } => "shield",
            Self::Dash { .. } => "dash",
            Self::Heal { .. } => "heal",
            Self::HealField { .. } => "heal_field",
            Self::Scope { .. } => "scope",
            Self::Bomb { .. } => "bomb",
            Self::Minefield { .. } => "minefield",
            Self::Barrage { .. } => "barrage",
            Self::Airstrike { .. } => "airstrike",
        }
    }

    /// Checks magnitudes against their legal ranges.
    pub fn validate(&self, owner: &str) -> Result<(), DataError> {
        let record = || format!("{owner} {}", self.key());
        match *self {
            Self::None => Ok(()),
            Self::Shield { reduction, .. } => {
                ensure(&record, "reduction", reduction, (0.0..1.0).contains(&reduction))
            },
            Self::Dash {
                distance,
                contact_damage,
                contact_radius,
                ..
            } => {
                ensure(&record, "distance", distance, distance > 0.0)?;
                ensure(&record, "contact_damage", contact_damage, contact_damage >= 0.0)?;
                ensure(&record, "contact_radius", contact_radius, contact_radius >= 0.0)
            },
            Self::Heal { fraction } => {
                ensure(&record, "fraction", fraction, fraction > 0.0 && fraction <= 1.0)
            },
            Self::HealField {
                amount,
                tick_ms,
                radius,
                ..
            } => {
                ensure(&record, "amount", amount, amount > 0.0)?;
                ensure(&record, "tick_ms", tick_ms as f64, tick_ms > 0)?;
                ensure(&record, "radius", radius, radius > 0.0)
            },
            Self::Scope {
                range_multiplier, ..
            } => ensure(
                &record,
                "range_multiplier",
                range_multiplier,
                range_multiplier > 1.0,
            ),
            Self::Bomb {
                damage,
                radius,
                max_distance,
                ..
            } => {
                ensure(&record, "damage", damage, damage >= 0.0)?;
                ensure(&record, "radius", radius, radius > 0.0)?;
                ensure(&record, "max_distance", max_distance, max_distance >= 0.0)
            },
            Self::Minefield {
                damage,
                radius,
                trigger_radius,
                count,
                spacing,
                ..
            } => {
                ensure(&record, "damage", damage, damage >= 0.0)?;
                ensure(&record, "radius", radius, radius > 0.0)?;
                ensure(&record, "trigger_radius", trigger_radius, trigger_radius > 0.0)?;
                ensure(&record, "count", f64::from(count), count >= 1)?;
                ensure(&record, "spacing", spacing, spacing >= 0.0)
            },
            Self::Barrage { projectiles } => ensure(
                &record,
                "projectiles",
                f64::from(projectiles),
                projectiles >= 1,
            ),
            Self::Airstrike {
                damage,
                radius,
                count,
                scatter,
                ..
            } => {
                ensure(&record, "damage", damage, damage >= 0.0)?;
                ensure(&record, "radius", radius, radius > 0.0)?;
                ensure(&record, "count", f64::from(count), count >= 1)?;
                ensure(&record, "scatter", scatter, scatter >= 0.0)
            },
        }
    }
}

/// A committed cast, produced by the caster's own bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityCast {
    /// Caster
    pub caster: EntityId,
    /// Caster's team
    pub team: TeamId,
    /// Caster position at cast time
    pub origin: Vec2,
    /// Aim point
    pub aim: Vec2,
    /// Effect to apply
    pub effect: AbilityEffect,
    /// Slot it came from
    pub slot: AbilitySlot,
}

/// Everything an effect may touch.
pub struct AbilityContext<'a> {
    /// Current time
    pub now: SimTime,
    /// Combatants
    pub roster: &'a mut Roster,
    /// Projectile pool
    pub projectiles: &'a mut ProjectileSystem,
    /// Placed hazards
    pub hazards: &'a mut Hazards,
    /// Level geometry
    pub map: &'a dyn ArenaMap,
    /// Cosmetic channel
    pub events: &'a EventBus,
    /// Random source for scatter
    pub rng: &'a mut dyn RandomSource,
}

/// Applies a cast. Returns false if the caster is gone or nothing is bound.
pub fn resolve(cast: &AbilityCast, ctx: &mut AbilityContext<'_>) -> bool {
    let now = ctx.now;
    let Some(caster) = ctx.roster.get(cast.caster) else {
        debug!(entity = %cast.caster, "cast from missing entity ignored");
        return false;
    };
    if !caster.is_alive() {
        return false;
    }
    let caster_radius = caster.radius();
    let max_health = caster.max_health();
    let facing = caster.facing();
    let aim_dir = try_normalize(cast.aim - cast.origin).unwrap_or(facing);

    match cast.effect {
        AbilityEffect::None => return false,
        AbilityEffect::Shield {
            reduction,
            duration_ms,
        } => {
            if let Some(caster) = ctx.roster.get_mut(cast.caster) {
                caster.apply_status(StatusEffect::Shield { reduction }, now, duration_ms);
            }
        },
        AbilityEffect::Scope {
            range_multiplier,
            duration_ms,
        } => {
            if let Some(caster) = ctx.roster.get_mut(cast.caster) {
                caster.apply_status(StatusEffect::Scope { range_multiplier }, now, duration_ms);
            }
        },
        AbilityEffect::Dash {
            distance,
            duration_ms,
            contact_damage,
            contact_radius,
        } => {
            let to = dash_destination(ctx.map, cast.origin, aim_dir, distance, caster_radius);
            let motion = DashMotion {
                from: cast.origin,
                to,
                started: now,
                duration_ms,
                contact_damage,
                contact_radius,
                hit: AHashSet::new(),
            };
            if let Some(caster) = ctx.roster.get_mut(cast.caster) {
                caster.start_dash(motion, now);
            }
        },
        AbilityEffect::Heal { fraction } => {
            ctx.roster
                .apply_heal(cast.caster, max_health * fraction, ctx.events);
        },
        AbilityEffect::HealField {
            amount,
            tick_ms,
            duration_ms,
            radius,
            affects_allies,
        } => {
            ctx.hazards.place(
                cast.caster,
                cast.team,
                cast.origin,
                HazardKind::HealField {
                    amount,
                    radius,
                    tick_ms,
                    next_tick: now.after(tick_ms),
                    affects_allies,
                },
                now,
                now.after(duration_ms),
                ctx.events,
            );
        },
        AbilityEffect::Bomb {
            damage,
            radius,
            fuse_ms,
            max_distance,
            lobbed,
        } => {
            let reach = cast.origin.distance(cast.aim).min(max_distance);
            let wanted = cast.origin + aim_dir * reach;
            let (landing, arc, flight_ms) = if lobbed {
                let arc = ParabolicArc::with_speed(cast.origin, wanted, BOMB_THROW_SPEED, DEFAULT_GRAVITY);
                let flight_ms = (arc.duration_secs * 1000.0).round() as u64;
                (wanted, Some(arc), flight_ms)
            } else {
                (ctx.map.last_open_point(cast.origin, wanted), None, 0)
            };
            ctx.hazards.place(
                cast.caster,
                cast.team,
                landing,
                HazardKind::Bomb {
                    damage,
                    radius,
                    arc,
                },
                now,
                now.after(flight_ms + fuse_ms),
                ctx.events,
            );
        },
        AbilityEffect::Minefield {
            damage,
            radius,
            trigger_radius,
            count,
            spacing,
            arm_ms,
            lifetime_ms,
        } => {
            let across = aim_dir.perp();
            let half_span = count.saturating_sub(1) as f32 * spacing * 0.5;
            for i in 0..count {
                let point = cast.aim + across * (i as f32 * spacing - half_span);
                if ctx.map.is_wall_at(point) {
                    continue;
                }
                ctx.hazards.place(
                    cast.caster,
                    cast.team,
                    point,
                    HazardKind::Mine {
                        damage,
                        radius,
                        trigger_radius,
                        armed_at: now.after(arm_ms),
                    },
                    now,
                    now.after(lifetime_ms),
                    ctx.events,
                );
            }
        },
        AbilityEffect::Barrage { projectiles } => {
            let Some(caster) = ctx.roster.get(cast.caster) else {
                return false;
            };
            let order = FireOrder {
                shooter: cast.caster,
                team: cast.team,
                origin: cast.origin,
                aim_angle: aim_dir.y.atan2(aim_dir.x),
                target_point: cast.aim,
                weapon: caster.weapon().clone(),
                range_multiplier: caster.effects().range_multiplier(now),
            };
            let step = TAU / projectiles.max(1) as f32;
            let angles: Vec<f32> = (0..projectiles)
                .map(|i| order.aim_angle + step * i as f32)
                .collect();
            ctx.projectiles
                .fire_volley(&order, &angles, now, ctx.roster, ctx.map, ctx.events);
        },
        AbilityEffect::Airstrike {
            damage,
            radius,
            count,
            scatter,
            fuse_ms,
            stagger_ms,
        } => {
            for i in 0..count {
                let angle = ctx.rng.range(0.0, TAU);
                let dist = scatter * ctx.rng.next_f32().sqrt();
                let point = cast.aim + direction_from_angle(angle) * dist;
                ctx.hazards.place(
                    cast.caster,
                    cast.team,
                    point,
                    HazardKind::Bomb {
                        damage,
                        radius,
                        arc: None,
                    },
                    now,
                    now.after(fuse_ms + stagger_ms * u64::from(i)),
                    ctx.events,
                );
            }
        },
    }

    debug!(entity = %cast.caster, effect = cast.effect.key(), slot = ?cast.slot, "ability resolved");
    ctx.events.publish(CombatEvent::AbilityActivated {
        entity_id: cast.caster,
        slot: cast.slot,
        effect: cast.effect.key().to_string(),
        aim: cast.aim,
    });
    true
}

/// Furthest point along `dir` the caster's body fits without touching a wall.
fn dash_destination(map: &dyn ArenaMap, from: Vec2, dir: Vec2, distance: f32, radius: f32) -> Vec2 {
    let step = map.ray_step().max(0.5);
    let samples = (distance / step).ceil().max(1.0) as u32;
    let mut last = from;
    for i in 1..=samples {
        let p = from + dir * (distance * i as f32 / samples as f32);
        if map.blocks_circle(p, radius) {
            break;
        }
        last = p;
    }
    last
}
