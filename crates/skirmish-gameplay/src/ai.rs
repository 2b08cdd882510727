//! Bot decision engine.
//!
//! This module provides:
//! - [`CombatControls`] and [`CombatView`], the surface a bot (or an input layer) drives
//! - Difficulty tiers and their timing profiles
//! - [`BotAi`], a finite-state controller re-evaluated on a fixed cadence
//!
//! A bot never touches entity internals. It reads a [`CombatantView`]
//! snapshot and issues the same move/attack/skill calls a human would.

use std::f32::consts::TAU;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use skirmish_common::{direction_from_angle, try_normalize, EntityId, Rect, SimTime};

use crate::random::RandomSource;

/// Below this health fraction a bot considers retreating.
pub const LOW_HEALTH_FRACTION: f32 = 0.3;
/// Inner distance band.
pub const CLOSE_RANGE: f32 = 100.0;
/// Outer distance band; also the ultimate and wander-attack threshold.
pub const MID_RANGE: f32 = 300.0;
/// Maximum wander leg.
pub const WANDER_RADIUS: f32 = 200.0;
/// Distance at which a wander destination counts as reached.
pub const WANDER_ARRIVAL: f32 = 10.0;
/// Margin kept between wander destinations and the world edge.
pub const WANDER_MARGIN: f32 = 32.0;
/// Delay between a successful skill cast and switching to attack.
pub const SKILL_RECOVERY_MS: u64 = 500;
/// Throttle of the backward drift while holding position.
pub const ATTACK_DRIFT: f32 = 0.2;

/// Driving surface shared by human input and bots.
pub trait CombatControls {
    /// Full-speed movement intent; zero stops.
    fn move_entity(&mut self, id: EntityId, direction: Vec2);
    /// Movement intent at a fraction of full speed.
    fn move_entity_with_throttle(&mut self, id: EntityId, direction: Vec2, throttle: f32);
    /// One trigger pull. False if rejected.
    fn attack(&mut self, id: EntityId, target: Vec2) -> bool;
    /// Skill cast. False if rejected.
    fn use_skill(&mut self, id: EntityId, target: Option<Vec2>) -> bool;
    /// Ultimate cast. False if rejected.
    fn use_ultimate(&mut self, id: EntityId, target: Option<Vec2>) -> bool;
}

/// Read-only snapshot of a combatant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatantView {
    /// World position
    pub position: Vec2,
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Whether alive
    pub alive: bool,
    /// Whether a skill cast would succeed
    pub skill_ready: bool,
    /// Whether an ultimate cast would succeed
    pub ultimate_ready: bool,
}

impl CombatantView {
    /// Health as a fraction of maximum.
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            self.health / self.max_health
        }
    }
}

/// World queries a bot needs.
pub trait CombatView {
    /// Snapshot of a combatant, or `None` if it no longer exists.
    fn combatant(&self, id: EntityId) -> Option<CombatantView>;
    /// Playable area.
    fn world_bounds(&self) -> Rect;
}

/// Difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Slowest decisions
    Easy,
    /// Default
    #[default]
    Normal,
    /// Faster decisions
    Hard,
    /// Fastest and most skill-hungry
    Insane,
}

impl Difficulty {
    /// Tier index, 0 for easy.
    #[must_use]
    pub fn index(self) -> u32 {
        match self {
            Self::Easy => 0,
            Self::Normal => 1,
            Self::Hard => 2,
            Self::Insane => 3,
        }
    }

    /// Chance per re-evaluation of choosing the skill.
    #[must_use]
    pub fn skill_chance(self) -> f32 {
        0.05 * (self.index() + 1) as f32
    }

    /// Timing parameters for the tier.
    #[must_use]
    pub fn profile(self) -> DifficultyProfile {
        let (state_change_interval_ms, attack_cooldown_ms, skill_cooldown_ms) = match self {
            Self::Easy => (2000, 1500, 10_000),
            Self::Normal => (1500, 1000, 8000),
            Self::Hard => (1000, 700, 6000),
            Self::Insane => (600, 400, 4000),
        };
        DifficultyProfile {
            state_change_interval_ms,
            attack_cooldown_ms,
            skill_cooldown_ms,
        }
    }
}

/// Timing derived from a difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyProfile {
    /// Time between re-evaluations
    pub state_change_interval_ms: u64,
    /// Minimum time between the bot's own attack attempts
    pub attack_cooldown_ms: u64,
    /// Minimum time between the bot's own skill attempts
    pub skill_cooldown_ms: u64,
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BotState {
    /// Initial
    #[default]
    Idle,
    /// Closing in
    Chase,
    /// Holding and firing
    Attack,
    /// Backing off
    Retreat,
    /// Travelling to a random point
    Wander,
    /// Casting the skill
    UseSkill,
}

/// Finite-state controller binding one owner to one target.
pub struct BotAi {
    owner: EntityId,
    target: Option<EntityId>,
    difficulty: Difficulty,
    profile: DifficultyProfile,
    state: BotState,
    last_state_change: Option<SimTime>,
    last_attack: Option<SimTime>,
    last_skill: Option<SimTime>,
    wander_destination: Option<Vec2>,
    wander_arrived: bool,
    skill_recovery_until: Option<SimTime>,
    enabled: bool,
    rng: Box<dyn RandomSource + Send>,
}

impl BotAi {
    /// Creates an enabled controller with a seeded generator.
    #[must_use]
    pub fn new(owner: EntityId, target: Option<EntityId>, difficulty: Difficulty, seed: u64) -> Self {
        Self::with_random(owner, target, difficulty, Box::new(fastrand::Rng::with_seed(seed)))
    }

    /// Creates an enabled controller drawing from `rng`.
    #[must_use]
    pub fn with_random(
        owner: EntityId,
        target: Option<EntityId>,
        difficulty: Difficulty,
        rng: Box<dyn RandomSource + Send>,
    ) -> Self {
        Self {
            owner,
            target,
            difficulty,
            profile: difficulty.profile(),
            state: BotState::Idle,
            last_state_change: None,
            last_attack: None,
            last_skill: None,
            wander_destination: None,
            wander_arrived: false,
            skill_recovery_until: None,
            enabled: true,
            rng,
        }
    }

    /// Controlled entity.
    #[must_use]
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Current target.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BotState {
        self.state
    }

    /// Difficulty tier.
    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Active timing profile.
    #[must_use]
    pub fn profile(&self) -> DifficultyProfile {
        self.profile
    }

    /// Whether per-tick actions run.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current wander destination.
    #[must_use]
    pub fn wander_destination(&self) -> Option<Vec2> {
        self.wander_destination
    }

    /// Resumes per-tick actions.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Stops per-tick actions and zeroes the owner's movement.
    pub fn disable<W: CombatControls + ?Sized>(&mut self, world: &mut W) {
        self.enabled = false;
        world.move_entity(self.owner, Vec2::ZERO);
    }

    /// Switches tier and re-derives the timing profile.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.profile = difficulty.profile();
    }

    /// Rebinds the target.
    pub fn set_target(&mut self, target: Option<EntityId>) {
        self.target = target;
    }

    /// Runs one tick: re-evaluates if the interval elapsed, then acts.
    pub fn update<W: CombatControls + CombatView + ?Sized>(&mut self, now: SimTime, world: &mut W) {
        if !self.enabled {
            return;
        }
        let Some(me) = world.combatant(self.owner).filter(|v| v.alive) else {
            return;
        };
        // Missing or dead target: keep the current intent and state
        let Some(foe) = self
            .target
            .and_then(|id| world.combatant(id))
            .filter(|v| v.alive)
        else {
            trace!(bot = %self.owner, "no live target, holding");
            return;
        };

        let due = self.last_state_change.map_or(true, |at| {
            now.millis_since(at) >= self.profile.state_change_interval_ms
        });
        if due {
            self.last_state_change = Some(now);
            self.reevaluate(now, &me, &foe, world);
        }
        self.act(now, &me, &foe, world);
    }

    fn reevaluate<W: CombatControls + ?Sized>(
        &mut self,
        now: SimTime,
        me: &CombatantView,
        foe: &CombatantView,
        world: &mut W,
    ) {
        let distance = me.position.distance(foe.position);
        if me.ultimate_ready && distance <= MID_RANGE {
            world.use_ultimate(self.owner, Some(foe.position));
        }

        let skill_window = self
            .last_skill
            .map_or(true, |at| now.millis_since(at) >= self.profile.skill_cooldown_ms);
        let roll = self.rng.next_f32();
        let next = if roll < self.difficulty.skill_chance() && me.skill_ready && skill_window {
            BotState::UseSkill
        } else if me.health_fraction() < LOW_HEALTH_FRACTION && self.rng.chance(0.7) {
            BotState::Retreat
        } else if distance < CLOSE_RANGE {
            if self.rng.chance(0.7) {
                BotState::Attack
            } else {
                BotState::Retreat
            }
        } else if distance <= MID_RANGE {
            if self.rng.chance(0.6) {
                BotState::Chase
            } else {
                BotState::Attack
            }
        } else if self.rng.chance(0.4) {
            BotState::Wander
        } else {
            BotState::Chase
        };
        self.enter(next);
    }

    fn enter(&mut self, next: BotState) {
        if next != self.state {
            debug!(bot = %self.owner, from = ?self.state, to = ?next, "bot state change");
        }
        if next == BotState::Wander && self.state != BotState::Wander {
            self.wander_destination = None;
            self.wander_arrived = false;
        }
        if next != BotState::UseSkill {
            self.skill_recovery_until = None;
        }
        self.state = next;
    }

    fn act<W: CombatControls + CombatView + ?Sized>(
        &mut self,
        now: SimTime,
        me: &CombatantView,
        foe: &CombatantView,
        world: &mut W,
    ) {
        let toward = foe.position - me.position;
        match self.state {
            BotState::Idle => {},
            BotState::Chase => {
                world.move_entity(self.owner, toward);
                self.try_attack(now, foe.position, world);
            },
            BotState::Attack => {
                world.move_entity_with_throttle(self.owner, -toward, ATTACK_DRIFT);
                self.try_attack(now, foe.position, world);
            },
            BotState::Retreat => {
                world.move_entity(self.owner, -toward);
            },
            BotState::Wander => self.wander(now, me, foe, world),
            BotState::UseSkill => match self.skill_recovery_until {
                Some(until) => {
                    if now.has_reached(until) {
                        self.enter(BotState::Attack);
                    }
                },
                None => {
                    if world.use_skill(self.owner, Some(foe.position)) {
                        self.last_skill = Some(now);
                        self.skill_recovery_until = Some(now.after(SKILL_RECOVERY_MS));
                    } else {
                        self.enter(BotState::Chase);
                    }
                },
            },
        }
    }

    fn wander<W: CombatControls + CombatView + ?Sized>(
        &mut self,
        now: SimTime,
        me: &CombatantView,
        foe: &CombatantView,
        world: &mut W,
    ) {
        if self.wander_arrived {
            return;
        }
        let destination = match self.wander_destination {
            Some(d) => d,
            None => {
                let angle = self.rng.range(0.0, TAU);
                let reach = self.rng.range(0.0, WANDER_RADIUS);
                let raw = me.position + direction_from_angle(angle) * reach;
                let d = world.world_bounds().inset(WANDER_MARGIN).clamp(raw);
                self.wander_destination = Some(d);
                d
            },
        };

        let offset = destination - me.position;
        if offset.length() < WANDER_ARRIVAL {
            world.move_entity(self.owner, Vec2::ZERO);
            self.wander_arrived = true;
            if me.position.distance(foe.position) <= MID_RANGE {
                self.try_attack(now, foe.position, world);
            }
            return;
        }
        if let Some(dir) = try_normalize(offset) {
            world.move_entity(self.owner, dir);
        }
    }

    fn try_attack<W: CombatControls + ?Sized>(&mut self, now: SimTime, target: Vec2, world: &mut W) {
        let window_open = self
            .last_attack
            .map_or(true, |at| now.millis_since(at) >= self.profile.attack_cooldown_ms);
        if window_open && world.attack(self.owner, target) {
            self.last_attack = Some(now);
        }
    }
}
