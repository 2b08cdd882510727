//! Archetype tables.
//!
//! An archetype is a character class defined entirely by data: stats, a
//! weapon profile and the effects bound to its skill and ultimate slots.
//! Tables are normally loaded from versioned TOML by the engine; a
//! built-in table ships the reference roster.

use std::f32::consts::PI;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use skirmish_common::DataError;

use crate::skills::AbilityEffect;
use crate::weapon::{ensure, Trajectory, WeaponProfile, DEFAULT_GRAVITY};

/// Name of the neutral fallback profile.
pub const NEUTRAL_ARCHETYPE: &str = "recruit";

/// Errors raised while building a table.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ArchetypeError {
    /// Two entries share a name
    #[error("Duplicate archetype: {0}")]
    Duplicate(String),

    /// An entry failed validation
    #[error("Invalid archetype: {0}")]
    Invalid(#[from] DataError),
}

/// Result type for table operations.
pub type ArchetypeResult<T> = Result<T, ArchetypeError>;

/// Numeric description of one character class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeProfile {
    /// Unique name, used as the table key.
    pub name: String,
    /// Health at spawn.
    pub max_health: f32,
    /// Top speed in units/s.
    pub move_speed: f32,
    /// Body radius.
    pub radius: f32,
    /// Starting weapon.
    pub weapon: WeaponProfile,
    /// Effect bound to the skill slot.
    pub skill: AbilityEffect,
    /// Skill cooldown.
    pub skill_cooldown_ms: u64,
    /// Movement lock after a skill or ultimate cast.
    pub skill_lock_ms: u64,
    /// Effect bound to the ultimate slot.
    pub ultimate: AbilityEffect,
    /// Ultimate cooldown.
    pub ultimate_cooldown_ms: u64,
    /// Charge needed before the ultimate unlocks; zero means cooldown only.
    pub ultimate_charge_max: f32,
    /// Charge per attack.
    pub charge_per_attack: f32,
    /// Charge per skill cast.
    pub charge_per_skill: f32,
    /// Charge per accepted hit taken.
    pub charge_per_hit: f32,
    /// Delay between death and respawn.
    pub respawn_delay_ms: u64,
    /// Invincibility window after respawning.
    pub respawn_invincible_ms: u64,
}

impl Default for ArchetypeProfile {
    fn default() -> Self {
        Self {
            name: NEUTRAL_ARCHETYPE.to_string(),
            max_health: 100.0,
            move_speed: 200.0,
            radius: 16.0,
            weapon: WeaponProfile::default(),
            skill: AbilityEffect::None,
            skill_cooldown_ms: 5000,
            skill_lock_ms: 200,
            ultimate: AbilityEffect::None,
            ultimate_cooldown_ms: 20_000,
            ultimate_charge_max: 100.0,
            charge_per_attack: 10.0,
            charge_per_skill: 15.0,
            charge_per_hit: 5.0,
            respawn_delay_ms: 3000,
            respawn_invincible_ms: 2000,
        }
    }
}

impl ArchetypeProfile {
    /// Creates a neutral profile with a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set health.
    #[must_use]
    pub fn with_health(mut self, max_health: f32) -> Self {
        self.max_health = max_health;
        self
    }

    /// Set speed.
    #[must_use]
    pub fn with_speed(mut self, move_speed: f32) -> Self {
        self.move_speed = move_speed;
        self
    }

    /// Set weapon.
    #[must_use]
    pub fn with_weapon(mut self, weapon: WeaponProfile) -> Self {
        self.weapon = weapon;
        self
    }

    /// Bind the skill slot.
    #[must_use]
    pub fn with_skill(mut self, effect: AbilityEffect, cooldown_ms: u64) -> Self {
        self.skill = effect;
        self.skill_cooldown_ms = cooldown_ms;
        self
    }

    /// Bind the ultimate slot.
    #[must_use]
    pub fn with_ultimate(mut self, effect: AbilityEffect, cooldown_ms: u64) -> Self {
        self.ultimate = effect;
        self.ultimate_cooldown_ms = cooldown_ms;
        self
    }

    /// Checks stats, weapon and both effect records.
    pub fn validate(&self) -> Result<(), DataError> {
        if self.name.trim().is_empty() {
            return Err(DataError::Empty {
                record: "archetype".to_string(),
                field: "name",
            });
        }
        let record = || format!("archetype `{}`", self.name);
        ensure(&record, "max_health", self.max_health, self.max_health > 0.0)?;
        ensure(&record, "move_speed", self.move_speed, self.move_speed > 0.0)?;
        ensure(&record, "radius", self.radius, self.radius > 0.0)?;
        ensure(
            &record,
            "ultimate_charge_max",
            self.ultimate_charge_max,
            self.ultimate_charge_max >= 0.0,
        )?;
        for (field, value) in [
            ("charge_per_attack", self.charge_per_attack),
            ("charge_per_skill", self.charge_per_skill),
            ("charge_per_hit", self.charge_per_hit),
        ] {
            ensure(&record, field, value, value >= 0.0)?;
        }
        self.weapon.validate()?;
        self.skill.validate(&self.name)?;
        self.ultimate.validate(&self.name)
    }
}

/// Archetypes keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeTable {
    profiles: AHashMap<String, ArchetypeProfile>,
    neutral: ArchetypeProfile,
}

impl ArchetypeTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and adds a profile.
    pub fn register(&mut self, profile: ArchetypeProfile) -> ArchetypeResult<()> {
        profile.validate()?;
        if self.profiles.contains_key(&profile.name) {
            return Err(ArchetypeError::Duplicate(profile.name));
        }
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Looks up a profile.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArchetypeProfile> {
        self.profiles.get(name)
    }

    /// Looks up a profile, falling back to the neutral one.
    #[must_use]
    pub fn get_or_default(&self, name: &str) -> &ArchetypeProfile {
        self.profiles.get(name).unwrap_or_else(|| {
            warn!(archetype = name, "unknown archetype, using neutral profile");
            &self.neutral
        })
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// All profiles in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ArchetypeProfile> {
        self.profiles.values()
    }

    /// Moves every profile of `other` into this table, replacing same-named entries.
    pub fn merge(&mut self, other: Self) {
        for (name, profile) in other.profiles {
            if self.profiles.contains_key(&name) {
                debug!(archetype = %name, "archetype overridden");
            }
            self.profiles.insert(name, profile);
        }
    }

    /// The reference roster.
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for profile in builtin_profiles() {
            table.profiles.insert(profile.name.clone(), profile);
        }
        table
    }
}

fn builtin_profiles() -> Vec<ArchetypeProfile> {
    vec![
        ArchetypeProfile::named("guardian")
            .with_health(160.0)
            .with_speed(170.0)
            .with_weapon(
                WeaponProfile::named("scattergun")
                    .with_damage(12.0)
                    .with_cooldown(800)
                    .with_range(260.0)
                    .with_speed(650.0)
                    .with_bullets(5, PI / 10.0)
                    .with_jitter(0.25),
            )
            .with_skill(
                AbilityEffect::Shield {
                    reduction: 0.3,
                    duration_ms: 3000,
                },
                8000,
            )
            .with_ultimate(
                AbilityEffect::Shield {
                    reduction: 0.8,
                    duration_ms: 4000,
                },
                25_000,
            ),
        ArchetypeProfile::named("striker")
            .with_speed(240.0)
            .with_weapon(
                WeaponProfile::named("repeater")
                    .with_damage(9.0)
                    .with_cooldown(180)
                    .with_range(360.0)
                    .with_speed(800.0),
            )
            .with_skill(
                AbilityEffect::Dash {
                    distance: 220.0,
                    duration_ms: 180,
                    contact_damage: 25.0,
                    contact_radius: 10.0,
                },
                4000,
            )
            .with_ultimate(AbilityEffect::Barrage { projectiles: 16 }, 20_000),
        ArchetypeProfile::named("medic")
            .with_health(110.0)
            .with_weapon(
                WeaponProfile::named("needler")
                    .with_damage(14.0)
                    .with_cooldown(400)
                    .with_range(380.0)
                    .with_homing(3.0),
            )
            .with_skill(AbilityEffect::Heal { fraction: 0.3 }, 7000)
            .with_ultimate(
                AbilityEffect::HealField {
                    amount: 8.0,
                    tick_ms: 500,
                    duration_ms: 5000,
                    radius: 140.0,
                    affects_allies: true,
                },
                22_000,
            ),
        ArchetypeProfile::named("sniper")
            .with_health(80.0)
            .with_weapon(
                WeaponProfile::named("longshot")
                    .with_damage(45.0)
                    .with_cooldown(1400)
                    .with_range(700.0)
                    .with_speed(1400.0)
                    .piercing()
                    .with_attack_lock(300),
            )
            .with_skill(
                AbilityEffect::Scope {
                    range_multiplier: 1.5,
                    duration_ms: 5000,
                },
                10_000,
            )
            .with_ultimate(
                AbilityEffect::Airstrike {
                    damage: 55.0,
                    radius: 90.0,
                    count: 5,
                    scatter: 160.0,
                    fuse_ms: 900,
                    stagger_ms: 250,
                },
                30_000,
            ),
        ArchetypeProfile::named("grenadier")
            .with_health(120.0)
            .with_speed(180.0)
            .with_weapon(
                WeaponProfile::named("mortar")
                    .with_damage(40.0)
                    .with_cooldown(1200)
                    .with_range(420.0)
                    .with_speed(380.0)
                    .with_trajectory(Trajectory::Parabolic {
                        gravity: DEFAULT_GRAVITY,
                    })
                    .with_aoe(70.0),
            )
            .with_skill(
                AbilityEffect::Bomb {
                    damage: 60.0,
                    radius: 100.0,
                    fuse_ms: 600,
                    max_distance: 350.0,
                    lobbed: true,
                },
                6000,
            )
            .with_ultimate(
                AbilityEffect::Minefield {
                    damage: 45.0,
                    radius: 80.0,
                    trigger_radius: 24.0,
                    count: 5,
                    spacing: 48.0,
                    arm_ms: 600,
                    lifetime_ms: 20_000,
                },
                24_000,
            ),
        ArchetypeProfile::named("trapper")
            .with_weapon(
                WeaponProfile::named("flamer")
                    .with_damage(18.0)
                    .with_cooldown(600)
                    .with_range(180.0)
                    .with_bullets(1, PI / 6.0)
                    .with_trajectory(Trajectory::Spread),
            )
            .with_skill(
                AbilityEffect::Minefield {
                    damage: 35.0,
                    radius: 70.0,
                    trigger_radius: 20.0,
                    count: 3,
                    spacing: 40.0,
                    arm_ms: 500,
                    lifetime_ms: 15_000,
                },
                9000,
            )
            .with_ultimate(
                AbilityEffect::Bomb {
                    damage: 90.0,
                    radius: 150.0,
                    fuse_ms: 1500,
                    max_distance: 250.0,
                    lobbed: false,
                },
                20_000,
            ),
    ]
}
