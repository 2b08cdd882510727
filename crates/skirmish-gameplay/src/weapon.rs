//! Weapon profiles.
//!
//! This module provides:
//! - Trajectory kinds (linear, parabolic, instant spread cone)
//! - Immutable per-archetype firing parameters
//! - Shot angle distribution with optional jitter
//! - Field validation for externally supplied tables

use serde::{Deserialize, Serialize};

use skirmish_common::{spread_angles, DataError};

use crate::random::RandomSource;

/// Gravity applied to lobbed shots when a table leaves it out.
pub const DEFAULT_GRAVITY: f32 = 900.0;

/// How a weapon's shots travel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trajectory {
    /// Straight line at constant speed until range runs out.
    #[default]
    Linear,
    /// Lobbed arc that lands at the aim point (capped at range).
    Parabolic {
        /// Downward acceleration in units/s²
        #[serde(default = "default_gravity")]
        gravity: f32,
    },
    /// Instant cone check, no projectile body.
    Spread,
}

fn default_gravity() -> f32 {
    DEFAULT_GRAVITY
}

impl Trajectory {
    /// Whether shots spawn a travelling projectile.
    #[must_use]
    pub fn spawns_projectiles(&self) -> bool {
        !matches!(self, Self::Spread)
    }
}

/// Firing parameters for one weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponProfile {
    /// Display name.
    pub name: String,
    /// Damage per bullet (or per cone hit).
    pub damage: f32,
    /// Minimum time between shots.
    pub cooldown_ms: u64,
    /// Maximum travel distance.
    pub range: f32,
    /// Projectile speed in units/s.
    pub projectile_speed: f32,
    /// Bullets per trigger pull.
    pub bullets_per_shot: u32,
    /// Half-angle of the spread, radians.
    pub spread_angle: f32,
    /// Trajectory kind.
    pub trajectory: Trajectory,
    /// Random angle noise as a fraction of `spread_angle`.
    pub jitter: f32,
    /// Whether bullets continue through bodies.
    pub piercing: bool,
    /// Detonation radius; zero for plain bullets.
    pub aoe_radius: f32,
    /// Collision radius of a bullet.
    pub projectile_radius: f32,
    /// Spawn distance ahead of the shooter.
    pub muzzle_offset: f32,
    /// Steering rate toward the aimed-at target in radians/s; zero disables homing.
    pub homing_turn_rate: f32,
    /// How long the shooter cannot move after firing.
    pub attack_lock_ms: u64,
}

impl Default for WeaponProfile {
    fn default() -> Self {
        Self {
            name: "blaster".to_string(),
            damage: 20.0,
            cooldown_ms: 500,
            range: 400.0,
            projectile_speed: 600.0,
            bullets_per_shot: 1,
            spread_angle: 0.0,
            trajectory: Trajectory::Linear,
            jitter: 0.0,
            piercing: false,
            aoe_radius: 0.0,
            projectile_radius: 4.0,
            muzzle_offset: 20.0,
            homing_turn_rate: 0.0,
            attack_lock_ms: 150,
        }
    }
}

impl WeaponProfile {
    /// Creates a default profile with a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set damage.
    #[must_use]
    pub fn with_damage(mut self, damage: f32) -> Self {
        self.damage = damage;
        self
    }

    /// Set cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    /// Set range.
    #[must_use]
    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    /// Set projectile speed.
    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.projectile_speed = speed;
        self
    }

    /// Set bullet count and spread half-angle.
    #[must_use]
    pub fn with_bullets(mut self, count: u32, spread_angle: f32) -> Self {
        self.bullets_per_shot = count;
        self.spread_angle = spread_angle;
        self
    }

    /// Set trajectory.
    #[must_use]
    pub fn with_trajectory(mut self, trajectory: Trajectory) -> Self {
        self.trajectory = trajectory;
        self
    }

    /// Set jitter fraction.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.jitter = jitter;
        self
    }

    /// Make bullets piercing.
    #[must_use]
    pub fn piercing(mut self) -> Self {
        self.piercing = true;
        self
    }

    /// Set area-of-effect radius.
    #[must_use]
    pub fn with_aoe(mut self, radius: f32) -> Self {
        self.aoe_radius = radius;
        self
    }

    /// Set homing turn rate.
    #[must_use]
    pub fn with_homing(mut self, turn_rate: f32) -> Self {
        self.homing_turn_rate = turn_rate;
        self
    }

    /// Set attack movement lock.
    #[must_use]
    pub fn with_attack_lock(mut self, lock_ms: u64) -> Self {
        self.attack_lock_ms = lock_ms;
        self
    }

    /// Whether bullets detonate.
    #[must_use]
    pub fn has_aoe(&self) -> bool {
        self.aoe_radius > 0.0
    }

    /// Range after a multiplier such as a scope.
    #[must_use]
    pub fn effective_range(&self, multiplier: f32) -> f32 {
        self.range * multiplier.max(0.0)
    }

    /// Headings for one trigger pull.
    ///
    /// Bullets are spaced evenly over `±spread_angle`; jitter then nudges
    /// each one by up to `jitter * spread_angle` either way.
    pub fn shot_angles(&self, aim: f32, rng: &mut dyn RandomSource) -> Vec<f32> {
        let mut angles = spread_angles(aim, self.spread_angle, self.bullets_per_shot);
        if self.jitter > 0.0 && self.spread_angle > 0.0 {
            let noise = self.jitter * self.spread_angle;
            for angle in &mut angles {
                *angle += rng.range(-noise, noise);
            }
        }
        angles
    }

    /// Checks every field against its legal range.
    pub fn validate(&self) -> Result<(), DataError> {
        let record = || format!("weapon `{}`", self.name);
        if self.name.trim().is_empty() {
            return Err(DataError::Empty {
                record: record(),
                field: "name",
            });
        }
        ensure(&record, "damage", self.damage, self.damage >= 0.0)?;
        ensure(&record, "range", self.range, self.range > 0.0)?;
        ensure(
            &record,
            "bullets_per_shot",
            f64::from(self.bullets_per_shot),
            self.bullets_per_shot >= 1,
        )?;
        ensure(
            &record,
            "spread_angle",
            self.spread_angle,
            (0.0..=std::f32::consts::PI).contains(&self.spread_angle),
        )?;
        ensure(&record, "jitter", self.jitter, (0.0..=1.0).contains(&self.jitter))?;
        ensure(&record, "aoe_radius", self.aoe_radius, self.aoe_radius >= 0.0)?;
        ensure(
            &record,
            "projectile_radius",
            self.projectile_radius,
            self.projectile_radius >= 0.0,
        )?;
        ensure(
            &record,
            "homing_turn_rate",
            self.homing_turn_rate,
            self.homing_turn_rate >= 0.0,
        )?;
        if self.trajectory.spawns_projectiles() {
            ensure(
                &record,
                "projectile_speed",
                self.projectile_speed,
                self.projectile_speed > 0.0,
            )?;
        }
        if let Trajectory::Parabolic { gravity } = self.trajectory {
            ensure(&record, "gravity", gravity, gravity > 0.0)?;
        }
        Ok(())
    }
}

/// Fails with [`DataError::OutOfRange`] unless `ok` holds and the value is finite.
pub(crate) fn ensure(
    record: &dyn Fn() -> String,
    field: &'static str,
    value: impl Into<f64>,
    ok: bool,
) -> Result<(), DataError> {
    let value = value.into();
    if ok && value.is_finite() {
        Ok(())
    } else {
        Err(DataError::OutOfRange {
            record: record(),
            field,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;

    #[test]
    fn test_default_profile_is_valid() {
        assert!(WeaponProfile::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_fields() {
        let no_bullets = WeaponProfile::named("dud").with_bullets(0, 0.0);
        assert!(matches!(
            no_bullets.validate(),
            Err(DataError::OutOfRange {
                field: "bullets_per_shot",
                ..
            })
        ));

        let bad_range = WeaponProfile::named("short").with_range(-5.0);
        assert!(bad_range.validate().is_err());

        let flat_lob = WeaponProfile::named("lob")
            .with_trajectory(Trajectory::Parabolic { gravity: 0.0 });
        assert!(flat_lob.validate().is_err());

        let nan = WeaponProfile::named("nan").with_damage(f32::NAN);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_shot_angles_without_jitter() {
        let shotgun = WeaponProfile::named("shotgun").with_bullets(5, 0.4);
        let mut rng = ScriptedRandom::constant(0.9);
        let angles = shotgun.shot_angles(1.0, &mut rng);
        assert_eq!(angles.len(), 5);
        assert!((angles[0] - 0.6).abs() < 1e-5);
        assert!((angles[2] - 1.0).abs() < 1e-5);
        assert!((angles[4] - 1.4).abs() < 1e-5);
        assert_eq!(rng.consumed(), 0);
    }

    #[test]
    fn test_jitter_stays_bounded() {
        let shotgun = WeaponProfile::named("shotgun")
            .with_bullets(3, 0.5)
            .with_jitter(0.2);
        let mut rng = ScriptedRandom::new(vec![0.0, 0.5, 0.999]);
        let angles = shotgun.shot_angles(0.0, &mut rng);
        assert!((angles[0] - (-0.5 - 0.1)).abs() < 1e-4);
        assert!((angles[1] - 0.0).abs() < 1e-4);
        assert!((angles[2] - (0.5 + 0.1)).abs() < 1e-3);
    }

    #[test]
    fn test_trajectory_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            weapon: WeaponProfile,
        }
        let text = r#"
            [weapon]
            name = "mortar"
            damage = 40.0
            aoe_radius = 60.0
            trajectory = { kind = "parabolic" }
        "#;
        let parsed: Wrapper = toml::from_str(text).expect("valid toml");
        assert_eq!(
            parsed.weapon.trajectory,
            Trajectory::Parabolic {
                gravity: DEFAULT_GRAVITY
            }
        );
        assert_eq!(parsed.weapon.cooldown_ms, 500);
        assert!(parsed.weapon.has_aoe());
    }
}
