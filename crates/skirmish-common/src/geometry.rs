//! 2D geometry for combat resolution.
//!
//! Distances, angles, cone and circle containment, segment sweeps, trajectory
//! sampling and the area-damage falloff formula. Angles are radians measured
//! with `atan2(dy, dx)`, so `0` faces +X.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Below this length a vector is treated as zero.
pub const EPSILON: f32 = 1.0e-4;

/// Euclidean distance between two points.
#[must_use]
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

/// Angle of the vector from `from` to `to`.
#[must_use]
pub fn angle_to(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x)
}

/// Unit vector pointing along `angle`.
#[must_use]
pub fn direction_from_angle(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Normalizes `v`, returning `None` for (near) zero vectors.
#[must_use]
pub fn try_normalize(v: Vec2) -> Option<Vec2> {
    if v.length_squared() < EPSILON * EPSILON {
        None
    } else {
        Some(v.normalize())
    }
}

/// Wraps an angle into `(-PI, PI]`.
#[must_use]
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = (angle + PI).rem_euclid(TAU) - PI;
    if a <= -PI {
        a += TAU;
    }
    a
}

/// Absolute angular distance between two headings, in `[0, PI]`.
#[must_use]
pub fn angle_between(a: f32, b: f32) -> f32 {
    wrap_angle(a - b).abs()
}

/// Position after travelling `elapsed_secs` along `direction` at `speed`.
#[must_use]
pub fn linear_point(origin: Vec2, direction: Vec2, speed: f32, elapsed_secs: f32) -> Vec2 {
    origin + direction * speed * elapsed_secs
}

/// Whether `point` lies inside or on the circle.
#[must_use]
pub fn circle_contains(center: Vec2, radius: f32, point: Vec2) -> bool {
    center.distance_squared(point) <= radius * radius
}

/// Whether two circles overlap or touch.
#[must_use]
pub fn circles_overlap(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> bool {
    circle_contains(a, radius_a + radius_b, b)
}

/// Closest point to `p` on the segment `a..b`.
#[must_use]
pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < EPSILON * EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Whether the segment `a..b` passes within `radius` of `center`.
///
/// Used for swept hit tests so fast projectiles cannot tunnel through a
/// target between two ticks.
#[must_use]
pub fn segment_hits_circle(a: Vec2, b: Vec2, center: Vec2, radius: f32) -> bool {
    circle_contains(center, radius, closest_point_on_segment(a, b, center))
}

/// Whether `point` is inside the cone at `origin` facing `heading`.
///
/// The cone spans `half_angle` either side of `heading` and reaches out to
/// `range`. The apex itself counts as inside.
#[must_use]
pub fn in_cone(origin: Vec2, heading: f32, half_angle: f32, range: f32, point: Vec2) -> bool {
    let offset = point - origin;
    let dist_sq = offset.length_squared();
    if dist_sq > range * range {
        return false;
    }
    if dist_sq < EPSILON * EPSILON {
        return true;
    }
    angle_between(offset.y.atan2(offset.x), heading) <= half_angle
}

/// Area damage with linear falloff to zero at the edge.
///
/// `base * (1 - distance / radius)` inside the radius; exactly zero at or
/// beyond the boundary and for degenerate radii.
#[must_use]
pub fn falloff_damage(base: f32, distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 || distance >= radius {
        return 0.0;
    }
    base * (1.0 - distance.max(0.0) / radius)
}

/// Evenly distributed shot headings across `±spread` around `aim`.
///
/// A single bullet flies straight down the aim line.
#[must_use]
pub fn spread_angles(aim: f32, spread: f32, count: u32) -> Vec<f32> {
    match count {
        0 => Vec::new(),
        1 => vec![aim],
        n => {
            let step = (2.0 * spread) / (n - 1) as f32;
            (0..n).map(|i| aim - spread + step * i as f32).collect()
        },
    }
}

/// Axis-aligned rectangle in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Minimum corner
    pub min: Vec2,
    /// Maximum corner
    pub max: Vec2,
}

impl Rect {
    /// Creates a rectangle from two corners.
    #[must_use]
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Width of the rectangle.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Height of the rectangle.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Whether the point lies inside (edges inclusive).
    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Clamps a point into the rectangle.
    #[must_use]
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }

    /// Returns the rectangle shrunk by `margin` on every side.
    ///
    /// Collapses to the centre instead of inverting.
    #[must_use]
    pub fn inset(&self, margin: f32) -> Self {
        let center = (self.min + self.max) * 0.5;
        let min = (self.min + Vec2::splat(margin)).min(center);
        let max = (self.max - Vec2::splat(margin)).max(center);
        Self { min, max }
    }
}

/// A lobbed trajectory over flat ground.
///
/// The ground track moves at constant velocity from `origin` to `target`
/// while height follows `vz0 * t - g * t² / 2`, returning to the ground
/// exactly at `duration_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParabolicArc {
    /// Launch point
    pub origin: Vec2,
    /// Landing point
    pub target: Vec2,
    /// Total flight time in seconds
    pub duration_secs: f32,
    /// Downward acceleration (units/s²)
    pub gravity: f32,
}

impl ParabolicArc {
    /// Builds an arc whose flight time follows from the horizontal speed.
    #[must_use]
    pub fn with_speed(origin: Vec2, target: Vec2, horizontal_speed: f32, gravity: f32) -> Self {
        let dist = origin.distance(target);
        let duration_secs = if horizontal_speed > EPSILON {
            dist / horizontal_speed
        } else {
            0.0
        };
        Self {
            origin,
            target,
            duration_secs,
            gravity,
        }
    }

    /// Builds an arc that lands after a fixed flight time.
    #[must_use]
    pub fn with_duration(origin: Vec2, target: Vec2, duration_secs: f32, gravity: f32) -> Self {
        Self {
            origin,
            target,
            duration_secs: duration_secs.max(0.0),
            gravity,
        }
    }

    /// Initial vertical speed needed to land at `duration_secs`.
    #[must_use]
    pub fn launch_vertical_speed(&self) -> f32 {
        self.gravity * self.duration_secs * 0.5
    }

    /// Highest point above the ground.
    #[must_use]
    pub fn apex_height(&self) -> f32 {
        let vz = self.launch_vertical_speed();
        if self.gravity <= EPSILON {
            0.0
        } else {
            vz * vz / (2.0 * self.gravity)
        }
    }

    /// Ground position at `t` seconds, clamped to the flight.
    #[must_use]
    pub fn ground_point(&self, t: f32) -> Vec2 {
        if self.duration_secs <= EPSILON {
            return self.target;
        }
        let frac = (t / self.duration_secs).clamp(0.0, 1.0);
        self.origin.lerp(self.target, frac)
    }

    /// Height above ground at `t` seconds; zero before launch and after landing.
    #[must_use]
    pub fn height(&self, t: f32) -> f32 {
        if t <= 0.0 || t >= self.duration_secs {
            return 0.0;
        }
        (self.launch_vertical_speed() * t - 0.5 * self.gravity * t * t).max(0.0)
    }

    /// Whether the projectile has come back down.
    #[must_use]
    pub fn has_landed(&self, t: f32) -> bool {
        t >= self.duration_secs
    }
}
