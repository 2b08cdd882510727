//! Map collaborator: wall queries and spawn points.
//!
//! This module provides:
//! - The [`ArenaMap`] trait consumed by movement, projectiles and respawn
//! - [`TileMap`], a grid map parsed from ASCII rows
//! - [`OpenMap`], a wall-free rectangle with optional box walls for tests and sandboxes

use std::cell::Cell;

use ahash::AHashMap;
use glam::Vec2;
use thiserror::Error;
use tracing::debug;

use skirmish_common::{Rect, TeamId};

/// Distance between samples when marching a segment against walls.
pub const DEFAULT_RAY_STEP: f32 = 4.0;

/// Errors raised while building a tile map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// No rows, or rows with no tiles
    #[error("map has no tiles")]
    Empty,
    /// A row has a different width from the first
    #[error("row {row} has {found} tiles, expected {expected}")]
    Ragged {
        /// Row index
        row: usize,
        /// Width of the first row
        expected: usize,
        /// Width of this row
        found: usize,
    },
    /// A character that is not a wall, floor or spawn digit
    #[error("unknown tile {tile:?} at row {row}, column {col}")]
    UnknownTile {
        /// Row index
        row: usize,
        /// Column index
        col: usize,
        /// Offending character
        tile: char,
    },
    /// Tile size must be positive
    #[error("tile size must be positive, got {0}")]
    BadTileSize(String),
}

/// Result type for map construction.
pub type MapResult<T> = Result<T, MapError>;

/// World queries the combat core needs from the level.
pub trait ArenaMap {
    /// Whether the point is inside solid geometry. Out of bounds counts as wall.
    fn is_wall_at(&self, point: Vec2) -> bool;

    /// A spawn position for the team.
    fn spawn_point(&self, team: TeamId) -> Vec2;

    /// Playable world rectangle.
    fn bounds(&self) -> Rect;

    /// Sample spacing for segment marching.
    fn ray_step(&self) -> f32 {
        DEFAULT_RAY_STEP
    }

    /// First sampled wall point on the segment `from..to`, if any.
    fn first_wall_on_segment(&self, from: Vec2, to: Vec2) -> Option<Vec2> {
        let length = from.distance(to);
        let step = self.ray_step().max(0.5);
        let samples = (length / step).ceil().max(1.0) as u32;
        (1..=samples)
            .map(|i| from.lerp(to, i as f32 / samples as f32))
            .find(|p| self.is_wall_at(*p))
    }

    /// Furthest open sample on `from..to` before the first wall.
    ///
    /// Returns `from` if the first sample is already blocked.
    fn last_open_point(&self, from: Vec2, to: Vec2) -> Vec2 {
        let length = from.distance(to);
        let step = self.ray_step().max(0.5);
        let samples = (length / step).ceil().max(1.0) as u32;
        let mut last = from;
        for i in 1..=samples {
            let p = from.lerp(to, i as f32 / samples as f32);
            if self.is_wall_at(p) {
                break;
            }
            last = p;
        }
        last
    }

    /// Whether no wall lies between the two points.
    fn has_line_of_sight(&self, from: Vec2, to: Vec2) -> bool {
        self.first_wall_on_segment(from, to).is_none()
    }

    /// Whether a circle of `radius` at `center` touches a wall.
    ///
    /// Checks the centre plus eight points on the rim.
    fn blocks_circle(&self, center: Vec2, radius: f32) -> bool {
        if self.is_wall_at(center) {
            return true;
        }
        if radius <= 0.0 {
            return false;
        }
        let d = radius * std::f32::consts::FRAC_1_SQRT_2;
        [
            Vec2::new(radius, 0.0),
            Vec2::new(-radius, 0.0),
            Vec2::new(0.0, radius),
            Vec2::new(0.0, -radius),
            Vec2::new(d, d),
            Vec2::new(-d, d),
            Vec2::new(d, -d),
            Vec2::new(-d, -d),
        ]
        .into_iter()
        .any(|offset| self.is_wall_at(center + offset))
    }
}

/// Grid map built from ASCII rows.
///
/// `#` is a wall, `.` is floor and a digit `0`-`9` is a floor tile that also
/// serves as a spawn point for that team. Row 0 is the top of the map at
/// `y = 0`; `y` grows downward.
#[derive(Debug, Clone)]
pub struct TileMap {
    width: usize,
    height: usize,
    tile_size: f32,
    walls: Vec<bool>,
    spawns: AHashMap<TeamId, Vec<Vec2>>,
    next_spawn: Cell<usize>,
}

impl TileMap {
    /// Parses a map from rows of tiles.
    pub fn from_rows<S: AsRef<str>>(rows: &[S], tile_size: f32) -> MapResult<Self> {
        if !(tile_size.is_finite() && tile_size > 0.0) {
            return Err(MapError::BadTileSize(tile_size.to_string()));
        }
        let width = rows.first().map_or(0, |r| r.as_ref().chars().count());
        if width == 0 {
            return Err(MapError::Empty);
        }

        let mut walls = Vec::with_capacity(width * rows.len());
        let mut spawns: AHashMap<TeamId, Vec<Vec2>> = AHashMap::new();
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            let found = line.chars().count();
            if found != width {
                return Err(MapError::Ragged {
                    row,
                    expected: width,
                    found,
                });
            }
            for (col, tile) in line.chars().enumerate() {
                match tile {
                    '#' => walls.push(true),
                    '.' => walls.push(false),
                    d if d.is_ascii_digit() => {
                        walls.push(false);
                        let team = TeamId::new(d as u8 - b'0');
                        let center = Vec2::new(
                            (col as f32 + 0.5) * tile_size,
                            (row as f32 + 0.5) * tile_size,
                        );
                        spawns.entry(team).or_default().push(center);
                    },
                    other => {
                        return Err(MapError::UnknownTile {
                            row,
                            col,
                            tile: other,
                        })
                    },
                }
            }
        }

        Ok(Self {
            width,
            height: rows.len(),
            tile_size,
            walls,
            spawns,
            next_spawn: Cell::new(0),
        })
    }

    /// Width in tiles.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in tiles.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Tile edge length in world units.
    #[must_use]
    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Spawn points declared for a team.
    #[must_use]
    pub fn spawns_for(&self, team: TeamId) -> &[Vec2] {
        self.spawns.get(&team).map_or(&[], Vec::as_slice)
    }

    /// Whether the tile at `(col, row)` is a wall. Out of range is a wall.
    #[must_use]
    pub fn is_wall_tile(&self, col: i64, row: i64) -> bool {
        if col < 0 || row < 0 || col >= self.width as i64 || row >= self.height as i64 {
            return true;
        }
        self.walls[row as usize * self.width + col as usize]
    }
}

impl ArenaMap for TileMap {
    fn is_wall_at(&self, point: Vec2) -> bool {
        if !point.is_finite() {
            return true;
        }
        let col = (point.x / self.tile_size).floor() as i64;
        let row = (point.y / self.tile_size).floor() as i64;
        self.is_wall_tile(col, row)
    }

    fn spawn_point(&self, team: TeamId) -> Vec2 {
        let points = self.spawns_for(team);
        if points.is_empty() {
            debug!(%team, "no spawn tiles for team, using map centre");
            let b = self.bounds();
            return (b.min + b.max) * 0.5;
        }
        let index = self.next_spawn.get();
        self.next_spawn.set(index.wrapping_add(1));
        points[index % points.len()]
    }

    fn bounds(&self) -> Rect {
        Rect::new(
            Vec2::ZERO,
            Vec2::new(
                self.width as f32 * self.tile_size,
                self.height as f32 * self.tile_size,
            ),
        )
    }

    fn ray_step(&self) -> f32 {
        (self.tile_size * 0.25).max(1.0)
    }
}

/// Open rectangle with optional box walls.
#[derive(Debug, Clone)]
pub struct OpenMap {
    bounds: Rect,
    walls: Vec<Rect>,
    spawns: AHashMap<TeamId, Vec2>,
}

impl OpenMap {
    /// Creates an open arena of the given size anchored at the origin.
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            bounds: Rect::new(Vec2::ZERO, Vec2::new(width, height)),
            walls: Vec::new(),
            spawns: AHashMap::new(),
        }
    }

    /// Adds a solid box.
    #[must_use]
    pub fn with_wall(mut self, wall: Rect) -> Self {
        self.walls.push(wall);
        self
    }

    /// Sets the spawn point for a team.
    #[must_use]
    pub fn with_spawn(mut self, team: TeamId, point: Vec2) -> Self {
        self.spawns.insert(team, point);
        self
    }
}

impl Default for OpenMap {
    fn default() -> Self {
        Self::new(2000.0, 2000.0)
    }
}

impl ArenaMap for OpenMap {
    fn is_wall_at(&self, point: Vec2) -> bool {
        !self.bounds.contains(point) || self.walls.iter().any(|w| w.contains(point))
    }

    fn spawn_point(&self, team: TeamId) -> Vec2 {
        self.spawns
            .get(&team)
            .copied()
            .unwrap_or_else(|| (self.bounds.min + self.bounds.max) * 0.5)
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }
}
