//! # Skirmish Common
//!
//! Common types, utilities, and shared abstractions for the Skirmish
//! combat simulation.
//!
//! This crate provides foundational types used across all subsystems:
//! - ID types (EntityId, ProjectileId, HazardId, TeamId)
//! - The monotonic simulation clock
//! - 2D geometry helpers (distances, cones, trajectories, falloff)
//! - Version information for data tables
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod clock;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::error::*;
    pub use crate::geometry::*;
    pub use crate::ids::*;
    pub use crate::version::*;
    /// Re-exported so downstream crates agree on one vector type.
    pub use glam::Vec2;
}

pub use prelude::*;
