//! # Skirmish Gameplay
//!
//! The combat core of the Skirmish arena simulation.
//!
//! This crate provides:
//! - Combat entities with health, cooldowns, ultimate charge and status effects
//! - Weapon profiles and the projectile resolver (linear, lobbed, spread cone)
//! - Data-driven skill and ultimate resolution
//! - Placed hazards (bombs, mines, heal fields)
//! - The bot decision engine
//! - Archetype tables
//! - The map collaborator trait with tile and open-field maps
//! - Event bus for presentation layers
//! - The [`Arena`] tick driver tying it all together

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ai;
pub mod archetype;
pub mod arena;
pub mod cooldown;
pub mod effects;
pub mod entity;
pub mod events;
pub mod hazard;
pub mod map;
pub mod projectile;
pub mod random;
pub mod roster;
pub mod skills;
pub mod weapon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ai::*;
    pub use crate::archetype::*;
    pub use crate::arena::*;
    pub use crate::cooldown::*;
    pub use crate::effects::*;
    pub use crate::entity::*;
    pub use crate::events::*;
    pub use crate::hazard::*;
    pub use crate::map::*;
    pub use crate::projectile::*;
    pub use crate::random::*;
    pub use crate::roster::*;
    pub use crate::skills::*;
    pub use crate::weapon::*;
}

pub use prelude::*;
