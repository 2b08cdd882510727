//! # Skirmish Engine
//!
//! Host side of the Skirmish combat simulation.
//!
//! This crate provides:
//! - Archetype loading from versioned TOML with hot reload
//! - Engine and match configuration
//! - Tracing subscriber setup
//! - A headless match runner that pits bots against each other

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod archetype_loader;
pub mod config;
pub mod headless;
pub mod logging;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::archetype_loader::*;
    pub use crate::config::*;
    pub use crate::headless::*;
    pub use crate::logging::*;
}

pub use prelude::*;
