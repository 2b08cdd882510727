//! Engine configuration.
//!
//! Provides the match settings for a headless run: tick rate, match length,
//! seed, pool capacities, the arena layout, logging and the roster of
//! combatants. Configuration can be loaded from and saved to a TOML file.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use skirmish_common::{DataError, SchemaVersion};
use skirmish_gameplay::{ArenaSettings, Difficulty};

use crate::archetype_loader::DEFAULT_ARCHETYPE_PATH;

/// Configuration file name.
pub const CONFIG_FILE: &str = "skirmish.toml";

/// Errors raised by the strict loader.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read file.
    #[error("Failed to read config file: {0}")]
    Read(#[from] io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The version string is malformed.
    #[error("Bad config version: {0}")]
    BadVersion(#[from] DataError),

    /// The file was written for an incompatible schema.
    #[error("Config schema mismatch: reader {expected}, file {found}")]
    VersionMismatch {
        /// Version this build reads
        expected: SchemaVersion,
        /// Version declared by the file
        found: SchemaVersion,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Arena layout as ASCII rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// World units per tile
    pub tile_size: f32,
    /// `#` wall, `.` floor, digit = team spawn
    pub rows: Vec<String>,
}

impl Default for MapConfig {
    fn default() -> Self {
        let rows = [
            "####################",
            "#..................#",
            "#.0......##......1.#",
            "#........##........#",
            "#...##........##...#",
            "#........##........#",
            "#.0......##......1.#",
            "#..................#",
            "####################",
        ];
        Self {
            tile_size: 32.0,
            rows: rows.iter().map(|r| (*r).to_string()).collect(),
        }
    }
}

/// One entry of the match roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatantConfig {
    /// Archetype name
    pub archetype: String,
    /// Team number
    pub team: u8,
    /// Bot difficulty; `None` leaves the combatant idle for an external controller
    pub bot: Option<Difficulty>,
    /// Roster index of the bot's target; `None` picks the first opponent
    pub target: Option<usize>,
}

impl Default for CombatantConfig {
    fn default() -> Self {
        Self {
            archetype: skirmish_gameplay::NEUTRAL_ARCHETYPE.to_string(),
            team: 0,
            bot: None,
            target: None,
        }
    }
}

impl CombatantConfig {
    /// A bot-driven combatant.
    #[must_use]
    pub fn bot(archetype: impl Into<String>, team: u8, difficulty: Difficulty) -> Self {
        Self {
            archetype: archetype.into(),
            team,
            bot: Some(difficulty),
            target: None,
        }
    }
}

/// Engine configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Schema version of this file
    pub version: String,

    // === Simulation Settings ===
    /// Fixed tick length in milliseconds
    pub tick_ms: u64,
    /// Match length in simulated milliseconds
    pub match_length_ms: u64,
    /// Seed for every random roll in the match
    pub seed: u64,
    /// Maximum live projectiles
    pub projectile_capacity: usize,
    /// Event bus capacity
    pub event_capacity: usize,

    // === Data Settings ===
    /// Directory scanned for archetype files
    pub archetype_dir: String,
    /// Start from the built-in roster before applying files
    pub use_builtin_archetypes: bool,

    // === Logging Settings ===
    /// Log output format
    pub log_format: LogFormat,
    /// Filter directives, comma separated
    pub log_filter: String,
    /// Log every combat event at debug level
    pub trace_events: bool,

    // === Match Settings ===
    /// Arena layout
    pub map: MapConfig,
    /// Combatants in spawn order
    pub combatants: Vec<CombatantConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: SchemaVersion::ENGINE_CONFIG.to_string(),

            // Simulation
            tick_ms: 16,
            match_length_ms: 60_000,
            seed: 0x5EED,
            projectile_capacity: 256,
            event_capacity: 4096,

            // Data
            archetype_dir: DEFAULT_ARCHETYPE_PATH.to_string(),
            use_builtin_archetypes: true,

            // Logging
            log_format: LogFormat::Pretty,
            log_filter: "skirmish=info".to_string(),
            trace_events: false,

            // Match
            map: MapConfig::default(),
            combatants: vec![
                CombatantConfig::bot("striker", 0, Difficulty::Normal),
                CombatantConfig::bot("guardian", 1, Difficulty::Normal),
            ],
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file, falling back to defaults on any error.
    #[must_use]
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {e}");
                Self::default()
            },
        }
    }

    /// Load configuration from a file, reporting every failure.
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;

        let found = SchemaVersion::parse(&config.version)?;
        let expected = SchemaVersion::ENGINE_CONFIG;
        if !expected.can_read(&found) {
            return Err(ConfigError::VersionMismatch { expected, found });
        }

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Simulation
        self.tick_ms = self.tick_ms.clamp(1, 100);
        self.match_length_ms = self.match_length_ms.clamp(self.tick_ms, 3_600_000);
        self.projectile_capacity = self.projectile_capacity.clamp(1, 65_536);
        self.event_capacity = self.event_capacity.clamp(16, 1 << 20);

        // Map
        self.map.tile_size = self.map.tile_size.clamp(4.0, 256.0);

        if self.log_filter.trim().is_empty() {
            self.log_filter = "skirmish=info".to_string();
        }
    }

    /// Arena settings derived from this configuration.
    #[must_use]
    pub fn arena_settings(&self) -> ArenaSettings {
        ArenaSettings {
            projectile_capacity: self.projectile_capacity,
            event_capacity: self.event_capacity,
            seed: self.seed,
        }
    }

    /// Number of ticks a full match runs for.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.match_length_ms.div_ceil(self.tick_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_ms, 16);
        assert_eq!(config.combatants.len(), 2);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.map.rows.len(), 9);
        assert!(config.map.rows.iter().all(|r| r.len() == 20));
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.tick_ms = 0;
        config.match_length_ms = 0;
        config.projectile_capacity = 0;
        config.map.tile_size = -3.0;
        config.log_filter = "  ".to_string();

        config.validate();

        assert_eq!(config.tick_ms, 1);
        assert_eq!(config.match_length_ms, 1);
        assert_eq!(config.projectile_capacity, 1);
        assert!((config.map.tile_size - 4.0).abs() < f32::EPSILON);
        assert_eq!(config.log_filter, "skirmish=info");
    }

    #[test]
    fn test_total_ticks_rounds_up() {
        let mut config = EngineConfig::default();
        config.tick_ms = 16;
        config.match_length_ms = 1000;
        assert_eq!(config.total_ticks(), 63);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("skirmish.toml");

        let mut config = EngineConfig::default();
        config.seed = 12345;
        config.log_format = LogFormat::Json;
        config.combatants.push(CombatantConfig {
            archetype: "medic".to_string(),
            team: 0,
            bot: None,
            target: Some(1),
        });

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = EngineConfig::try_load_from(&config_path).expect("loads");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = EngineConfig::load_from("/nonexistent/path/skirmish.toml");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("skirmish.toml");
        fs::write(
            &path,
            r#"
                tick_ms = 33

                [[combatants]]
                archetype = "sniper"
                team = 2
                bot = "insane"
            "#,
        )
        .expect("write");

        let config = EngineConfig::try_load_from(&path).expect("loads");
        assert_eq!(config.tick_ms, 33);
        assert_eq!(config.match_length_ms, 60_000);
        assert_eq!(config.combatants.len(), 1);
        assert_eq!(config.combatants[0].bot, Some(Difficulty::Insane));
        assert_eq!(config.combatants[0].target, None);
    }

    #[test]
    fn test_strict_load_rejects_garbage() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("skirmish.toml");
        fs::write(&path, "tick_ms = \"fast\"").expect("write");

        assert!(matches!(
            EngineConfig::try_load_from(&path),
            Err(ConfigError::Parse(_))
        ));
        assert_eq!(EngineConfig::load_from(&path), EngineConfig::default());
    }

    #[test]
    fn test_strict_load_rejects_future_version() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("skirmish.toml");
        fs::write(&path, "version = \"3.1.0\"").expect("write");

        assert!(matches!(
            EngineConfig::try_load_from(&path),
            Err(ConfigError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../skirmish.toml");
        let config = EngineConfig::try_load_from(path).expect("shipped config is valid");
        assert!(!config.combatants.is_empty());
    }
}
