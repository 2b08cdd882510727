//! Archetype data loading.
//!
//! This module provides:
//! - Loading archetypes from assets/archetypes/*.toml
//! - Schema version checks and per-entry validation on load
//! - Hot-reload support for tuning sessions
//! - Merging loaded files over the built-in roster

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use skirmish_common::{DataError, SchemaVersion};
use skirmish_gameplay::{ArchetypeError, ArchetypeProfile, ArchetypeTable};

/// Default asset path for archetype files.
pub const DEFAULT_ARCHETYPE_PATH: &str = "assets/archetypes";

/// Errors that can occur during archetype loading.
#[derive(Debug, Error)]
pub enum ArchetypeLoadError {
    /// File not found.
    #[error("Archetype file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read file.
    #[error("Failed to read archetype file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse archetype TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The version string is malformed.
    #[error("Bad archetype file version: {0}")]
    BadVersion(#[from] DataError),

    /// The file was written for an incompatible schema.
    #[error("Archetype schema mismatch: reader {expected}, file {found}")]
    VersionMismatch {
        /// Version this build reads
        expected: SchemaVersion,
        /// Version declared by the file
        found: SchemaVersion,
    },

    /// An entry failed validation or clashes with an earlier one.
    #[error(transparent)]
    Invalid(#[from] ArchetypeError),
}

/// Result type for archetype loading operations.
pub type ArchetypeLoadResult<T> = Result<T, ArchetypeLoadError>;

/// A collection of archetypes from a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeFile {
    /// File format version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Archetypes in this file.
    #[serde(default)]
    pub archetypes: Vec<ArchetypeProfile>,
}

fn default_version() -> String {
    SchemaVersion::ARCHETYPE_TABLE.to_string()
}

impl ArchetypeFile {
    /// Checks the declared version and turns the entries into a table.
    ///
    /// Fails on the first invalid or duplicated entry, so a bad file adds
    /// nothing.
    pub fn into_table(self) -> ArchetypeLoadResult<ArchetypeTable> {
        let found = SchemaVersion::parse(&self.version)?;
        let expected = SchemaVersion::ARCHETYPE_TABLE;
        if !expected.can_read(&found) {
            return Err(ArchetypeLoadError::VersionMismatch { expected, found });
        }

        let mut table = ArchetypeTable::new();
        for profile in self.archetypes {
            table.register(profile)?;
        }
        Ok(table)
    }
}

/// Archetype loader with hot-reload support.
pub struct ArchetypeLoader {
    /// Base path for archetype files.
    base_path: PathBuf,
    /// Profiles loaded from disk.
    table: ArchetypeTable,
    /// File modification times for hot-reload.
    file_times: HashMap<PathBuf, SystemTime>,
    /// Whether hot-reload is enabled.
    hot_reload_enabled: bool,
}

impl ArchetypeLoader {
    /// Creates a new archetype loader.
    #[must_use]
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            table: ArchetypeTable::new(),
            file_times: HashMap::new(),
            hot_reload_enabled: true,
        }
    }

    /// Creates an archetype loader with the default path.
    #[must_use]
    pub fn with_default_path() -> Self {
        Self::new(DEFAULT_ARCHETYPE_PATH)
    }

    /// Directory scanned by [`Self::load_all`].
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Profiles loaded so far.
    #[must_use]
    pub fn table(&self) -> &ArchetypeTable {
        &self.table
    }

    /// Enables or disables hot-reload.
    pub fn set_hot_reload(&mut self, enabled: bool) {
        self.hot_reload_enabled = enabled;
    }

    /// Builds the table a match should use.
    ///
    /// With `include_builtin`, loaded profiles replace built-in ones of the
    /// same name.
    #[must_use]
    pub fn build_table(&self, include_builtin: bool) -> ArchetypeTable {
        let mut table = if include_builtin {
            ArchetypeTable::builtin()
        } else {
            ArchetypeTable::new()
        };
        table.merge(self.table.clone());
        table
    }

    /// Loads every `.toml` file under the base path.
    ///
    /// A missing directory yields zero profiles. A file that fails to load
    /// is skipped with a warning.
    pub fn load_all(&mut self) -> ArchetypeLoadResult<usize> {
        let path = &self.base_path;
        if !path.exists() {
            info!(path = %path.display(), "archetype path does not exist, using built-ins only");
            return Ok(0);
        }

        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        files.sort();

        let mut count = 0;
        for file_path in files {
            match self.load_file(&file_path) {
                Ok(n) => {
                    count += n;
                    debug!(path = %file_path.display(), count = n, "loaded archetype file");
                },
                Err(e) => {
                    warn!(path = %file_path.display(), error = %e, "failed to load archetype file");
                },
            }
        }

        info!(count, "archetypes loaded");
        Ok(count)
    }

    /// Loads archetypes from a single file.
    pub fn load_file(&mut self, path: &Path) -> ArchetypeLoadResult<usize> {
        if !path.exists() {
            return Err(ArchetypeLoadError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;

        if let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) {
            self.file_times.insert(path.to_path_buf(), modified);
        }

        self.load_str(&content)
    }

    /// Loads archetypes from TOML text.
    pub fn load_str(&mut self, content: &str) -> ArchetypeLoadResult<usize> {
        let file: ArchetypeFile = toml::from_str(content)?;
        let staged = file.into_table()?;

        if let Some(clash) = staged.iter().find(|p| self.table.get(&p.name).is_some()) {
            return Err(ArchetypeError::Duplicate(clash.name.clone()).into());
        }

        let count = staged.len();
        self.table.merge(staged);
        Ok(count)
    }

    /// Checks for file changes and reloads if necessary.
    pub fn check_hot_reload(&mut self) -> ArchetypeLoadResult<bool> {
        if !self.hot_reload_enabled {
            return Ok(false);
        }

        let changed = self.file_times.iter().any(|(path, last_time)| {
            fs::metadata(path)
                .and_then(|m| m.modified())
                .is_ok_and(|modified| modified > *last_time)
        });

        if changed {
            info!("archetype files changed, reloading");
            self.reload()?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Drops everything loaded and rescans the base path.
    pub fn reload(&mut self) -> ArchetypeLoadResult<usize> {
        self.table = ArchetypeTable::new();
        self.file_times.clear();
        self.load_all()
    }
}
