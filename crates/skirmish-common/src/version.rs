//! Version types for data table compatibility.

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Schema version using semantic versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version (breaking changes)
    pub major: u16,
    /// Minor version (backwards-compatible additions)
    pub minor: u16,
    /// Patch version (bug fixes)
    pub patch: u16,
}

impl SchemaVersion {
    /// Creates a new schema version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Current archetype table version.
    pub const ARCHETYPE_TABLE: Self = Self::new(1, 0, 0);

    /// Current engine config version.
    pub const ENGINE_CONFIG: Self = Self::new(1, 0, 0);

    /// Current combat event protocol version.
    pub const EVENT_BUS: Self = Self::new(1, 0, 0);

    /// Checks if this version is compatible with another version.
    /// Compatible means same major version and this minor >= other minor.
    #[must_use]
    pub const fn is_compatible_with(&self, other: &Self) -> bool {
        self.major == other.major && self.minor >= other.minor
    }

    /// Checks if this version can read data from another version.
    #[must_use]
    pub const fn can_read(&self, data_version: &Self) -> bool {
        self.major == data_version.major
    }

    /// Parses `major.minor.patch`; missing trailing parts default to zero.
    pub fn parse(text: &str) -> Result<Self, DataError> {
        let mut parts = [0u16; 3];
        let mut count = 0;
        for (slot, piece) in parts.iter_mut().zip(text.trim().split('.')) {
            *slot = piece
                .parse()
                .map_err(|_| DataError::BadVersion(text.to_string()))?;
            count += 1;
        }
        if count == 0 || text.trim().split('.').count() > 3 {
            return Err(DataError::BadVersion(text.to_string()));
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
