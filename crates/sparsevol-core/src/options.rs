//! Configuration options for the grid pool.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration options for a [`GridPool`](crate::GridPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// When a loaded source is dropped from the pool.
    pub eviction: EvictionPolicy,

    /// When field voxel data is read from the file.
    pub materialization: Materialization,
}

impl PoolOptions {
    /// Parses options from a JSON document. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Sets the eviction policy.
    #[must_use]
    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    /// Sets the materialization mode.
    #[must_use]
    pub fn with_materialization(mut self, materialization: Materialization) -> Self {
        self.materialization = materialization;
        self
    }
}

/// Residency policy for loaded sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Keep every loaded source until the pool is cleared (default).
    #[default]
    Never,
    /// Drop a source as soon as its last consumer releases it.
    LastConsumer,
}

/// When voxel data is read from an opened source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Materialization {
    /// Read a field the first time it is requested (default).
    #[default]
    Lazy,
    /// Read every field while loading the source.
    Eager,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PoolOptions::default();
        assert_eq!(options.eviction, EvictionPolicy::Never);
        assert_eq!(options.materialization, Materialization::Lazy);
    }

    #[test]
    fn test_from_json_partial() {
        let options = PoolOptions::from_json(r#"{ "eviction": "last_consumer" }"#).unwrap();
        assert_eq!(options.eviction, EvictionPolicy::LastConsumer);
        assert_eq!(options.materialization, Materialization::Lazy);

        let options = PoolOptions::from_json("{}").unwrap();
        assert_eq!(options, PoolOptions::default());
    }

    #[test]
    fn test_from_json_rejects_unknown_policy() {
        assert!(PoolOptions::from_json(r#"{ "eviction": "lru" }"#).is_err());
    }
}
