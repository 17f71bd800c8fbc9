//! Cache configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which store backs the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local map, lost on exit
    #[default]
    Memory,
    /// One JSON file per entry under `location`
    File,
}

impl std::str::FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "file" => Ok(CacheBackend::File),
            _ => anyhow::bail!("Invalid cache backend: {}. Valid values: memory, file", s),
        }
    }
}

/// Cache configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,

    /// Storage backend
    pub backend: CacheBackend,

    /// Cache directory path (file backend only)
    pub location: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::default(),
            location: crate::config::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(super::DEFAULT_CACHE_DIR),
        }
    }
}

impl CacheConfig {
    pub fn new(enabled: bool, backend: CacheBackend, location: PathBuf) -> Self {
        Self {
            enabled,
            backend,
            location,
        }
    }
}
