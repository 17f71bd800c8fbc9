//! Gateway configuration
//!
//! Read from `~/.evegate/config.toml` when present:
//!
//! ```toml
//! base_url = "https://api.eveonline.com"
//! timeout_secs = 30
//!
//! [credential]
//! key_id = "123456"
//! v_code = "..."
//!
//! [cache]
//! enabled = true
//! backend = "file"
//! location = "/var/cache/evegate"
//! ```

use crate::cache::CacheConfig;
use crate::request::Credential;
use crate::transport::DEFAULT_TIMEOUT_SECS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default API host
pub const DEFAULT_BASE_URL: &str = "https://api.eveonline.com";

/// Default config directory relative to home directory
pub const DEFAULT_CONFIG_DIR: &str = ".evegate";

/// Default config file name
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Scheme and host of the API, e.g. `https://api.eveonline.com`
    pub base_url: String,

    /// Credential merged into every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Optional User-Agent header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    pub cache: CacheConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credential: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
            cache: CacheConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Path of the default config file
    pub fn default_path() -> PathBuf {
        home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_CONFIG_DIR)
            .join(CONFIG_FILE)
    }

    /// Load `~/.evegate/config.toml`, falling back to defaults if it doesn't exist
    pub fn load_from_file() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load a config file; a missing file yields defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from file: {:?}", path))?;

        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Apply runtime overrides
    pub fn with_options(mut self, options: ConfigOptions) -> Self {
        if let Some(base_url) = options.base_url {
            self.base_url = base_url;
        }
        if let Some(credential) = options.credential {
            self.credential = Some(credential);
        }
        if let Some(enabled) = options.cache_enabled {
            self.cache.enabled = enabled;
        }
        if let Some(backend) = options.cache_backend {
            self.cache.backend = backend;
        }
        if let Some(location) = options.cache_location {
            self.cache.location = location;
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!("Invalid base URL: {}", self.base_url));
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than zero".to_string());
        }
        if let Some(credential) = &self.credential {
            credential.validate()?;
        }
        Ok(())
    }
}

/// Runtime options that override the loaded configuration
///
/// These are typically set via CLI flags like --no-cache or --base-url.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub base_url: Option<String>,
    pub credential: Option<Credential>,
    pub cache_enabled: Option<bool>,
    pub cache_backend: Option<crate::cache::CacheBackend>,
    pub cache_location: Option<PathBuf>,
}

impl ConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    pub fn with_cache_backend(mut self, backend: crate::cache::CacheBackend) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Use a file-backed cache at `location`
    pub fn with_cache_dir(mut self, location: PathBuf) -> Self {
        self.cache_backend = Some(crate::cache::CacheBackend::File);
        self.cache_location = Some(location);
        self
    }
}

/// Get the home directory
pub(crate) fn home_dir() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("HOME") {
        return Some(PathBuf::from(home));
    }

    #[cfg(windows)]
    {
        if let Some(user_profile) = std::env::var_os("USERPROFILE") {
            return Some(PathBuf::from(user_profile));
        }
    }

    None
}
