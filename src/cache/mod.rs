//! Response caching
//!
//! Raw response bodies are stored under a deterministic request key for as long
//! as the server declared them valid. The [`CacheStore`] trait is the backend
//! seam; [`CacheTransaction`] decides when a freshly fetched body is committed.

mod config;
mod file;
mod memory;
mod stats;
mod transaction;

pub use config::{CacheBackend, CacheConfig};
pub use file::{FileCache, FileEntry};
pub use memory::MemoryCache;
pub use stats::CacheStats;
pub use transaction::{scoped, CacheTransaction, ClassifyOutcome, CommitOutcome};

use anyhow::Result;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default cache directory relative to home directory
pub const DEFAULT_CACHE_DIR: &str = ".evegate/cache";

/// Key/value store for raw response bodies with per-entry TTL
///
/// Implementations must treat `ttl_secs <= 0` as already expired and must
/// lazily drop entries whose expiry has passed when they are read.
pub trait CacheStore: Send + Sync {
    /// Get a live entry
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value for `ttl_secs` seconds
    fn put(&self, key: &str, value: &[u8], ttl_secs: i64) -> Result<()>;

    /// Drop a single entry
    fn invalidate(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    /// Drop every entry
    fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats::new())
    }
}

/// Store used when caching is disabled; never holds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl CacheStore for NoCache {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn put(&self, _key: &str, _value: &[u8], _ttl_secs: i64) -> Result<()> {
        Ok(())
    }
}

/// Create a cache store for the given configuration
pub fn create_cache(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    if !config.enabled {
        return Ok(Arc::new(NoCache));
    }

    Ok(match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::File => Arc::new(FileCache::new(config.location.clone())?),
    })
}

/// Current time in Unix milliseconds
pub(crate) fn unix_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Expiry, in Unix milliseconds, of an entry stored now for `ttl_secs`
pub(crate) fn expires_after(ttl_secs: i64) -> i64 {
    unix_now_ms().saturating_add(ttl_secs.saturating_mul(1000))
}
