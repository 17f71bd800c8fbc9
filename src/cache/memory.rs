//! In-memory cache store

use super::stats::CacheStats;
use super::{expires_after, unix_now_ms, CacheStore};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    /// Unix milliseconds
    expires_at: i64,
}

impl MemoryEntry {
    fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Process-local cache; the default backend
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    stats: RwLock<CacheStats>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, hit: bool) {
        if let Ok(mut stats) = self.stats.write() {
            if hit {
                stats.record_hit();
            } else {
                stats.record_miss();
            }
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("memory cache lock poisoned")
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // Write lock so the expiry check and the delete are one step.
        let mut entries = self.entries.write().map_err(poisoned)?;
        let now = unix_now_ms();

        let value = match entries.get(key).map(|entry| entry.is_expired(now)) {
            Some(true) => {
                debug!("Cache entry expired: {}", key);
                entries.remove(key);
                None
            }
            Some(false) => entries.get(key).map(|entry| entry.value.clone()),
            None => None,
        };
        drop(entries);

        self.record(value.is_some());
        Ok(value)
    }

    fn put(&self, key: &str, value: &[u8], ttl_secs: i64) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;

        if ttl_secs <= 0 {
            debug!("Dropping already-expired cache entry: {}", key);
            entries.remove(key);
            return Ok(());
        }

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_vec(),
                expires_at: expires_after(ttl_secs),
            },
        );
        debug!("Cached {} bytes for {}s: {}", value.len(), ttl_secs, key);
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        self.entries.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().map_err(poisoned)?.clear();
        if let Ok(mut stats) = self.stats.write() {
            *stats = CacheStats::new();
        }
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats> {
        let now = unix_now_ms();
        let mut stats = self.stats.read().map_err(poisoned)?.clone();

        let entries = self.entries.read().map_err(poisoned)?;
        for entry in entries.values().filter(|e| !e.is_expired(now)) {
            stats.total_entries += 1;
            stats.total_size += entry.value.len() as u64;
        }

        Ok(stats)
    }
}
