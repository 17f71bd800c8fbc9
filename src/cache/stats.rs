//! Cache statistics

use serde::{Deserialize, Serialize};

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of live entries
    pub total_entries: usize,

    /// Total size of stored bodies in bytes
    pub total_size: u64,

    /// Number of cache hits since startup
    pub hits: u64,

    /// Number of cache misses since startup
    pub misses: u64,

    /// Cache hit rate (0.0 to 1.0)
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self {
            total_entries: 0,
            total_size: 0,
            hits: 0,
            misses: 0,
            hit_rate: 0.0,
        }
    }

    /// Calculate hit rate from hits and misses
    pub fn calculate_hit_rate(&mut self) {
        let total = self.hits + self.misses;
        self.hit_rate = if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        };
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
        self.calculate_hit_rate();
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
        self.calculate_hit_rate();
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}
