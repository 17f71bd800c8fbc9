//! Filesystem cache store
//!
//! Each entry is a JSON file named after the SHA-256 of its key, so keys
//! survive process restarts and never collide on disk. Entries are written to
//! a temporary file and renamed into place, so readers never see partial JSON.

use super::stats::CacheStats;
use super::{expires_after, unix_now_ms, CacheStore};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// On-disk cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// The cache key this entry was stored under
    pub key: String,

    /// Base64-encoded response body
    pub body: String,

    /// When the entry was written (Unix milliseconds)
    pub stored_at_ms: i64,

    /// When the entry expires (Unix milliseconds)
    pub expires_at_ms: i64,
}

impl FileEntry {
    pub fn new(key: &str, value: &[u8], ttl_secs: i64) -> Self {
        Self {
            key: key.to_string(),
            body: STANDARD.encode(value),
            stored_at_ms: unix_now_ms(),
            expires_at_ms: expires_after(ttl_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        unix_now_ms() >= self.expires_at_ms
    }

    pub fn decode_body(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.body)
            .with_context(|| format!("Corrupt cache body for key: {}", self.key))
    }
}

/// Persistent cache store rooted at a directory
pub struct FileCache {
    cache_dir: PathBuf,

    // Serializes load/expire/delete and writes within this process
    io_lock: Mutex<()>,

    // In-memory stats tracking
    stats: RwLock<CacheStats>,
}

impl FileCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)
                .with_context(|| format!("Failed to create cache directory: {:?}", cache_dir))?;
            info!("Created cache directory: {:?}", cache_dir);
        }

        Ok(Self {
            cache_dir,
            io_lock: Mutex::new(()),
            stats: RwLock::new(CacheStats::new()),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.io_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("file cache lock poisoned"))
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.cache_dir.join(format!("{:x}.json", digest))
    }

    fn load_entry(&self, path: &Path) -> Result<Option<FileEntry>> {
        if !path.exists() {
            return Ok(None);
        }

        let file =
            File::open(path).with_context(|| format!("Failed to open cache file: {:?}", path))?;
        let entry: FileEntry = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse cache file: {:?}", path))?;

        Ok(Some(entry))
    }

    fn save_entry(&self, path: &Path, entry: &FileEntry) -> Result<()> {
        let tmp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));

        if let Err(e) = write_json(&tmp_path, entry) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move cache file into place: {:?}", path))?;

        debug!("Saved cache entry: {}", entry.key);
        Ok(())
    }

    fn delete_entry(&self, path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove cache file: {:?}", path))?;
            debug!("Deleted cache file: {:?}", path);
        }
        Ok(())
    }

    fn json_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.cache_dir)
            .with_context(|| format!("Failed to read cache directory: {:?}", self.cache_dir))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        Ok(paths)
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

fn write_json(path: &Path, entry: &FileEntry) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create cache file: {:?}", path))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, entry)
        .with_context(|| format!("Failed to write cache file: {:?}", path))?;

    let file = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("Failed to flush cache file: {:?}", path))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync cache file: {:?}", path))?;
    Ok(())
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.cache_path(key);
        let guard = self.lock()?;

        let value = match self.load_entry(&path) {
            Ok(Some(entry)) if entry.is_expired() => {
                debug!("Cache entry expired: {}", key);
                self.delete_entry(&path)?;
                None
            }
            Ok(Some(entry)) => Some(entry.decode_body()?),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to load cache entry: {}", e);
                None
            }
        };
        drop(guard);

        self.record(value.is_some());
        Ok(value)
    }

    fn put(&self, key: &str, value: &[u8], ttl_secs: i64) -> Result<()> {
        let path = self.cache_path(key);
        let _guard = self.lock()?;

        if ttl_secs <= 0 {
            return self.delete_entry(&path);
        }

        self.save_entry(&path, &FileEntry::new(key, value, ttl_secs))
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        let _guard = self.lock()?;
        self.delete_entry(&self.cache_path(key))
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock()?;
        for path in self.json_files()? {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove cache file: {:?}", path))?;
        }

        info!("Cleared all cache entries in {:?}", self.cache_dir);

        if let Ok(mut stats) = self.stats.write() {
            *stats = CacheStats::new();
        }
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::new();
        let guard = self.lock()?;

        for path in self.json_files()? {
            match self.load_entry(&path) {
                Ok(Some(entry)) if entry.is_expired() => {
                    let _ = self.delete_entry(&path);
                }
                Ok(Some(_)) => {
                    stats.total_entries += 1;
                    stats.total_size += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                }
                _ => {}
            }
        }
        drop(guard);

        if let Ok(memory_stats) = self.stats.read() {
            stats.hits = memory_stats.hits;
            stats.misses = memory_stats.misses;
            stats.calculate_hit_rate();
        }

        Ok(stats)
    }
}
