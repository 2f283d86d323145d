use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use signal_core::{Clock, Symbol, SystemClock, Timestamp};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ensure_dir, json_files, write_json_atomic, StoreError};

/// Roughly a century; longer TTLs are clamped
const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 3600;

/// Configuration for the response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            default_ttl_seconds: 3600,
        }
    }
}

/// Logical identity of a cached response
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub text: String,
    pub namespace: Option<String>,
}

impl CacheKey {
    /// Key for a free-form prompt, optionally scoped to a template
    pub fn prompt(prompt: impl Into<String>, template: Option<&str>) -> Self {
        Self {
            text: prompt.into(),
            namespace: template.map(str::to_string),
        }
    }

    /// Key for a symbol's latest record
    pub fn symbol(symbol: &Symbol) -> Self {
        Self {
            text: symbol.cache_key(),
            namespace: None,
        }
    }

    /// Stable hex digest used as the entry's file name
    pub fn fingerprint(&self) -> String {
        let material = format!(
            "{}:{}",
            self.text,
            self.namespace.as_deref().unwrap_or("default")
        );
        hex::encode(Sha256::digest(material.as_bytes()))
    }
}

/// On-disk entry, one file per key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    pub response: Value,
    pub created_at: Timestamp,
    pub expires: Timestamp,
    pub ttl: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size: u64,
    pub expired_files: usize,
    pub active_files: usize,
}

/// File-backed response cache with per-entry TTL.
///
/// No index is held in memory: every lookup reads the entry file. Reads
/// self-heal by deleting expired or unparseable entries. Concurrent writers
/// to one key are last-writer-wins.
pub struct ResponseCache {
    dir: PathBuf,
    default_ttl_seconds: u64,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Open (creating if needed) a cache directory
    pub fn new(config: CacheConfig) -> Result<Self, StoreError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        ensure_dir(&config.dir)?;

        tracing::info!(
            "Response cache ready: dir={}, default_ttl={}s",
            config.dir.display(),
            config.default_ttl_seconds
        );

        Ok(Self {
            dir: config.dir,
            default_ttl_seconds: config.default_ttl_seconds,
            clock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn default_ttl_seconds(&self) -> u64 {
        self.default_ttl_seconds
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.fingerprint()))
    }

    /// Live payload for `key`, or `None` on miss, expiry or corruption
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let path = self.path_for(key);
        let fingerprint = key.fingerprint();

        let entry = match read_entry(&path) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!("Cache miss: {}", fingerprint);
                return None;
            }
            Err(e) => {
                tracing::warn!("Discarding unreadable cache entry {}: {}", fingerprint, e);
                remove_quietly(&path);
                return None;
            }
        };

        if entry.is_expired(self.clock.now()) {
            tracing::info!("Cache entry expired: {}", fingerprint);
            remove_quietly(&path);
            return None;
        }

        tracing::debug!("Cache hit: {}", fingerprint);
        Some(entry.response)
    }

    /// Typed variant of [`get`](Self::get). A payload that does not fit `T`
    /// is reported as a miss and left in place.
    pub fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                tracing::warn!("Cached payload has unexpected shape: {}", e);
                None
            }
        }
    }

    /// Store `payload` under `key`, replacing any previous entry.
    ///
    /// Returns `false` on I/O failure; the failure is logged and callers
    /// carry on uncached.
    pub fn set(&self, key: &CacheKey, payload: &Value, ttl_seconds: Option<u64>) -> bool {
        let ttl = ttl_seconds
            .unwrap_or(self.default_ttl_seconds)
            .min(MAX_TTL_SECONDS);
        let created_at = self.clock.now();
        let expires = created_at
            .checked_add_signed(Duration::seconds(ttl as i64))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let entry = CacheEntry {
            prompt: Some(key.text.clone()),
            template: key.namespace.clone(),
            response: payload.clone(),
            created_at,
            expires,
            ttl,
        };

        let path = self.path_for(key);
        match write_json_atomic(&path, &entry) {
            Ok(()) => {
                tracing::info!("Cached {} (ttl {}s)", key.fingerprint(), ttl);
                true
            }
            Err(e) => {
                tracing::error!("Cache write failed: {}", e);
                false
            }
        }
    }

    /// Remove the entry for `key`. `false` if there was nothing to remove.
    pub fn delete(&self, key: &CacheKey) -> bool {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Deleted cache entry {}", key.fingerprint());
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                tracing::error!("Cache delete failed for {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Delete every expired or unparseable entry; returns how many went
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut cleared = 0;

        for path in self.entry_files() {
            let stale = match read_entry(&path) {
                Ok(Some(entry)) => entry.is_expired(now),
                Ok(None) => false,
                Err(_) => true,
            };

            if stale && fs::remove_file(&path).is_ok() {
                cleared += 1;
            }
        }

        tracing::info!("Cleared {} expired cache entries", cleared);
        cleared
    }

    /// Delete every entry
    pub fn clear_all(&self) -> bool {
        let mut ok = true;
        for path in self.entry_files() {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    tracing::error!("Failed to remove {}: {}", path.display(), e);
                    ok = false;
                }
            }
        }

        if ok {
            tracing::info!("Cleared all cache entries");
        }
        ok
    }

    /// Read-only scan. Unparseable entries count as expired.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let mut stats = CacheStats::default();

        for path in self.entry_files() {
            stats.total_files += 1;
            stats.total_size += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

            match read_entry(&path) {
                Ok(Some(entry)) if !entry.is_expired(now) => stats.active_files += 1,
                Ok(None) => stats.total_files -= 1,
                _ => stats.expired_files += 1,
            }
        }

        stats
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        match json_files(&self.dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::error!("Cannot list cache directory: {}", e);
                Vec::new()
            }
        }
    }
}

/// `Ok(None)` when the file does not exist
fn read_entry(path: &Path) -> Result<Option<CacheEntry>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::json(path, e))
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
