//! Persistent chain-data cache with TTL and an offline read path.
//!
//! # File format
//! ```text
//! { "cache": { key: value, ... }, "timestamps": { key: epochSeconds, ... } }
//! ```
//!
//! A missing or corrupt file is an empty cache. Read and write failures are
//! logged and never reach the caller. The whole map is rewritten on every
//! `set` through a temp file and an atomic rename, with in-process writes
//! serialized. There is no cross-process locking: the last writer's snapshot
//! wins.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::chain::types::Network;
use crate::observability::metrics;

/// Entry kinds stored by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Balance,
    Utxos,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Balance => "balance",
            CacheKind::Utxos => "utxos",
        }
    }
}

/// Compose the `{kind}_{network}_{address}` key.
pub fn cache_key(kind: CacheKind, network: Network, address: &str) -> String {
    format!("{}_{}_{}", kind.as_str(), network.as_str(), address)
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    timestamp: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    cache: HashMap<String, Value>,
    #[serde(default)]
    timestamps: HashMap<String, f64>,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Key → JSON value store persisted to a single file.
#[derive(Clone)]
pub struct BlockchainCache {
    inner: Arc<DashMap<String, Entry>>,
    path: Option<PathBuf>,
    ttl: Duration,
    write_lock: Arc<Mutex<()>>,
}

impl BlockchainCache {
    /// Create an in-memory cache that never touches disk.
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            path: None,
            ttl,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Open the cache at `path`, loading any existing contents.
    ///
    /// The parent directory is created if needed. Never fails: problems are
    /// logged and the cache starts empty.
    pub fn open(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if let Err(e) = fs::create_dir_all(dir) {
                tracing::error!(dir = %dir.display(), error = %e, "Failed to create cache directory");
            }
        }

        let cache = Self {
            inner: Arc::new(DashMap::new()),
            path: Some(path),
            ttl,
            write_lock: Arc::new(Mutex::new(())),
        };
        cache.load();
        cache
    }

    /// Replace the in-memory contents with what is on disk.
    pub fn load(&self) {
        let Some(path) = &self.path else { return };
        if !path.exists() {
            return;
        }

        match read_file(path) {
            Ok(file) => {
                self.inner.clear();
                for (key, value) in file.cache {
                    let timestamp = file.timestamps.get(&key).copied().unwrap_or(0.0);
                    self.inner.insert(key, Entry { value, timestamp });
                }
                metrics::record_cache_size(self.inner.len());
                tracing::info!(entries = self.inner.len(), path = %path.display(), "Loaded cache from disk");
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to load cache, starting empty");
            }
        }
    }

    /// Write the whole store to disk. Best effort.
    pub fn flush(&self) {
        let Some(path) = &self.path else { return };
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut file = CacheFile::default();
        for r in self.inner.iter() {
            file.cache.insert(r.key().clone(), r.value().value.clone());
            file.timestamps.insert(r.key().clone(), r.value().timestamp);
        }

        match write_file(path, &file) {
            Ok(()) => tracing::debug!(entries = file.cache.len(), "Saved cache to disk"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to save cache"),
        }
    }

    /// Read a value.
    ///
    /// With `ignore_ttl` the value is returned however old it is.
    pub fn get(&self, key: &str, ignore_ttl: bool) -> Option<Value> {
        let entry = self.inner.get(key)?;
        if ignore_ttl || now_secs() - entry.timestamp < self.ttl.as_secs_f64() {
            Some(entry.value.clone())
        } else {
            tracing::debug!(key, "Cache entry expired");
            None
        }
    }

    /// Read and deserialize a value; a value of the wrong shape is a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str, ignore_ttl: bool) -> Option<T> {
        let value = self.get(key, ignore_ttl)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring cache entry with unexpected shape");
                None
            }
        }
    }

    /// Store a value with the current timestamp and persist the store.
    pub fn set(&self, key: &str, value: Value) {
        self.insert_at(key, value, now_secs());
        self.flush();
    }

    /// Serialize and store a value.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json),
            Err(e) => tracing::error!(key, error = %e, "Failed to serialize cache value"),
        }
    }

    fn insert_at(&self, key: &str, value: Value, timestamp: f64) {
        self.inner.insert(key.to_string(), Entry { value, timestamp });
        metrics::record_cache_size(self.inner.len());
    }

    /// Whether a key was ever set.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Freshness window enforced by `get`.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Backing file, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl std::fmt::Debug for BlockchainCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainCache")
            .field("path", &self.path)
            .field("ttl", &self.ttl)
            .field("entries", &self.inner.len())
            .finish()
    }
}

fn read_file(path: &Path) -> std::io::Result<CacheFile> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

fn write_file(path: &Path, contents: &CacheFile) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, contents)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
