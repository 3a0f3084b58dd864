//! File-backed JSON cache.
//!
//! One file per key, holding `{"timestamp": <epoch seconds>, "data": ...}`.
//! Expired entries stay on disk until the next `clear`. A record older than
//! the caller's max age, a missing file and an unreadable file all read as a miss.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    pub timestamp: f64,
    pub data: T,
}

#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub fn save<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
        let record = CacheRecord {
            timestamp: now_secs(),
            data,
        };
        let json = serde_json::to_vec(&record).context("Failed to serialize cache record")?;
        write_atomic(&self.path_for(key), &json)
            .with_context(|| format!("Failed to write cache entry {}", key))
    }

    /// The stored record regardless of age, or `None` on a miss.
    pub fn load_record<T: DeserializeOwned>(&self, key: &str) -> Option<CacheRecord<T>> {
        let path = self.path_for(key);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(_) => return None,
        };
        match serde_json::from_slice(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// The cached value if it is at most `max_age` old.
    pub fn load<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let record = self.load_record::<T>(key)?;
        if now_secs() - record.timestamp > max_age.as_secs_f64() {
            info!("Cache expired for key: {}", key);
            return None;
        }
        debug!("Cache hit for key: {}", key);
        Some(record.data)
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir).context("Failed to read cache directory")? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove cache entry {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Stable key for any serializable parameter set.
///
/// `serde_json` maps keep their keys sorted, so equal parameters give equal keys.
pub fn cache_key<T: Serialize + ?Sized>(params: &T) -> String {
    let canonical = serde_json::to_value(params)
        .map(|value| value.to_string())
        .unwrap_or_default();
    content_hash(canonical.as_bytes())
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Write through a temp file in the same directory, then rename into place.
/// Readers see either no file or the complete file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("No parent directory for {}", path.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes).context("Failed to write temp file")?;
    tmp.as_file().sync_all().context("Failed to flush temp file")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move temp file to {}", path.display()))?;
    Ok(())
}

pub(crate) fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> (tempfile::TempDir, FileCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_save_then_load() {
        let (_dir, cache) = cache();
        cache.save("k", &vec!["a", "b"]).unwrap();
        let loaded: Option<Vec<String>> = cache.load("k", Duration::from_secs(60));
        assert_eq!(loaded, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_record_shape_on_disk() {
        let (_dir, cache) = cache();
        cache.save("shape", &json!({"x": 1})).unwrap();
        let raw = fs::read_to_string(cache.dir().join("shape.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["timestamp"].as_f64().unwrap() > 0.0);
        assert_eq!(value["data"]["x"], 1);
    }

    #[test]
    fn test_missing_key_is_miss() {
        let (_dir, cache) = cache();
        let loaded: Option<String> = cache.load("absent", Duration::from_secs(60));
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_file_is_miss() {
        let (_dir, cache) = cache();
        fs::write(cache.dir().join("bad.json"), "{not json").unwrap();
        let loaded: Option<String> = cache.load("bad", Duration::from_secs(60));
        assert!(loaded.is_none());
    }

    #[test]
    fn test_expired_entry_is_miss_but_kept() {
        let (_dir, cache) = cache();
        let stale = json!({"timestamp": now_secs() - 120.0, "data": "old"});
        fs::write(cache.dir().join("stale.json"), stale.to_string()).unwrap();

        let loaded: Option<String> = cache.load("stale", Duration::from_secs(60));
        assert!(loaded.is_none());
        assert!(cache.dir().join("stale.json").exists());

        let loaded: Option<String> = cache.load("stale", Duration::from_secs(300));
        assert_eq!(loaded.as_deref(), Some("old"));
    }

    #[test]
    fn test_cache_key_ignores_field_order() {
        let a = json!({"max": 3, "sources": ["NPR"]});
        let b = json!({"sources": ["NPR"], "max": 3});
        assert_eq!(cache_key(&a), cache_key(&b));
        assert_ne!(cache_key(&a), cache_key(&json!({"max": 4, "sources": ["NPR"]})));
        assert_eq!(cache_key(&a).len(), 64);
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let (_dir, cache) = cache();
        let target = cache.dir().join("blob.bin");
        write_atomic(&target, b"data").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"data");
        assert_eq!(fs::read_dir(cache.dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_clear_removes_entries() {
        let (_dir, cache) = cache();
        cache.save("a", &1).unwrap();
        cache.save("b", &2).unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.load::<i32>("a", Duration::from_secs(60)).is_none());
        assert_eq!(fs::read_dir(cache.dir()).unwrap().count(), 0);
    }
}
