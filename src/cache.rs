//! Local fallback cache for the last confirmed number.
//!
//! Pre-seeds the document UI before any reservation exists. The cache is
//! advisory only — the authoritative number always comes from a live
//! reservation — so reads never fail (a broken cache reads as empty) and
//! write failures are reported but non-fatal.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors writing the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Device-local persistence of the last confirmed sequence number.
///
/// Never participates in uniqueness enforcement.
pub trait FallbackCache: Send + Sync {
    /// Last confirmed number, if any.
    fn get(&self) -> Option<u64>;

    /// Record a newly confirmed number.
    fn set(&self, sequence_number: u64) -> Result<(), CacheError>;
}

/// In-memory cache for tests and embedders with their own persistence.
#[derive(Default)]
pub struct MemoryCache {
    last: Mutex<Option<u64>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FallbackCache for MemoryCache {
    fn get(&self) -> Option<u64> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set(&self, sequence_number: u64) -> Result<(), CacheError> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(sequence_number);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CacheRecord {
    last_number: u64,
    updated_at: DateTime<Utc>,
}

/// File-backed cache: one small JSON record per device.
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FallbackCache for JsonFileCache {
    fn get(&self) -> Option<u64> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        let record: CacheRecord = serde_json::from_str(&text).ok()?;
        Some(record.last_number)
    }

    fn set(&self, sequence_number: u64) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = CacheRecord {
            last_number: sequence_number,
            updated_at: Utc::now(),
        };
        std::fs::write(&self.path, serde_json::to_string(&record)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get(), None);
        cache.set(33801).unwrap();
        assert_eq!(cache.get(), Some(33801));
    }

    #[test]
    fn file_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("last_number.json"));

        assert_eq!(cache.get(), None);
        cache.set(33801).unwrap();
        assert_eq!(cache.get(), Some(33801));

        // Overwrites, never appends.
        cache.set(33802).unwrap();
        assert_eq!(cache.get(), Some(33802));
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_number.json");
        std::fs::write(&path, "not json").unwrap();

        let cache = JsonFileCache::new(path);
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("nested/dir/last_number.json"));
        cache.set(7).unwrap();
        assert_eq!(cache.get(), Some(7));
    }
}
