//! Client-local cache of the last known active shift.
//!
//! The cache is advisory. It mirrors the last online observation and is
//! read only while the till is offline; the store is authoritative as soon
//! as connectivity returns (see [`crate::services::reconcile`]).
//!
//! Entries are JSON. Anything that fails to parse is a miss, never an error,
//! so a half-written or hand-edited cache file cannot wedge a till.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use fuel_station_core::EmployeeId;

use crate::models::Shift;

/// Errors writing to the cache. Reads never fail.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Cache slot for an active shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The one open shift of the whole station, whoever owns it.
    SystemWide,
    /// The open shift owned by one employee.
    Employee(EmployeeId),
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SystemWide => write!(f, "active_shift:system"),
            Self::Employee(id) => write!(f, "active_shift:employee:{id}"),
        }
    }
}

/// Snapshot of an open shift as last seen online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedActiveShift {
    pub shift: Shift,
    pub cached_at: DateTime<Utc>,
}

impl CachedActiveShift {
    /// Snapshot `shift` now.
    #[must_use]
    pub fn now(shift: Shift) -> Self {
        Self {
            shift,
            cached_at: Utc::now(),
        }
    }
}

/// Key/value cache for active-shift snapshots.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Read a snapshot. Missing or unparsable entries are `None`.
    async fn get(&self, key: &CacheKey) -> Option<CachedActiveShift>;

    /// Write a snapshot of `shift` under `key`.
    async fn set(&self, key: &CacheKey, shift: &Shift) -> Result<(), CacheError>;

    /// Remove the entry under `key`.
    async fn clear(&self, key: &CacheKey) -> Result<(), CacheError>;
}

fn decode(key: &CacheKey, raw: &str) -> Option<CachedActiveShift> {
    match serde_json::from_str(raw) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(key = %key, error = %e, "Ignoring malformed cache entry");
            None
        }
    }
}

// =============================================================================
// MemoryCache
// =============================================================================

/// In-process cache. Lost on restart.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, String>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(256)
                .time_to_idle(Duration::from_secs(60 * 60 * 24))
                .build(),
        }
    }

    /// Store a raw string under `key`, bypassing serialization.
    pub async fn insert_raw(&self, key: &CacheKey, raw: impl Into<String>) {
        self.entries.insert(key.to_string(), raw.into()).await;
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<CachedActiveShift> {
        let raw = self.entries.get(&key.to_string()).await?;
        decode(key, &raw)
    }

    async fn set(&self, key: &CacheKey, shift: &Shift) -> Result<(), CacheError> {
        let raw = serde_json::to_string(&CachedActiveShift::now(shift.clone()))?;
        self.entries.insert(key.to_string(), raw).await;
        Ok(())
    }

    async fn clear(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.entries.invalidate(&key.to_string()).await;
        Ok(())
    }
}

// =============================================================================
// FileCache
// =============================================================================

/// Cache persisted as one JSON document on the till's disk.
///
/// Writes go to a sibling `.tmp` file and are renamed into place, so a crash
/// mid-write leaves the previous document intact.
pub struct FileCache {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

type Document = HashMap<String, serde_json::Value>;

impl FileCache {
    /// Cache stored at `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Location of the cache document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Document {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Document::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read shift cache");
                return Document::new();
            }
        };

        serde_json::from_slice(&data).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Shift cache is malformed, starting empty");
            Document::new()
        })
    }

    async fn save(&self, document: &Document) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let payload = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, payload).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl LocalCache for FileCache {
    async fn get(&self, key: &CacheKey) -> Option<CachedActiveShift> {
        let mut document = self.load().await;
        let value = document.remove(&key.to_string())?;

        match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring malformed cache entry");
                None
            }
        }
    }

    async fn set(&self, key: &CacheKey, shift: &Shift) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await;
        let value = serde_json::to_value(CachedActiveShift::now(shift.clone()))?;
        document.insert(key.to_string(), value);
        self.save(&document).await?;
        debug!(key = %key, shift_id = %shift.id, "Cached active shift");
        Ok(())
    }

    async fn clear(&self, key: &CacheKey) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await;
        if document.remove(&key.to_string()).is_some() {
            self.save(&document).await?;
            debug!(key = %key, "Cleared cached shift");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuel_station_core::{Money, ShiftId, ShiftStatus};

    fn shift(id: i32, employee: i32) -> Shift {
        let now = Utc::now();
        Shift {
            id: ShiftId::new(id),
            employee_id: EmployeeId::new(employee),
            status: ShiftStatus::Open,
            opening_cash: Money::from_minor(5_000),
            closing_cash: None,
            sales_total: Money::ZERO,
            staff_ids: vec![EmployeeId::new(employee)],
            start_time: now,
            end_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cache_key_rendering() {
        assert_eq!(CacheKey::SystemWide.to_string(), "active_shift:system");
        assert_eq!(
            CacheKey::Employee(EmployeeId::new(4)).to_string(),
            "active_shift:employee:4"
        );
    }

    #[tokio::test]
    async fn test_memory_cache_set_get_clear() {
        let cache = MemoryCache::new();
        let key = CacheKey::Employee(EmployeeId::new(1));

        cache.set(&key, &shift(10, 1)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().shift.id, ShiftId::new(10));
        assert!(cache.get(&CacheKey::SystemWide).await.is_none());

        cache.clear(&key).await.unwrap();
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_malformed_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache.insert_raw(&CacheKey::SystemWide, "{not json").await;
        assert!(cache.get(&CacheKey::SystemWide).await.is_none());
    }

    #[tokio::test]
    async fn test_file_cache_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("till").join("active_shift.json");
        let key = CacheKey::SystemWide;

        let original = shift(3, 2);
        FileCache::new(&path).set(&key, &original).await.unwrap();

        let reopened = FileCache::new(&path);
        let cached = reopened.get(&key).await.unwrap();
        assert_eq!(cached.shift, original);
    }

    #[tokio::test]
    async fn test_file_cache_malformed_document_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active_shift.json");
        tokio::fs::write(&path, b"\x00garbage").await.unwrap();

        let cache = FileCache::new(&path);
        assert!(cache.get(&CacheKey::SystemWide).await.is_none());

        // A write replaces the broken document.
        cache.set(&CacheKey::SystemWide, &shift(1, 1)).await.unwrap();
        assert!(cache.get(&CacheKey::SystemWide).await.is_some());
    }

    #[tokio::test]
    async fn test_file_cache_malformed_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active_shift.json");
        tokio::fs::write(&path, br#"{"active_shift:system": {"shift": 42}}"#)
            .await
            .unwrap();

        assert!(FileCache::new(&path).get(&CacheKey::SystemWide).await.is_none());
    }

    #[tokio::test]
    async fn test_file_cache_clear_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("active_shift.json"));
        let employee = CacheKey::Employee(EmployeeId::new(9));

        cache.set(&CacheKey::SystemWide, &shift(1, 9)).await.unwrap();
        cache.set(&employee, &shift(1, 9)).await.unwrap();
        cache.clear(&employee).await.unwrap();

        assert!(cache.get(&employee).await.is_none());
        assert!(cache.get(&CacheKey::SystemWide).await.is_some());
    }
}
