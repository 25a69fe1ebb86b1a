//! On-disk snapshot of the source collection.
//!
//! A snapshot is two files in one directory: the item list and a small
//! metadata record. Both are written through a temp file and renamed into
//! place, items first, so a present metadata file implies complete items.
//! Expired snapshots are never served and are removed when a read finds them.
//! Within one process, reads, writes and clears of a cache (and its clones)
//! take turns on a shared lock.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::sync::SyncError;
use crate::types::{BookmarkItem, BookmarkSource};

/// Default freshness window.
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Item data file name.
pub const DATA_FILE: &str = "bookmarks.json";

/// Metadata file name.
pub const METADATA_FILE: &str = "metadata.json";

/// Why the snapshot could not be used.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cached snapshot found")]
    NotFound,

    #[error("cached snapshot expired ({age_minutes} min old, ttl {ttl_minutes} min)")]
    Expired { age_minutes: i64, ttl_minutes: i64 },

    #[error("failed to write cache file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read cache file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cached snapshot is corrupt ({}): {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
}

/// Stored next to the item data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub captured_at: DateTime<Utc>,
    pub item_count: usize,
    pub size_bytes: u64,
}

/// A fresh snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub items: Vec<BookmarkItem>,
    pub captured_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl Snapshot {
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.captured_at
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub item_count: usize,
    pub size_bytes: u64,
    pub duration_ms: u64,
}

/// Non-failing cache introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub exists: bool,
    pub valid: bool,
    pub age_minutes: Option<i64>,
    pub item_count: Option<usize>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl CacheStatus {
    fn missing() -> Self {
        Self {
            exists: false,
            valid: false,
            age_minutes: None,
            item_count: None,
            captured_at: None,
        }
    }
}

/// File-backed snapshot cache.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
    ttl: Duration,
    files: Arc<Mutex<()>>,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            files: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    fn ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX)
    }

    fn is_fresh(&self, captured_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - captured_at <= self.ttl_chrono()
    }

    /// Replace the snapshot with `items`.
    pub async fn write(&self, items: &[BookmarkItem]) -> Result<CacheStats, CacheError> {
        self.write_at(items, Utc::now()).await
    }

    /// Replace the snapshot, recording `captured_at` as the capture time.
    pub async fn write_at(
        &self,
        items: &[BookmarkItem],
        captured_at: DateTime<Utc>,
    ) -> Result<CacheStats, CacheError> {
        let started = Instant::now();
        let _files = self.files.lock().await;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::Write {
                path: self.dir.clone(),
                source,
            })?;

        let data = serde_json::to_vec(items).map_err(|e| CacheError::Corrupt {
            path: self.data_path(),
            reason: e.to_string(),
        })?;
        let size_bytes = data.len() as u64;
        write_atomic(&self.data_path(), &data).await?;

        let metadata = SnapshotMetadata {
            captured_at,
            item_count: items.len(),
            size_bytes,
        };
        let meta = serde_json::to_vec_pretty(&metadata).map_err(|e| CacheError::Corrupt {
            path: self.metadata_path(),
            reason: e.to_string(),
        })?;
        write_atomic(&self.metadata_path(), &meta).await?;

        let stats = CacheStats {
            item_count: items.len(),
            size_bytes,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        tracing::info!(
            items = stats.item_count,
            bytes = stats.size_bytes,
            dir = %self.dir.display(),
            "Wrote snapshot"
        );
        Ok(stats)
    }

    /// Read the snapshot if it exists and is fresh.
    pub async fn read(&self) -> Result<Snapshot, CacheError> {
        self.read_at(Utc::now()).await
    }

    /// Read the snapshot as of `now`.
    pub async fn read_at(&self, now: DateTime<Utc>) -> Result<Snapshot, CacheError> {
        let _files = self.files.lock().await;
        let metadata = self.read_metadata().await?.ok_or(CacheError::NotFound)?;

        if !self.is_fresh(metadata.captured_at, now) {
            let age_minutes = (now - metadata.captured_at).num_minutes();
            tracing::debug!(age_minutes, "Snapshot expired, removing");
            if let Err(e) = self.remove_files().await {
                tracing::debug!(error = %e, "Failed to remove expired snapshot");
            }
            return Err(CacheError::Expired {
                age_minutes,
                ttl_minutes: self.ttl_chrono().num_minutes(),
            });
        }

        let path = self.data_path();
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(CacheError::NotFound),
            Err(source) => return Err(CacheError::Read { path, source }),
        };
        let items: Vec<BookmarkItem> =
            serde_json::from_slice(&data).map_err(|e| CacheError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if items.len() != metadata.item_count {
            return Err(CacheError::Corrupt {
                path,
                reason: format!(
                    "metadata says {} items, found {}",
                    metadata.item_count,
                    items.len()
                ),
            });
        }

        Ok(Snapshot {
            items,
            captured_at: metadata.captured_at,
            ttl: self.ttl,
        })
    }

    async fn read_metadata(&self) -> Result<Option<SnapshotMetadata>, CacheError> {
        let path = self.metadata_path();
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Read { path, source }),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| CacheError::Corrupt {
                path,
                reason: e.to_string(),
            })
    }

    /// Describe the snapshot without failing.
    pub async fn status(&self) -> CacheStatus {
        self.status_at(Utc::now()).await
    }

    pub async fn status_at(&self, now: DateTime<Utc>) -> CacheStatus {
        let metadata = match self.read_metadata().await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => return CacheStatus::missing(),
            Err(e) => {
                tracing::debug!(error = %e, "Unreadable snapshot metadata");
                return CacheStatus {
                    exists: true,
                    ..CacheStatus::missing()
                };
            }
        };

        let data_exists = tokio::fs::try_exists(self.data_path())
            .await
            .unwrap_or(false);

        CacheStatus {
            exists: data_exists,
            valid: data_exists && self.is_fresh(metadata.captured_at, now),
            age_minutes: Some((now - metadata.captured_at).num_minutes()),
            item_count: Some(metadata.item_count),
            captured_at: Some(metadata.captured_at),
        }
    }

    /// Delete the snapshot. Clearing an empty cache succeeds.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let _files = self.files.lock().await;
        self.remove_files().await
    }

    async fn remove_files(&self) -> Result<(), CacheError> {
        // Metadata first, so a partial clear never leaves metadata without data.
        for path in [self.metadata_path(), self.data_path()] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Write { path, source }),
            }
        }
        Ok(())
    }

    /// Fetch the whole source collection and store it.
    pub async fn refresh(&self, source: &dyn BookmarkSource) -> Result<CacheStats, SyncError> {
        let items = source.fetch_all(None).await.map_err(SyncError::SourceFetch)?;
        Ok(self.write(&items).await?)
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
    let to_err = |source| CacheError::Write {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(&tmp, bytes).await.map_err(to_err)?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(to_err(e));
    }
    Ok(())
}
