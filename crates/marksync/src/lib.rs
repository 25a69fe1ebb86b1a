//! Marksync - mirror Raindrop.io bookmarks into a Notion database.
//!
//! The library holds the whole sync engine: rate-limited API clients for
//! both services, a file-backed snapshot cache of the bookmark collection,
//! the diff engine, and the orchestrator that runs one sync at a time and
//! streams progress to any number of viewers.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use marksync::notion::NotionClient;
//! use marksync::raindrop::RaindropClient;
//! use marksync::snapshot::{DEFAULT_TTL, SnapshotCache};
//! use marksync::sync::{EngineConfig, Strategy, SyncRequest, SyncService};
//!
//! let source = Arc::new(RaindropClient::new("raindrop-token", 0)?);
//! let mirror = Arc::new(NotionClient::new("notion-token", "database-id")?);
//! let cache = Arc::new(SnapshotCache::new("/tmp/marksync", DEFAULT_TTL));
//!
//! let service = SyncService::new(source, mirror, cache, EngineConfig::default());
//! let report = service
//!     .start_sync(SyncRequest::new(Strategy::SmartIncremental))?
//!     .wait()
//!     .await?;
//! ```

pub mod api;
pub mod http;
pub mod notion;
pub mod raindrop;
pub mod retry;
pub mod snapshot;
pub mod sync;
pub mod types;

pub use api::{ApiClient, ApiError};
pub use retry::RetryConfig;
pub use snapshot::{CacheError, SnapshotCache};
pub use sync::{
    EngineConfig, Strategy, SyncCounts, SyncEvent, SyncReport, SyncRequest, SyncService,
};
pub use types::{BookmarkItem, BookmarkSource, MirrorPage, MirrorStore};
