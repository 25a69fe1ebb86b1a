//! Core records and the adapter seams the sync engine is written against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;

/// A bookmark from the source collection.
///
/// Read-only from the engine's perspective: fetched and compared, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkItem {
    /// Opaque source identifier.
    pub id: String,
    /// Canonical link (primary identity key).
    pub url: String,
    /// Display title.
    pub title: String,
    /// Tags; order is irrelevant for matching.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time, used for temporal filtering.
    pub created_at: DateTime<Utc>,
    /// Optional cover/preview image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A page in the mirror database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorPage {
    /// Opaque mirror identifier used for update/archive calls.
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Archiving is the deletion mechanism.
    #[serde(default)]
    pub archived: bool,
}

/// The external bookmark list being mirrored from.
#[async_trait]
pub trait BookmarkSource: Send + Sync {
    /// Fetch every bookmark, stopping early once `limit` items are collected.
    ///
    /// Implementations return what they accumulated when a later page fails,
    /// and only fail outright when nothing could be fetched.
    async fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<BookmarkItem>, ApiError>;

    /// Fetch bookmarks created within the last `hours_back` hours.
    async fn fetch_recent(&self, hours_back: u32) -> Result<Vec<BookmarkItem>, ApiError>;

    /// Total number of bookmarks, for display only.
    async fn count(&self) -> Result<usize, ApiError>;
}

/// The external page database being mirrored to.
///
/// Mutations return a `Result` and never panic so a batch can continue past
/// a failed item.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Fetch every page; the result must reflect the complete mirror state.
    async fn fetch_all(&self) -> Result<Vec<MirrorPage>, ApiError>;

    /// Create a page for `item`.
    async fn create(&self, item: &BookmarkItem) -> Result<MirrorPage, ApiError>;

    /// Overwrite the mapped properties of page `page_id` with `item`.
    async fn update(&self, page_id: &str, item: &BookmarkItem) -> Result<(), ApiError>;

    /// Soft-delete a page. Archiving an archived page succeeds.
    async fn archive(&self, page_id: &str) -> Result<(), ApiError>;

    /// Number of live pages, for display only.
    async fn count(&self) -> Result<usize, ApiError> {
        Ok(self
            .fetch_all()
            .await?
            .iter()
            .filter(|p| !p.archived)
            .count())
    }
}
