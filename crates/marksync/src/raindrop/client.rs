//! Raindrop API client creation and paginated fetching.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::convert::to_bookmark_item;
use super::types::RaindropPage;
use crate::api::{ApiClient, ApiError};
use crate::http::HttpTransport;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::retry::RetryConfig;
use crate::sync::{cutoff_before, filter_created_since};
use crate::types::{BookmarkItem, BookmarkSource};

/// Raindrop REST API base URL.
pub const RAINDROP_API_URL: &str = "https://api.raindrop.io/rest/v1";

/// Items per page; the API maximum.
pub const PAGE_SIZE: usize = 50;

/// Hard cap on pages per listing.
pub const MAX_PAGES: u32 = 200;

/// Item cap used when a date-filtered query fails and we fall back to a full listing.
pub const FALLBACK_LIMIT: usize = 1_000;

/// Raindrop.io client.
#[derive(Clone)]
pub struct RaindropClient {
    api: ApiClient,
    /// Collection to read; 0 means all bookmarks.
    collection_id: i64,
    page_size: usize,
}

impl RaindropClient {
    /// Create a client backed by reqwest.
    pub fn new(token: &str, collection_id: i64) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(30))
            .map_err(|e| ApiError::invalid(None, e.to_string()))?;
        Ok(Self::new_with_transport(
            RAINDROP_API_URL,
            token,
            collection_id,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        base_url: &str,
        token: &str,
        collection_id: i64,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let api = ApiClient::new(
            "raindrop",
            transport,
            base_url,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), "marksync".to_string()),
                ("Authorization".to_string(), format!("Bearer {token}")),
            ],
        );
        Self {
            api,
            collection_id,
            page_size: PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.api = self.api.with_pacing(pacing);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.api = self.api.with_retry(retry);
        self
    }

    /// Override the page size (clamped to 1..=50).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, PAGE_SIZE);
        self
    }

    fn page_path(&self, page: u32, per_page: usize, search: Option<&str>) -> String {
        let mut path = format!(
            "/raindrops/{}?perpage={}&page={}",
            self.collection_id, per_page, page
        );
        if let Some(search) = search {
            let encoded: String = url::form_urlencoded::byte_serialize(search.as_bytes()).collect();
            path.push_str("&search=");
            path.push_str(&encoded);
        }
        path
    }

    async fn fetch_page(&self, page: u32, search: Option<&str>) -> Result<RaindropPage, ApiError> {
        self.api
            .get_json(&self.page_path(page, self.page_size, search))
            .await
    }

    /// Walk pages until a short page, the limit, or the page cap.
    async fn paginate(
        &self,
        search: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<BookmarkItem>, ApiError> {
        let mut items: Vec<BookmarkItem> = Vec::new();

        for page in 0..MAX_PAGES {
            let fetched = match self.fetch_page(page, search).await {
                Ok(fetched) => fetched,
                Err(e) if items.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        page,
                        accumulated = items.len(),
                        error = %e,
                        "Page fetch failed, keeping partial results"
                    );
                    break;
                }
            };

            let page_len = fetched.items.len();
            items.extend(fetched.items.iter().map(to_bookmark_item));
            tracing::debug!(page, count = page_len, total_so_far = items.len(), "Fetched page");

            if let Some(limit) = limit
                && items.len() >= limit
            {
                items.truncate(limit);
                break;
            }

            if page_len < self.page_size {
                break;
            }

            if page + 1 == MAX_PAGES {
                tracing::warn!(max_pages = MAX_PAGES, "Reached page cap, stopping");
            }
        }

        Ok(items)
    }

    /// Fetch bookmarks created at or after `cutoff`.
    ///
    /// Uses the server-side `created:>` filter (date granular, so one day
    /// earlier than the cutoff) and filters again client-side. Falls back to a
    /// capped full listing if the filtered query fails.
    pub async fn fetch_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<BookmarkItem>, ApiError> {
        let day_before = cutoff_before(cutoff, chrono::Duration::days(1)).format("%Y-%m-%d");
        let search = format!("created:>{day_before}");

        let items = match self.paginate(Some(&search), None).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Date-filtered fetch failed, falling back to full listing");
                self.paginate(None, Some(FALLBACK_LIMIT)).await?
            }
        };

        Ok(filter_created_since(items, cutoff))
    }
}

#[async_trait]
impl BookmarkSource for RaindropClient {
    async fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<BookmarkItem>, ApiError> {
        self.paginate(None, limit).await
    }

    async fn fetch_recent(&self, hours_back: u32) -> Result<Vec<BookmarkItem>, ApiError> {
        let cutoff = cutoff_before(Utc::now(), chrono::Duration::hours(i64::from(hours_back)));
        self.fetch_since(cutoff).await
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let page: RaindropPage = self.api.get_json(&self.page_path(0, 1, None)).await?;
        Ok(page.count)
    }
}
