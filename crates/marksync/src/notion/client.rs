//! Notion API client creation and page operations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::convert::{image_block_payload, properties_payload, to_mirror_page};
use super::image::is_valid_image_url;
use super::types::{NotionPage, PropertyNames, QueryResponse};
use crate::api::{ApiClient, ApiError};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpTransport};
use crate::retry::RetryConfig;
use crate::types::{BookmarkItem, MirrorPage, MirrorStore};

/// Notion API base URL.
pub const NOTION_API_URL: &str = "https://api.notion.com/v1";

/// API version header value.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Results per query page; the API maximum.
pub const QUERY_PAGE_SIZE: usize = 100;

/// Hard cap on query pages.
pub const MAX_PAGES: u32 = 200;

/// Delay before the detached image attachment runs.
pub const DEFAULT_IMAGE_DELAY: Duration = Duration::from_millis(500);

/// Notion database client.
#[derive(Clone)]
pub struct NotionClient {
    api: ApiClient,
    database_id: String,
    properties: PropertyNames,
    attach_images: bool,
    image_delay: Duration,
}

impl NotionClient {
    /// Create a client backed by reqwest.
    pub fn new(token: &str, database_id: &str) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(30))
            .map_err(|e| ApiError::invalid(None, e.to_string()))?;
        Ok(Self::new_with_transport(
            NOTION_API_URL,
            token,
            database_id,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        base_url: &str,
        token: &str,
        database_id: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let api = ApiClient::new(
            "notion",
            transport,
            base_url,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), "marksync".to_string()),
                ("Authorization".to_string(), format!("Bearer {token}")),
                ("Notion-Version".to_string(), NOTION_VERSION.to_string()),
            ],
        );
        Self {
            api,
            database_id: database_id.to_string(),
            properties: PropertyNames::default(),
            attach_images: true,
            image_delay: DEFAULT_IMAGE_DELAY,
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

    #[must_use]
    pub fn with_properties(mut self, properties: PropertyNames) -> Self {
        self.properties = properties;
        self
    }

    /// Enable or disable the best-effort image attachment.
    #[must_use]
    pub fn with_images(mut self, enabled: bool) -> Self {
        self.attach_images = enabled;
        self
    }

    #[must_use]
    pub fn with_image_delay(mut self, delay: Duration) -> Self {
        self.image_delay = delay;
        self
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Attach `image_url` to `page_id` in a detached task.
    ///
    /// Invalid URLs are dropped silently. Failures are only logged; the
    /// outcome of the parent create/update never depends on this.
    fn spawn_image_attachment(&self, page_id: &str, image_url: Option<&str>) {
        if !self.attach_images {
            return;
        }
        let Some(image_url) = image_url.filter(|u| is_valid_image_url(u)) else {
            return;
        };

        let api = self.api.clone();
        let delay = self.image_delay;
        let page_id = page_id.to_string();
        let image_url = image_url.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let path = format!("/blocks/{page_id}/children");
            let result: Result<serde_json::Value, ApiError> = api
                .send_json(HttpMethod::Patch, &path, &image_block_payload(&image_url))
                .await;
            match result {
                Ok(_) => tracing::debug!(page_id = %page_id, "Attached image"),
                Err(e) => {
                    tracing::debug!(page_id = %page_id, error = %e, "Image attachment failed")
                }
            }
        });
    }
}

#[async_trait]
impl MirrorStore for NotionClient {
    async fn fetch_all(&self) -> Result<Vec<MirrorPage>, ApiError> {
        let path = format!("/databases/{}/query", self.database_id);
        let mut pages: Vec<MirrorPage> = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
            if let Some(ref cursor) = cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response: QueryResponse = self.api.send_json(HttpMethod::Post, &path, &body).await?;
            pages.extend(
                response
                    .results
                    .iter()
                    .map(|p| to_mirror_page(p, &self.properties)),
            );
            tracing::debug!(page, total_so_far = pages.len(), "Fetched mirror page");

            match (response.has_more, response.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => return Ok(pages),
            }
        }

        tracing::warn!(max_pages = MAX_PAGES, "Reached mirror page cap, stopping");
        Ok(pages)
    }

    async fn create(&self, item: &BookmarkItem) -> Result<MirrorPage, ApiError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": properties_payload(item, &self.properties),
        });
        let page: NotionPage = self.api.send_json(HttpMethod::Post, "/pages", &body).await?;

        self.spawn_image_attachment(&page.id, item.image_url.as_deref());
        Ok(to_mirror_page(&page, &self.properties))
    }

    async fn update(&self, page_id: &str, item: &BookmarkItem) -> Result<(), ApiError> {
        let body = json!({ "properties": properties_payload(item, &self.properties) });
        let _: serde_json::Value = self
            .api
            .send_json(HttpMethod::Patch, &format!("/pages/{page_id}"), &body)
            .await?;

        self.spawn_image_attachment(page_id, item.image_url.as_deref());
        Ok(())
    }

    async fn archive(&self, page_id: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .api
            .send_json(
                HttpMethod::Patch,
                &format!("/pages/{page_id}"),
                &json!({ "archived": true }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;
    use chrono::Utc;

    const BASE: &str = "https://notion.test/v1";

    fn client(transport: &MockTransport) -> NotionClient {
        NotionClient::new_with_transport(BASE, "secret", "db1", Arc::new(transport.clone()))
            .with_retry(RetryConfig::new(
                Duration::from_millis(10),
                Duration::from_millis(10),
                0,
            ))
    }

    fn page_json(id: &str, title: &str, url: &str) -> serde_json::Value {
        json!({
            "id": id,
            "archived": false,
            "properties": {
                "Name": { "title": [{ "plain_text": title }] },
                "URL": { "url": url },
                "Tags": { "multi_select": [] }
            }
        })
    }

    fn bookmark(image: Option<&str>) -> BookmarkItem {
        BookmarkItem {
            id: "r1".to_string(),
            url: "https://example.com/a".to_string(),
            title: "A".to_string(),
            tags: vec!["x".to_string()],
            created_at: Utc::now(),
            image_url: image.map(str::to_string),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_all_follows_cursor() {
        let transport = MockTransport::new();
        let url = format!("{BASE}/databases/db1/query");
        transport.push_json(
            HttpMethod::Post,
            &url,
            200,
            json!({
                "results": [page_json("p1", "A", "https://a.com")],
                "has_more": true,
                "next_cursor": "c2"
            }),
        );
        transport.push_json(
            HttpMethod::Post,
            &url,
            200,
            json!({
                "results": [page_json("p2", "B", "https://b.com")],
                "has_more": false,
                "next_cursor": null
            }),
        );

        let pages = client(&transport).fetch_all().await.unwrap();

        assert_eq!(
            pages.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["p1", "p2"]
        );
        let requests = transport.requests();
        let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert_eq!(second["start_cursor"], "c2");
        assert!(
            requests[0]
                .headers
                .iter()
                .any(|(k, v)| k == "Notion-Version" && v == NOTION_VERSION)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_all_propagates_mid_pagination_failure() {
        let transport = MockTransport::new();
        let url = format!("{BASE}/databases/db1/query");
        transport.push_json(
            HttpMethod::Post,
            &url,
            200,
            json!({ "results": [], "has_more": true, "next_cursor": "c2" }),
        );
        transport.push_json(HttpMethod::Post, &url, 500, json!({}));

        assert!(client(&transport).fetch_all().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn create_posts_parent_and_properties() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{BASE}/pages"),
            200,
            page_json("new", "A", "https://example.com/a"),
        );

        let page = client(&transport)
            .with_images(false)
            .create(&bookmark(None))
            .await
            .unwrap();

        assert_eq!(page.id, "new");
        let body: serde_json::Value = serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(body["parent"]["database_id"], "db1");
        assert_eq!(body["properties"]["Tags"]["multi_select"][0]["name"], "x");
    }

    #[tokio::test(start_paused = true)]
    async fn create_attaches_image_in_background() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{BASE}/pages"),
            200,
            page_json("new", "A", "https://example.com/a"),
        );
        transport.push_json(
            HttpMethod::Patch,
            format!("{BASE}/blocks/new/children"),
            200,
            json!({}),
        );

        client(&transport)
            .create(&bookmark(Some("https://cdn.example.com/cover.png")))
            .await
            .unwrap();
        assert_eq!(transport.requests().len(), 1);

        tokio::time::sleep(DEFAULT_IMAGE_DELAY * 2).await;
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url, format!("{BASE}/blocks/new/children"));
    }

    #[tokio::test(start_paused = true)]
    async fn image_failure_does_not_affect_update() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Patch, format!("{BASE}/pages/p1"), 200, json!({}));
        transport.push_json(
            HttpMethod::Patch,
            format!("{BASE}/blocks/p1/children"),
            400,
            json!({ "message": "invalid image" }),
        );

        let result = client(&transport)
            .update("p1", &bookmark(Some("https://cdn.example.com/image/9")))
            .await;
        assert!(result.is_ok());

        tokio::time::sleep(DEFAULT_IMAGE_DELAY * 2).await;
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_image_url_is_skipped() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Patch, format!("{BASE}/pages/p1"), 200, json!({}));

        client(&transport)
            .update("p1", &bookmark(Some("ftp://example.com/a.png")))
            .await
            .unwrap();

        tokio::time::sleep(DEFAULT_IMAGE_DELAY * 2).await;
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn archive_sends_flag() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Patch,
            format!("{BASE}/pages/p9"),
            200,
            json!({ "id": "p9", "archived": true }),
        );

        client(&transport).archive("p9").await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(body, json!({ "archived": true }));
    }

    #[tokio::test(start_paused = true)]
    async fn archive_surfaces_client_errors() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Patch,
            format!("{BASE}/pages/gone"),
            404,
            json!({ "code": "object_not_found" }),
        );

        let err = client(&transport).archive("gone").await.unwrap_err();
        assert_eq!(err.status, Some(404));
    }
}
