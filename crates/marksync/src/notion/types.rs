//! Notion API data types.

use std::collections::HashMap;

use serde::Deserialize;

/// A database page. Properties are kept as raw JSON and read by name.
///
/// API docs: https://developers.notion.com/reference/page
#[derive(Debug, Clone, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

/// Reply of `POST /databases/{id}/query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<NotionPage>,
    #[serde(default)]
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Names of the database properties bookmarks are mapped onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNames {
    pub title: String,
    pub url: String,
    pub tags: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: "Name".to_string(),
            url: "URL".to_string(),
            tags: "Tags".to_string(),
        }
    }
}
