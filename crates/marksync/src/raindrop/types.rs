//! Raindrop API data types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A single raindrop (bookmark) - only the fields we map.
///
/// API docs: https://developer.raindrop.io/v1/raindrops
#[derive(Debug, Clone, Deserialize)]
pub struct Raindrop {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    /// Cover image; Raindrop sends an empty string when there is none.
    #[serde(default)]
    pub cover: Option<String>,
}

/// One page of `GET /raindrops/{collection}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RaindropPage {
    #[serde(default)]
    pub items: Vec<Raindrop>,
    /// Total items matching the query across all pages.
    #[serde(default)]
    pub count: usize,
}
