//! Notion database client acting as the mirror store.
//!
//! # Module Structure
//!
//! - [`types`] - Response shapes of the Notion API and property naming
//! - [`client`] - Query, create, update and archive on top of [`crate::api::ApiClient`]
//! - [`convert`] - Mapping between pages and bookmarks
//! - [`image`] - Validation policy for best-effort image attachments

mod client;
mod convert;
mod image;
mod types;

pub use client::{
    DEFAULT_IMAGE_DELAY, MAX_PAGES, NOTION_API_URL, NOTION_VERSION, NotionClient, QUERY_PAGE_SIZE,
};
pub use convert::{image_block_payload, properties_payload, to_mirror_page};
pub use image::is_valid_image_url;
pub use types::{NotionPage, PropertyNames, QueryResponse};
