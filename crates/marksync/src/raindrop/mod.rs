//! Raindrop.io client acting as the bookmark source.
//!
//! # Module Structure
//!
//! - [`types`] - Response shapes of the Raindrop REST API
//! - [`client`] - Paginated fetching on top of [`crate::api::ApiClient`]
//! - [`convert`] - Mapping raindrops to [`crate::types::BookmarkItem`]
//!
//! ```ignore
//! use marksync::raindrop::RaindropClient;
//! use marksync::types::BookmarkSource;
//!
//! let client = RaindropClient::new("token", 0)?;
//! let recent = client.fetch_recent(24 * 30).await?;
//! ```

mod client;
mod convert;
mod types;

pub use client::{FALLBACK_LIMIT, MAX_PAGES, PAGE_SIZE, RAINDROP_API_URL, RaindropClient};
pub use convert::to_bookmark_item;
pub use types::{Raindrop, RaindropPage};
