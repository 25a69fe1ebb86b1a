use super::types::Raindrop;
use crate::types::BookmarkItem;

/// Convert a raindrop to the source-agnostic bookmark representation.
pub fn to_bookmark_item(raindrop: &Raindrop) -> BookmarkItem {
    BookmarkItem {
        id: raindrop.id.to_string(),
        url: raindrop.link.trim().to_string(),
        title: raindrop.title.trim().to_string(),
        tags: raindrop.tags.clone(),
        created_at: raindrop.created,
        image_url: raindrop
            .cover
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
    }
}
