//! Mapping between Notion pages and bookmarks.

use serde_json::{Value, json};

use super::types::{NotionPage, PropertyNames};
use crate::sync::sanitize_tag;
use crate::types::{BookmarkItem, MirrorPage};

/// Notion rejects rich text longer than this.
const MAX_TEXT_LEN: usize = 2_000;

fn rich_text_plain(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| {
                    p.get("plain_text")
                        .or_else(|| p.get("text").and_then(|t| t.get("content")))
                        .and_then(Value::as_str)
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Convert a page to the store-agnostic mirror representation.
///
/// Missing or mistyped properties map to empty values.
pub fn to_mirror_page(page: &NotionPage, names: &PropertyNames) -> MirrorPage {
    let title = rich_text_plain(page.properties.get(&names.title).and_then(|p| p.get("title")));
    let url = page
        .properties
        .get(&names.url)
        .and_then(|p| p.get("url"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let tags = page
        .properties
        .get(&names.tags)
        .and_then(|p| p.get("multi_select"))
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .filter_map(|o| o.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    MirrorPage {
        id: page.id.clone(),
        url,
        title,
        tags,
        archived: page.archived,
    }
}

fn clip(s: &str) -> String {
    s.chars().take(MAX_TEXT_LEN).collect()
}

/// Build the `properties` object for create and update calls.
pub fn properties_payload(item: &BookmarkItem, names: &PropertyNames) -> Value {
    let mut tags: Vec<String> = Vec::with_capacity(item.tags.len());
    for tag in item.tags.iter().map(|t| sanitize_tag(t)) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let url = if item.url.trim().is_empty() {
        Value::Null
    } else {
        Value::String(item.url.trim().to_string())
    };

    let mut properties = serde_json::Map::new();
    properties.insert(
        names.title.clone(),
        json!({ "title": [{ "text": { "content": clip(&item.title) } }] }),
    );
    properties.insert(names.url.clone(), json!({ "url": url }));
    properties.insert(
        names.tags.clone(),
        json!({ "multi_select": tags.iter().map(|t| json!({ "name": t })).collect::<Vec<_>>() }),
    );
    Value::Object(properties)
}

/// Body for appending an external image block to a page.
pub fn image_block_payload(image_url: &str) -> Value {
    json!({
        "children": [{
            "object": "block",
            "type": "image",
            "image": { "type": "external", "external": { "url": image_url } }
        }]
    })
}
