//! Classification of source items against the mirror.
//!
//! Matching is by normalized URL first and normalized title second. A URL
//! hit always wins, so a title lookup is only made when the URL misses.

use std::collections::{HashMap, HashSet};

use crate::types::{BookmarkItem, MirrorPage};

/// Normalize a URL for identity matching.
///
/// Lowercases, drops the fragment and query, and strips trailing slashes.
pub fn normalize_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let end = lowered.find(['#', '?']).unwrap_or(lowered.len());
    lowered[..end]
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

/// Normalize a title for identity matching.
pub fn normalize_title(title: &str) -> String {
    title.to_lowercase().trim().to_string()
}

/// Clean a tag for the mirror, which rejects commas in option names.
pub fn sanitize_tag(tag: &str) -> String {
    tag.replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tag_set(tags: &[String]) -> HashSet<String> {
    tags.iter()
        .map(|t| sanitize_tag(t))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Order-insensitive tag comparison.
pub fn tags_equal(a: &[String], b: &[String]) -> bool {
    tag_set(a) == tag_set(b)
}

/// True when a matched page has drifted from its source item.
pub fn needs_update(item: &BookmarkItem, page: &MirrorPage) -> bool {
    normalize_title(&item.title) != normalize_title(&page.title)
        || normalize_url(&item.url) != normalize_url(&page.url)
        || !tags_equal(&item.tags, &page.tags)
}

/// Lookup indices over live mirror pages.
///
/// Archived pages are left out. When two pages share a key the first one
/// wins. Empty keys are never indexed.
#[derive(Debug, Default)]
pub struct MirrorIndex<'a> {
    by_url: HashMap<String, &'a MirrorPage>,
    by_title: HashMap<String, &'a MirrorPage>,
}

impl<'a> MirrorIndex<'a> {
    pub fn build(pages: &'a [MirrorPage]) -> Self {
        let mut index = Self::default();
        for page in pages.iter().filter(|p| !p.archived) {
            let url = normalize_url(&page.url);
            if !url.is_empty() {
                index.by_url.entry(url).or_insert(page);
            }
            let title = normalize_title(&page.title);
            if !title.is_empty() {
                index.by_title.entry(title).or_insert(page);
            }
        }
        index
    }

    /// Find the page an item maps to.
    pub fn lookup(&self, item: &BookmarkItem) -> Option<&'a MirrorPage> {
        let url = normalize_url(&item.url);
        if !url.is_empty()
            && let Some(page) = self.by_url.get(&url)
        {
            return Some(*page);
        }

        let title = normalize_title(&item.title);
        if title.is_empty() {
            return None;
        }
        self.by_title.get(&title).copied()
    }

    pub fn url_keys(&self) -> usize {
        self.by_url.len()
    }

    pub fn title_keys(&self) -> usize {
        self.by_title.len()
    }
}

/// Result of diffing one set of source items against the mirror.
///
/// Every input item lands in exactly one of the three lists, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub to_create: Vec<BookmarkItem>,
    pub to_update: Vec<(BookmarkItem, MirrorPage)>,
    pub to_skip: Vec<BookmarkItem>,
}

impl ReconciliationPlan {
    /// Number of source items classified.
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_skip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates plus updates.
    pub fn action_count(&self) -> usize {
        self.to_create.len() + self.to_update.len()
    }

    /// Percentage of items that needed no action.
    pub fn efficiency(&self) -> f64 {
        super::types::efficiency(self.action_count(), self.len())
    }
}

/// Classify every item as create, update, or skip.
pub fn plan(items: Vec<BookmarkItem>, pages: &[MirrorPage]) -> ReconciliationPlan {
    let index = MirrorIndex::build(pages);
    let mut plan = ReconciliationPlan::default();

    for item in items {
        match index.lookup(&item) {
            None => plan.to_create.push(item),
            Some(page) if needs_update(&item, page) => plan.to_update.push((item, page.clone())),
            Some(_) => plan.to_skip.push(item),
        }
    }

    plan
}
