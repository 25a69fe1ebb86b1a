//! In-memory source and mirror used by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marksync::sync::{EngineConfig, ProgressCallback, SyncEvent, cutoff_before};
use marksync::{ApiError, BookmarkItem, BookmarkSource, MirrorPage, MirrorStore};
use tokio::sync::Notify;

/// Fixed bookmark list, optionally failing or blocking until released.
#[derive(Default)]
pub struct FakeSource {
    pub items: Vec<BookmarkItem>,
    pub fail: bool,
    pub panic: bool,
    pub gate: Option<Arc<Notify>>,
    pub fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new(items: Vec<BookmarkItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }

    pub fn gated(items: Vec<BookmarkItem>, gate: Arc<Notify>) -> Self {
        Self {
            items,
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn before_fetch(&self) -> Result<(), ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.panic {
            panic!("source adapter blew up");
        }
        if self.fail {
            return Err(ApiError::network("connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl BookmarkSource for FakeSource {
    async fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<BookmarkItem>, ApiError> {
        self.before_fetch().await?;
        let mut items = self.items.clone();
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn fetch_recent(&self, hours_back: u32) -> Result<Vec<BookmarkItem>, ApiError> {
        self.before_fetch().await?;
        let cutoff = cutoff_before(Utc::now(), chrono::Duration::hours(i64::from(hours_back)));
        Ok(self
            .items
            .iter()
            .filter(|i| i.created_at >= cutoff)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, ApiError> {
        if self.fail {
            return Err(ApiError::network("connection reset"));
        }
        Ok(self.items.len())
    }
}

/// Mirror backed by a vector, recording every mutation call in order.
#[derive(Default)]
pub struct FakeMirror {
    pub pages: Mutex<Vec<MirrorPage>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_titles: HashSet<String>,
    pub fail_fetch: bool,
    next_id: AtomicUsize,
}

impl FakeMirror {
    pub fn new(pages: Vec<MirrorPage>) -> Self {
        Self {
            pages: Mutex::new(pages),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, title: &str) -> Self {
        self.fail_titles.insert(title.to_string());
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn live_pages(&self) -> Vec<MirrorPage> {
        self.pages
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !p.archived)
            .cloned()
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MirrorStore for FakeMirror {
    async fn fetch_all(&self) -> Result<Vec<MirrorPage>, ApiError> {
        if self.fail_fetch {
            return Err(ApiError::invalid(Some(401), "unauthorized"));
        }
        Ok(self.pages.lock().unwrap().clone())
    }

    async fn create(&self, item: &BookmarkItem) -> Result<MirrorPage, ApiError> {
        self.record(format!("create:{}", item.title));
        if self.fail_titles.contains(&item.title) {
            return Err(ApiError::invalid(Some(400), "validation failed"));
        }
        let page = MirrorPage {
            id: format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            url: item.url.clone(),
            title: item.title.clone(),
            tags: item.tags.clone(),
            archived: false,
        };
        self.pages.lock().unwrap().push(page.clone());
        Ok(page)
    }

    async fn update(&self, page_id: &str, item: &BookmarkItem) -> Result<(), ApiError> {
        self.record(format!("update:{}", item.title));
        if self.fail_titles.contains(&item.title) {
            return Err(ApiError::invalid(Some(400), "validation failed"));
        }
        let mut pages = self.pages.lock().unwrap();
        let page = pages
            .iter_mut()
            .find(|p| p.id == page_id)
            .ok_or_else(|| ApiError::invalid(Some(404), "not found"))?;
        page.url = item.url.clone();
        page.title = item.title.clone();
        page.tags = item.tags.clone();
        Ok(())
    }

    async fn archive(&self, page_id: &str) -> Result<(), ApiError> {
        self.record(format!("archive:{page_id}"));
        let mut pages = self.pages.lock().unwrap();
        if let Some(page) = pages.iter_mut().find(|p| p.id == page_id) {
            page.archived = true;
        }
        Ok(())
    }
}

pub fn bookmark(id: &str, url: &str, title: &str) -> BookmarkItem {
    bookmark_at(id, url, title, Utc::now())
}

pub fn bookmark_at(id: &str, url: &str, title: &str, created_at: DateTime<Utc>) -> BookmarkItem {
    BookmarkItem {
        id: id.to_string(),
        url: url.to_string(),
        title: title.to_string(),
        tags: Vec::new(),
        created_at,
        image_url: None,
    }
}

pub fn page(id: &str, url: &str, title: &str) -> MirrorPage {
    MirrorPage {
        id: id.to_string(),
        url: url.to_string(),
        title: title.to_string(),
        tags: Vec::new(),
        archived: false,
    }
}

pub fn numbered_items(n: usize) -> Vec<BookmarkItem> {
    (1..=n)
        .map(|i| bookmark(&i.to_string(), &format!("https://example.com/{i}"), &format!("Item {i}")))
        .collect()
}

pub fn numbered_pages(n: usize) -> Vec<MirrorPage> {
    (1..=n)
        .map(|i| page(&format!("p{i}"), &format!("https://old.example.com/{i}"), &format!("Old {i}")))
        .collect()
}

pub fn config(batch_size: usize) -> EngineConfig {
    EngineConfig {
        batch_size,
        ..EngineConfig::default()
    }
}

/// A callback that records every event.
pub fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<SyncEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: ProgressCallback = Box::new(move |event| {
        sink.lock().unwrap().push(event);
    });
    (callback, events)
}

/// Upper bound for any single test run.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(600);
