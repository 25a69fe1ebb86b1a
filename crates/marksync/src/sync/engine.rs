//! Sync strategies.
//!
//! Both strategies issue mirror mutations strictly one at a time with a
//! pacing pause between calls. A failed mutation is counted and reported,
//! and the run moves on to the next item. Only the initial bulk fetches can
//! fail a run.
//!
//! # Example
//!
//! ```ignore
//! use marksync::sync::{EngineConfig, Strategy, SyncEngine, SyncRequest};
//!
//! let engine = SyncEngine::new(source, mirror, EngineConfig::default());
//! let report = engine
//!     .run(Uuid::new_v4(), &SyncRequest::new(Strategy::SmartIncremental), None)
//!     .await;
//! println!("created {}", report.counts.created);
//! ```

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use uuid::Uuid;

use super::diff;
use super::filter::{filter_created_since, recent_cutoff};
use super::progress::{ItemAction, ProgressCallback, SyncEvent, emit};
use super::types::{EngineConfig, Strategy, SyncCounts, SyncError, SyncReport, SyncRequest};
use crate::api::ApiError;
use crate::snapshot::SnapshotCache;
use crate::types::{BookmarkItem, BookmarkSource, MirrorPage, MirrorStore};

/// One mirror mutation.
#[derive(Debug, Clone, Copy)]
enum Mutation<'a> {
    Create(&'a BookmarkItem),
    Update(&'a BookmarkItem, &'a MirrorPage),
    Archive(&'a MirrorPage),
}

impl Mutation<'_> {
    fn action(&self) -> ItemAction {
        match self {
            Mutation::Create(_) => ItemAction::Create,
            Mutation::Update(..) => ItemAction::Update,
            Mutation::Archive(_) => ItemAction::Archive,
        }
    }

    fn label(&self) -> &str {
        let (title, fallback) = match self {
            Mutation::Create(item) | Mutation::Update(item, _) => {
                (item.title.as_str(), item.url.as_str())
            }
            Mutation::Archive(page) => (page.title.as_str(), page.id.as_str()),
        };
        if title.trim().is_empty() {
            fallback
        } else {
            title
        }
    }

    fn done_verb(&self) -> &'static str {
        match self {
            Mutation::Create(_) => "Created",
            Mutation::Update(..) => "Updated",
            Mutation::Archive(_) => "Archived",
        }
    }
}

fn bump(counts: &mut SyncCounts, action: ItemAction) {
    match action {
        ItemAction::Create => counts.created += 1,
        ItemAction::Update => counts.updated += 1,
        ItemAction::Archive => counts.archived += 1,
    }
}

fn apply_limit(mut items: Vec<BookmarkItem>, limit: Option<usize>) -> Vec<BookmarkItem> {
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

/// Runs sync strategies against a source and a mirror.
pub struct SyncEngine {
    source: Arc<dyn BookmarkSource>,
    mirror: Arc<dyn MirrorStore>,
    cache: Option<Arc<SnapshotCache>>,
    config: EngineConfig,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn BookmarkSource>,
        mirror: Arc<dyn MirrorStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            mirror,
            cache: None,
            config,
        }
    }

    /// Allow runs to read source items from `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<SnapshotCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute one run to completion.
    ///
    /// Never fails: an unrecoverable error is reported through a `Failed`
    /// event and the report's `error`. A `Complete` event is always the last
    /// event emitted.
    #[tracing::instrument(skip_all, fields(run_id = %run_id, strategy = %request.strategy))]
    pub async fn run(
        &self,
        run_id: Uuid,
        request: &SyncRequest,
        on_progress: Option<&ProgressCallback>,
    ) -> SyncReport {
        let started = Instant::now();
        let mut counts = SyncCounts::default();

        tracing::info!(
            limit = ?request.limit,
            days_back = ?request.days_back,
            use_cache = request.use_cache,
            "Starting sync"
        );
        emit(
            on_progress,
            SyncEvent::info(format!("Starting {} sync", request.strategy)),
        );

        let result = match request.strategy {
            Strategy::FullReset => self
                .full_reset(request, &mut counts, on_progress)
                .await
                .map(|()| None),
            Strategy::SmartIncremental => self
                .smart_incremental(request, &mut counts, on_progress)
                .await
                .map(Some),
        };

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(efficiency) => {
                tracing::info!(
                    created = counts.created,
                    updated = counts.updated,
                    archived = counts.archived,
                    skipped = counts.skipped,
                    failed = counts.failed,
                    duration_ms,
                    "Sync complete"
                );
                emit(
                    on_progress,
                    SyncEvent::Complete {
                        message: "Sync complete".to_string(),
                        final_counts: counts,
                        efficiency,
                        duration_ms,
                    },
                );
                SyncReport {
                    run_id,
                    strategy: request.strategy,
                    counts,
                    efficiency,
                    duration_ms,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, failed = counts.failed, "Sync failed");
                let message = e.to_string();
                emit(
                    on_progress,
                    SyncEvent::Failed {
                        message: message.clone(),
                        counts,
                    },
                );
                emit(
                    on_progress,
                    SyncEvent::Complete {
                        message: "Sync failed".to_string(),
                        final_counts: counts,
                        efficiency: None,
                        duration_ms,
                    },
                );
                SyncReport {
                    run_id,
                    strategy: request.strategy,
                    counts,
                    efficiency: None,
                    duration_ms,
                    error: Some(message),
                }
            }
        }
    }

    /// Archive every live mirror page, then create one page per source item.
    pub async fn full_reset(
        &self,
        request: &SyncRequest,
        counts: &mut SyncCounts,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<(), SyncError> {
        emit(on_progress, SyncEvent::info("Fetching mirror pages"));
        let pages = self
            .mirror
            .fetch_all()
            .await
            .map_err(SyncError::MirrorFetch)?;

        let archive: Vec<Mutation<'_>> = pages
            .iter()
            .filter(|p| !p.archived)
            .map(Mutation::Archive)
            .collect();
        emit(
            on_progress,
            SyncEvent::info(format!("Archiving {} mirror pages", archive.len())),
        );
        self.execute(&archive, true, counts, on_progress).await;

        let items = self.load_all(request, on_progress).await?;
        let create: Vec<Mutation<'_>> = items.iter().map(Mutation::Create).collect();
        emit(
            on_progress,
            SyncEvent::info(format!("Creating {} pages", create.len())),
        );
        self.execute(&create, true, counts, on_progress).await;

        Ok(())
    }

    /// Reconcile recently created source items against the mirror.
    ///
    /// Returns the percentage of recent items that needed no action.
    pub async fn smart_incremental(
        &self,
        request: &SyncRequest,
        counts: &mut SyncCounts,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<f64, SyncError> {
        let days_back = request.days_back.unwrap_or(self.config.days_back);
        emit(
            on_progress,
            SyncEvent::info(format!("Fetching bookmarks from the last {days_back} days")),
        );
        let items = self.load_recent(request, days_back, on_progress).await?;
        emit(
            on_progress,
            SyncEvent::info(format!("Found {} recent bookmarks", items.len())),
        );

        let pages = self
            .mirror
            .fetch_all()
            .await
            .map_err(SyncError::MirrorFetch)?;
        emit(
            on_progress,
            SyncEvent::info(format!("Loaded {} mirror pages", pages.len())),
        );

        let plan = diff::plan(items, &pages);
        counts.skipped = plan.to_skip.len();
        tracing::info!(
            create = plan.to_create.len(),
            update = plan.to_update.len(),
            skip = plan.to_skip.len(),
            "Reconciliation planned"
        );
        emit(
            on_progress,
            SyncEvent::info(format!(
                "{} to create, {} to update, {} already in sync",
                plan.to_create.len(),
                plan.to_update.len(),
                plan.to_skip.len()
            )),
        );

        let ops: Vec<Mutation<'_>> = plan
            .to_create
            .iter()
            .map(Mutation::Create)
            .chain(plan.to_update.iter().map(|(item, page)| Mutation::Update(item, page)))
            .collect();
        self.execute(&ops, false, counts, on_progress).await;

        Ok(plan.efficiency())
    }

    async fn load_all(
        &self,
        request: &SyncRequest,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<BookmarkItem>, SyncError> {
        if request.use_cache
            && let Some(items) = self.cached_items(on_progress).await
        {
            return Ok(apply_limit(items, request.limit));
        }

        emit(on_progress, SyncEvent::info("Fetching bookmarks from source"));
        self.source
            .fetch_all(request.limit)
            .await
            .map_err(SyncError::SourceFetch)
    }

    async fn load_recent(
        &self,
        request: &SyncRequest,
        days_back: u32,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<BookmarkItem>, SyncError> {
        let cutoff = recent_cutoff(Utc::now(), days_back);

        let items = if request.use_cache {
            self.cached_items(on_progress).await
        } else {
            None
        };
        let items = match items {
            Some(items) => filter_created_since(items, cutoff),
            None => self
                .source
                .fetch_recent(days_back.saturating_mul(24))
                .await
                .map_err(SyncError::SourceFetch)?,
        };

        Ok(apply_limit(items, request.limit))
    }

    /// Items from a fresh snapshot, or `None` to fall back to a live fetch.
    async fn cached_items(&self, on_progress: Option<&ProgressCallback>) -> Option<Vec<BookmarkItem>> {
        let Some(cache) = &self.cache else {
            emit(
                on_progress,
                SyncEvent::info("No cache configured, fetching live"),
            );
            return None;
        };

        match cache.read().await {
            Ok(snapshot) => {
                let age = snapshot.age_at(Utc::now()).num_minutes();
                emit(
                    on_progress,
                    SyncEvent::info(format!(
                        "Using cached snapshot of {} bookmarks ({age} min old)",
                        snapshot.items.len()
                    )),
                );
                Some(snapshot.items)
            }
            Err(e) => {
                tracing::info!(error = %e, "Cache unusable, falling back to live fetch");
                emit(
                    on_progress,
                    SyncEvent::info(format!("Cache unavailable ({e}), fetching live")),
                );
                None
            }
        }
    }

    async fn apply(&self, op: Mutation<'_>) -> Result<(), ApiError> {
        match op {
            Mutation::Create(item) => self.mirror.create(item).await.map(|_| ()),
            Mutation::Update(item, page) => self.mirror.update(&page.id, item).await,
            Mutation::Archive(page) => self.mirror.archive(&page.id).await,
        }
    }

    /// Apply mutations in order, one at a time.
    ///
    /// With `batched`, a longer pause separates every `batch_size` calls.
    async fn execute(
        &self,
        ops: &[Mutation<'_>],
        batched: bool,
        counts: &mut SyncCounts,
        on_progress: Option<&ProgressCallback>,
    ) {
        let total = ops.len();
        let batch_size = self.config.batch_size.max(1);

        for (i, op) in ops.iter().enumerate() {
            if batched && i % batch_size == 0 {
                if i > 0 {
                    tokio::time::sleep(self.config.batch_pacing).await;
                }
                emit(
                    on_progress,
                    SyncEvent::Progress {
                        message: format!(
                            "Batch {}/{}",
                            i / batch_size + 1,
                            total.div_ceil(batch_size)
                        ),
                        current: i,
                        total,
                    },
                );
            } else if i > 0 {
                tokio::time::sleep(self.config.item_pacing).await;
            }

            let action = op.action();
            let label = op.label().to_string();
            let (success, message) = match self.apply(*op).await {
                Ok(()) => {
                    bump(counts, action);
                    (true, format!("{} {label}", op.done_verb()))
                }
                Err(e) => {
                    counts.failed += 1;
                    tracing::warn!(
                        action = action.as_str(),
                        item = %label,
                        error = %e,
                        "Mutation failed, continuing"
                    );
                    (false, format!("Failed to {} {label}: {e}", action.as_str()))
                }
            };

            emit(
                on_progress,
                SyncEvent::ItemResult {
                    message,
                    action,
                    success,
                    title: label,
                    counts: *counts,
                },
            );
        }
    }
}
