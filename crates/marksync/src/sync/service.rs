//! The sync orchestrator shared by every trigger surface.
//!
//! A [`SyncService`] owns the single-flight lock and the broadcaster. Each
//! accepted run executes in its own spawned task, so a viewer disconnecting
//! never cancels it.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use uuid::Uuid;

use super::broadcast::ProgressBroadcaster;
use super::engine::SyncEngine;
use super::lock::{LockContentionError, LockStatus, SyncLock};
use super::progress::SyncEvent;
use super::types::{EngineConfig, SyncCounts, SyncError, SyncReport, SyncRequest};
use crate::snapshot::{CacheError, CacheStats, CacheStatus, SnapshotCache};
use crate::types::{BookmarkSource, MirrorStore};

/// Handle to an accepted run.
#[derive(Debug)]
pub struct SyncTicket {
    pub run_id: Uuid,
    pub handle: JoinHandle<SyncReport>,
}

impl SyncTicket {
    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<SyncReport, SyncError> {
        self.handle
            .await
            .map_err(|e| SyncError::Internal(e.to_string()))
    }
}

/// Reply to a trigger request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Result<SyncTicket, LockContentionError>> for StartOutcome {
    fn from(result: &Result<SyncTicket, LockContentionError>) -> Self {
        match result {
            Ok(ticket) => Self {
                accepted: true,
                run_id: Some(ticket.run_id),
                reason: None,
            },
            Err(e) => Self {
                accepted: false,
                run_id: Some(e.run_id),
                reason: Some(e.to_string()),
            },
        }
    }
}

/// Dashboard counts. A side that could not be counted carries its error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionCounts {
    pub source: Option<usize>,
    pub mirror: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_error: Option<String>,
}

/// Owns the engine, lock, cache, and broadcaster for one process.
pub struct SyncService {
    engine: Arc<SyncEngine>,
    source: Arc<dyn BookmarkSource>,
    mirror: Arc<dyn MirrorStore>,
    cache: Arc<SnapshotCache>,
    lock: SyncLock,
    broadcaster: Arc<ProgressBroadcaster>,
}

impl SyncService {
    pub fn new(
        source: Arc<dyn BookmarkSource>,
        mirror: Arc<dyn MirrorStore>,
        cache: Arc<SnapshotCache>,
        config: EngineConfig,
    ) -> Self {
        let lock = SyncLock::new(config.stale_lock_after);
        let engine = SyncEngine::new(Arc::clone(&source), Arc::clone(&mirror), config)
            .with_cache(Arc::clone(&cache));
        Self {
            engine: Arc::new(engine),
            source,
            mirror,
            cache,
            lock,
            broadcaster: Arc::new(ProgressBroadcaster::new()),
        }
    }

    pub fn broadcaster(&self) -> &Arc<ProgressBroadcaster> {
        &self.broadcaster
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Start a run unless another one holds the lock.
    ///
    /// Must be called within a tokio runtime.
    pub fn start_sync(&self, request: SyncRequest) -> Result<SyncTicket, LockContentionError> {
        let guard = match self.lock.acquire(request.strategy) {
            Ok(guard) => guard,
            Err(e) => {
                tracing::info!(
                    holder = %e.run_id,
                    elapsed_secs = e.elapsed.as_secs(),
                    "Rejected sync request, lock held"
                );
                return Err(e);
            }
        };
        let run_id = guard.run_id();

        let engine = Arc::clone(&self.engine);
        let broadcaster = Arc::clone(&self.broadcaster);
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let run = tokio::spawn({
                let broadcaster = Arc::clone(&broadcaster);
                let request = request.clone();
                async move {
                    let on_progress = broadcaster.callback();
                    engine.run(run_id, &request, Some(&on_progress)).await
                }
            });
            let report = match run.await {
                Ok(report) => report,
                Err(e) => abort_report(run_id, &request, &broadcaster, started, &e),
            };
            drop(guard);
            report
        });

        Ok(SyncTicket { run_id, handle })
    }

    /// [`start_sync`](Self::start_sync) reduced to a serializable reply.
    pub fn trigger(&self, request: SyncRequest) -> StartOutcome {
        StartOutcome::from(&self.start_sync(request))
    }

    /// Current lock holder, if a run is active.
    pub fn active_run(&self) -> Option<LockStatus> {
        self.lock.status()
    }

    /// Count both collections concurrently.
    pub async fn counts(&self) -> CollectionCounts {
        let (source, mirror) = tokio::join!(self.source.count(), self.mirror.count());
        CollectionCounts {
            source: source.as_ref().ok().copied(),
            mirror: mirror.as_ref().ok().copied(),
            source_error: source.err().map(|e| e.to_string()),
            mirror_error: mirror.err().map(|e| e.to_string()),
        }
    }

    pub async fn cache_status(&self) -> CacheStatus {
        self.cache.status().await
    }

    /// Replace the snapshot with a fresh full listing.
    pub async fn refresh_cache(&self) -> Result<CacheStats, SyncError> {
        self.cache.refresh(self.source.as_ref()).await
    }

    pub async fn clear_cache(&self) -> Result<(), CacheError> {
        self.cache.clear().await
    }
}

/// Close out a run whose task died before it could emit its own terminal
/// events. Counts gathered by the dead task are lost.
fn abort_report(
    run_id: Uuid,
    request: &SyncRequest,
    broadcaster: &ProgressBroadcaster,
    started: Instant,
    error: &JoinError,
) -> SyncReport {
    let message = if error.is_panic() {
        "sync run panicked".to_string()
    } else {
        "sync run was cancelled".to_string()
    };
    tracing::error!(run_id = %run_id, error = %error, "Sync task aborted");

    let counts = SyncCounts::default();
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    broadcaster.publish(&SyncEvent::Failed {
        message: message.clone(),
        counts,
    });
    broadcaster.publish(&SyncEvent::Complete {
        message: "Sync failed".to_string(),
        final_counts: counts,
        efficiency: None,
        duration_ms,
    });

    SyncReport {
        run_id,
        strategy: request.strategy,
        counts,
        efficiency: None,
        duration_ms,
        error: Some(message),
    }
}
