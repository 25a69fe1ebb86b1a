//! Sync options, outcome tallies, and defaults.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::api::ApiError;
use crate::snapshot::CacheError;

/// Pause between individual mutation calls.
pub const DEFAULT_ITEM_PACING: Duration = Duration::from_millis(200);

/// Pause between batches in the full-reset strategy.
pub const DEFAULT_BATCH_PACING: Duration = Duration::from_millis(1_500);

/// Mutations per batch in the full-reset strategy.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Recent window for the smart strategy.
pub const DEFAULT_DAYS_BACK: u32 = 30;

/// A lock held longer than this may be overridden by a new run.
pub const DEFAULT_STALE_LOCK: Duration = Duration::from_secs(15 * 60);

/// Which reconciliation strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Archive every mirror page, then recreate from the source.
    #[serde(alias = "full")]
    FullReset,
    /// Diff recently created source items against the mirror.
    #[serde(alias = "smart")]
    SmartIncremental,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::FullReset => "full-reset",
            Strategy::SmartIncremental => "smart-incremental",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "full-reset" | "reset" => Ok(Strategy::FullReset),
            "smart" | "smart-incremental" | "incremental" => Ok(Strategy::SmartIncremental),
            other => Err(format!("unknown sync strategy '{other}'")),
        }
    }
}

/// A request to start a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub strategy: Strategy,
    /// Cap on source items considered.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Override of the smart strategy's recent window.
    #[serde(default)]
    pub days_back: Option<u32>,
    /// Read source items from the snapshot cache instead of the network.
    #[serde(default)]
    pub use_cache: bool,
}

impl SyncRequest {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            limit: None,
            days_back: None,
            use_cache: false,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_days_back(mut self, days_back: Option<u32>) -> Self {
        self.days_back = days_back;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// Running outcome tally for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
    pub archived: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Final summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub strategy: Strategy,
    pub counts: SyncCounts,
    /// Percentage of recent items that needed no action (smart strategy only).
    pub efficiency: Option<f64>,
    pub duration_ms: u64,
    /// Set when the run ended in the failed state.
    pub error: Option<String>,
}

impl SyncReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Pacing and batching policy for mutation phases.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub item_pacing: Duration,
    pub batch_pacing: Duration,
    pub batch_size: usize,
    pub days_back: u32,
    pub stale_lock_after: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            item_pacing: DEFAULT_ITEM_PACING,
            batch_pacing: DEFAULT_BATCH_PACING,
            batch_size: DEFAULT_BATCH_SIZE,
            days_back: DEFAULT_DAYS_BACK,
            stale_lock_after: DEFAULT_STALE_LOCK,
        }
    }
}

/// Failures that end a run or a service operation.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("could not fetch source items: {0}")]
    SourceFetch(#[source] ApiError),

    #[error("could not fetch mirror pages: {0}")]
    MirrorFetch(#[source] ApiError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("sync task failed: {0}")]
    Internal(String),
}

/// Percentage of `total` items that needed no create or update.
///
/// An empty window counts as fully efficient.
pub fn efficiency(actions: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (1.0 - actions as f64 / total as f64) * 100.0
}
