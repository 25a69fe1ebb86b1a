//! Reconciliation of the bookmark source into the mirror.
//!
//! # Module Structure
//!
//! - [`types`] - Options and tallies: `SyncRequest`, `SyncCounts`, `SyncReport`, constants
//! - [`progress`] - Stream events: `SyncEvent`, `ProgressCallback`, `emit()`
//! - [`diff`] - Matching and classification: `plan()`, `ReconciliationPlan`
//! - [`engine`] - The full-reset and smart-incremental strategies
//! - [`lock`] - Single-flight run lock
//! - [`broadcast`] - Fan-out of events to live viewers
//! - [`service`] - `SyncService`, the entry point used by the CLI and HTTP server
//!
//! # Example
//!
//! ```ignore
//! use marksync::sync::{EngineConfig, Strategy, SyncRequest, SyncService};
//!
//! let service = SyncService::new(source, mirror, cache, EngineConfig::default());
//! let ticket = service.start_sync(SyncRequest::new(Strategy::SmartIncremental))?;
//! let report = ticket.wait().await?;
//! println!("{} created, {} updated", report.counts.created, report.counts.updated);
//! ```

pub mod broadcast;
pub mod diff;
pub mod engine;
mod filter;
pub mod lock;
mod progress;
pub mod service;
mod types;

// Re-export types
pub use types::{
    EngineConfig, Strategy, SyncCounts, SyncError, SyncReport, SyncRequest, efficiency,
};

// Re-export constants
pub use types::{
    DEFAULT_BATCH_PACING, DEFAULT_BATCH_SIZE, DEFAULT_DAYS_BACK, DEFAULT_ITEM_PACING,
    DEFAULT_STALE_LOCK,
};

// Re-export progress types
pub use progress::{ItemAction, ProgressCallback, SyncEvent, emit};

pub use broadcast::ProgressBroadcaster;
pub use diff::{
    MirrorIndex, ReconciliationPlan, normalize_title, normalize_url, plan, sanitize_tag,
};
pub use engine::SyncEngine;
pub use filter::{cutoff_before, filter_created_since, recent_cutoff};
pub use lock::{LockContentionError, LockGuard, LockStatus, SyncLock};
pub use service::{CollectionCounts, StartOutcome, SyncService, SyncTicket};
