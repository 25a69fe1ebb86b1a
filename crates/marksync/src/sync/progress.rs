//! Progress events emitted during a sync run.
//!
//! Events are delivered to viewers in emission order. Every run ends with a
//! [`SyncEvent::Complete`], preceded by [`SyncEvent::Failed`] when the run
//! could not finish.

use serde::{Deserialize, Serialize};

use super::types::SyncCounts;

/// Which mirror mutation an [`SyncEvent::ItemResult`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Create,
    Update,
    Archive,
}

impl ItemAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemAction::Create => "create",
            ItemAction::Update => "update",
            ItemAction::Archive => "archive",
        }
    }
}

/// A progress event, serialized with a `type` tag for the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Free-form status line.
    Info { message: String },

    /// Position within the current phase.
    Progress {
        message: String,
        current: usize,
        total: usize,
    },

    /// Outcome of one create, update, or archive call.
    ItemResult {
        message: String,
        action: ItemAction,
        success: bool,
        title: String,
        counts: SyncCounts,
    },

    /// The run hit an unrecoverable error. Counts are partial.
    Failed { message: String, counts: SyncCounts },

    /// Terminal event of every run.
    Complete {
        message: String,
        final_counts: SyncCounts,
        #[serde(skip_serializing_if = "Option::is_none")]
        efficiency: Option<f64>,
        duration_ms: u64,
    },
}

impl SyncEvent {
    pub fn info(message: impl Into<String>) -> Self {
        SyncEvent::Info {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SyncEvent::Info { message }
            | SyncEvent::Progress { message, .. }
            | SyncEvent::ItemResult { message, .. }
            | SyncEvent::Failed { message, .. }
            | SyncEvent::Complete { message, .. } => message,
        }
    }

    /// The serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::Info { .. } => "info",
            SyncEvent::Progress { .. } => "progress",
            SyncEvent::ItemResult { .. } => "item_result",
            SyncEvent::Failed { .. } => "failed",
            SyncEvent::Complete { .. } => "complete",
        }
    }

    /// True for the last event a run emits.
    pub fn is_complete(&self) -> bool {
        matches!(self, SyncEvent::Complete { .. })
    }
}

/// Callback invoked for every event of a run.
pub type ProgressCallback = Box<dyn Fn(SyncEvent) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncEvent) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
