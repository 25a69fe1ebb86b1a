//! Fan-out of sync events to live viewers.
//!
//! Each viewer gets its own bounded channel and the run never waits on one.
//! A viewer whose receiver is gone, or whose buffer is full, is unsubscribed
//! on the next publish. A dropped lagging viewer drains what it already has
//! and then sees its stream end, so it never waits for a `Complete` that
//! will not arrive. There is no replay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use super::progress::{ProgressCallback, SyncEvent};

/// Events buffered per viewer before it is cut off.
pub const VIEWER_BUFFER: usize = 256;

type Viewers = HashMap<Uuid, mpsc::Sender<SyncEvent>>;

/// Broadcasts events to every subscribed viewer.
#[derive(Debug, Default)]
pub struct ProgressBroadcaster {
    viewers: Mutex<Viewers>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn viewers(&self) -> MutexGuard<'_, Viewers> {
        self.viewers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a viewer and return its event stream.
    ///
    /// Re-subscribing an id replaces its previous stream.
    pub fn subscribe(&self, viewer_id: Uuid) -> mpsc::Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel(VIEWER_BUFFER);
        let count = {
            let mut viewers = self.viewers();
            viewers.insert(viewer_id, tx);
            viewers.len()
        };
        tracing::debug!(viewer_id = %viewer_id, viewers = count, "Viewer subscribed");
        rx
    }

    /// Returns false if the viewer was not subscribed.
    pub fn unsubscribe(&self, viewer_id: Uuid) -> bool {
        let removed = self.viewers().remove(&viewer_id).is_some();
        if removed {
            tracing::debug!(viewer_id = %viewer_id, "Viewer unsubscribed");
        }
        removed
    }

    /// Deliver `event` to every viewer; returns how many received it.
    pub fn publish(&self, event: &SyncEvent) -> usize {
        let mut viewers = self.viewers();
        let mut delivered = 0;

        viewers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    viewer_id = %id,
                    buffer = VIEWER_BUFFER,
                    "Viewer lagging, unsubscribed"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(viewer_id = %id, "Viewer disconnected, unsubscribed");
                false
            }
        });

        delivered
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers().len()
    }

    /// A progress callback that publishes through this broadcaster.
    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let broadcaster = Arc::clone(self);
        Box::new(move |event| {
            broadcaster.publish(&event);
        })
    }
}
