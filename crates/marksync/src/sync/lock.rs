//! Process-wide single-flight lock for sync runs.
//!
//! The lock records which run holds it, so contention errors and logs can
//! name the holder. A holder older than the stale threshold can be replaced
//! by a new run; the old run keeps going but can no longer release the lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use super::types::Strategy;

/// Identity of the run currently holding the lock.
#[derive(Debug, Clone)]
pub struct LockHolder {
    pub run_id: Uuid,
    pub strategy: Strategy,
    pub started_at: Instant,
}

/// Snapshot of the current holder for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockStatus {
    pub run_id: Uuid,
    pub strategy: Strategy,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// A run was rejected because another run holds the lock.
#[derive(Debug, Clone, Error)]
#[error("sync already running ({strategy} run {run_id}, {}s elapsed)", .elapsed.as_secs())]
pub struct LockContentionError {
    pub run_id: Uuid,
    pub strategy: Strategy,
    pub elapsed: Duration,
}

/// Single-flight lock with a run identity token.
#[derive(Debug, Clone)]
pub struct SyncLock {
    holder: Arc<Mutex<Option<LockHolder>>>,
    stale_after: Duration,
}

fn lock_slot(slot: &Mutex<Option<LockHolder>>) -> MutexGuard<'_, Option<LockHolder>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncLock {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            holder: Arc::new(Mutex::new(None)),
            stale_after,
        }
    }

    /// Take the lock for a new run.
    ///
    /// Fails while another run holds it, unless that run has held it for
    /// longer than the stale threshold.
    pub fn acquire(&self, strategy: Strategy) -> Result<LockGuard, LockContentionError> {
        let mut slot = lock_slot(&self.holder);

        if let Some(current) = slot.as_ref() {
            let elapsed = current.started_at.elapsed();
            if elapsed <= self.stale_after {
                return Err(LockContentionError {
                    run_id: current.run_id,
                    strategy: current.strategy,
                    elapsed,
                });
            }
            tracing::warn!(
                stale_run_id = %current.run_id,
                elapsed_secs = elapsed.as_secs(),
                "Overriding stale sync lock"
            );
        }

        let run_id = Uuid::new_v4();
        *slot = Some(LockHolder {
            run_id,
            strategy,
            started_at: Instant::now(),
        });
        tracing::debug!(run_id = %run_id, strategy = %strategy, "Sync lock acquired");

        Ok(LockGuard {
            holder: Arc::clone(&self.holder),
            run_id,
        })
    }

    /// The current holder, if any.
    pub fn status(&self) -> Option<LockStatus> {
        lock_slot(&self.holder).as_ref().map(|h| LockStatus {
            run_id: h.run_id,
            strategy: h.strategy,
            elapsed: h.started_at.elapsed(),
        })
    }

    pub fn is_locked(&self) -> bool {
        lock_slot(&self.holder).is_some()
    }
}

/// Releases the lock on drop if this run still owns it.
#[derive(Debug)]
pub struct LockGuard {
    holder: Arc<Mutex<Option<LockHolder>>>,
    run_id: Uuid,
}

impl LockGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let mut slot = lock_slot(&self.holder);
        if slot.as_ref().is_some_and(|h| h.run_id == self.run_id) {
            *slot = None;
            tracing::debug!(run_id = %self.run_id, "Sync lock released");
        }
    }
}
