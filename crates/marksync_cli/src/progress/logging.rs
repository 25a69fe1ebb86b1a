use marksync::sync::SyncEvent;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Info { message } => {
                tracing::info!("{}", message);
            }

            SyncEvent::Progress {
                message,
                current,
                total,
            } => {
                tracing::info!(current, total, "{}", message);
            }

            SyncEvent::ItemResult {
                message,
                action,
                success,
                title,
                ..
            } => {
                if *success {
                    tracing::debug!(action = action.as_str(), title = %title, "{}", message);
                } else {
                    tracing::warn!(action = action.as_str(), title = %title, "{}", message);
                }
            }

            SyncEvent::Failed { message, counts } => {
                tracing::error!(
                    created = counts.created,
                    updated = counts.updated,
                    archived = counts.archived,
                    failed = counts.failed,
                    "{}",
                    message
                );
            }

            SyncEvent::Complete {
                message,
                final_counts,
                efficiency,
                duration_ms,
            } => {
                tracing::info!(
                    created = final_counts.created,
                    updated = final_counts.updated,
                    archived = final_counts.archived,
                    skipped = final_counts.skipped,
                    failed = final_counts.failed,
                    efficiency = ?efficiency,
                    duration_ms,
                    "{}",
                    message
                );
            }
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
