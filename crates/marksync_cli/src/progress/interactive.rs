use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use marksync::sync::{ItemAction, SyncCounts, SyncEvent};

/// Bar for the mutation phase currently running.
struct PhaseBar {
    bar: ProgressBar,
    action: ItemAction,
    ok: usize,
    failed: usize,
}

/// Consolidated progress state to avoid multiple mutex locks.
#[derive(Default)]
struct ProgressState {
    /// Spinner showing the latest status line.
    status: Option<ProgressBar>,
    phase: Option<PhaseBar>,
}

/// Interactive progress reporter using indicatif.
///
/// A status spinner tracks phase messages; each run of archive, create or
/// update results gets its own counter bar that is finished when the next
/// phase starts.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, event: &SyncEvent) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match event {
            SyncEvent::Info { message } => {
                self.status_bar(&mut state).set_message(message.clone());
            }

            SyncEvent::Progress {
                message,
                current,
                total,
            } => {
                self.status_bar(&mut state)
                    .set_message(format!("{message} ({current}/{total})"));
            }

            SyncEvent::ItemResult {
                action,
                success,
                title,
                ..
            } => {
                if state.phase.as_ref().is_none_or(|p| p.action != *action) {
                    Self::finish_phase(&mut state);
                    state.phase = Some(self.phase_bar(*action));
                }
                if let Some(phase) = state.phase.as_mut() {
                    phase.bar.inc(1);
                    if *success {
                        phase.ok += 1;
                        phase.bar.set_message(title.clone());
                    } else {
                        phase.failed += 1;
                        phase.bar.set_message(format!("✗ {title}"));
                    }
                }
            }

            SyncEvent::Failed { message, .. } => {
                drop(state);
                self.multi.println(format!("✗ {message}")).ok();
            }

            SyncEvent::Complete {
                message,
                final_counts,
                efficiency,
                ..
            } => {
                Self::finish_phase(&mut state);
                let summary = summary(message, final_counts, *efficiency);
                if let Some(status) = state.status.take() {
                    status.finish_with_message(summary);
                }
            }
        }
    }

    /// Finish all progress bars.
    pub fn finish(&self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Self::finish_phase(&mut state);
        if let Some(status) = state.status.take()
            && !status.is_finished()
        {
            status.finish();
        }
    }

    fn status_bar<'a>(&self, state: &'a mut ProgressState) -> &'a ProgressBar {
        state.status.get_or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(Self::spinner_style());
            bar.set_prefix(format!("{:10}", "Sync"));
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        })
    }

    fn phase_bar(&self, action: ItemAction) -> PhaseBar {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::counter_style());
        bar.set_prefix(format!("{:10}", phase_label(action)));
        bar.enable_steady_tick(Duration::from_millis(100));
        PhaseBar {
            bar,
            action,
            ok: 0,
            failed: 0,
        }
    }

    fn finish_phase(state: &mut ProgressState) {
        if let Some(phase) = state.phase.take() {
            let msg = if phase.failed > 0 {
                format!("✓ {} done, {} failed", phase.ok, phase.failed)
            } else {
                format!("✓ {} done", phase.ok)
            };
            phase.bar.finish_with_message(msg);
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn counter_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {pos:>4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn phase_label(action: ItemAction) -> &'static str {
    match action {
        ItemAction::Create => "Creating",
        ItemAction::Update => "Updating",
        ItemAction::Archive => "Archiving",
    }
}

fn summary(message: &str, counts: &SyncCounts, efficiency: Option<f64>) -> String {
    let mut parts = vec![format!(
        "{} created, {} updated, {} archived",
        counts.created, counts.updated, counts.archived
    )];
    if counts.skipped > 0 {
        parts.push(format!("{} skipped", counts.skipped));
    }
    if counts.failed > 0 {
        parts.push(format!("{} failed", counts.failed));
    }
    if let Some(efficiency) = efficiency {
        parts.push(format!("{efficiency:.1}% efficient"));
    }
    format!("{message}: {}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_omits_zero_extras() {
        let counts = SyncCounts {
            created: 3,
            archived: 2,
            ..SyncCounts::default()
        };
        assert_eq!(
            summary("Sync complete", &counts, None),
            "Sync complete: 3 created, 0 updated, 2 archived"
        );
    }

    #[test]
    fn test_summary_includes_efficiency_and_failures() {
        let counts = SyncCounts {
            created: 1,
            skipped: 1,
            failed: 2,
            ..SyncCounts::default()
        };
        assert_eq!(
            summary("Sync complete", &counts, Some(50.0)),
            "Sync complete: 1 created, 0 updated, 0 archived, 1 skipped, 2 failed, 50.0% efficient"
        );
    }

    #[test]
    fn test_reporter_tracks_phase_changes() {
        let reporter = InteractiveReporter::new();
        let counts = SyncCounts::default();
        for (action, success) in [
            (ItemAction::Archive, true),
            (ItemAction::Archive, false),
            (ItemAction::Create, true),
        ] {
            reporter.handle(&SyncEvent::ItemResult {
                message: String::new(),
                action,
                success,
                title: "t".to_string(),
                counts,
            });
        }

        let state = reporter.state.lock().unwrap();
        let phase = state.phase.as_ref().unwrap();
        assert_eq!(phase.action, ItemAction::Create);
        assert_eq!(phase.ok, 1);
        assert_eq!(phase.failed, 0);
    }
}
