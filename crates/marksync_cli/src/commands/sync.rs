//! Run a sync from the command line.
//!
//! The run goes through the same single-flight service the dashboard uses;
//! the terminal subscribes as one more viewer of the event stream.

use clap::{Args, Subcommand};
use console::{Term, style};
use marksync::sync::{Strategy, SyncRequest};
use uuid::Uuid;

use crate::commands::shared::build_service;
use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::shutdown::shutdown_signal;

/// Options shared by both strategies.
#[derive(Debug, Clone, Args)]
pub(crate) struct CommonSyncOptions {
    /// Only consider the first N bookmarks
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Read bookmarks from the snapshot cache instead of Raindrop
    #[arg(short = 'c', long)]
    use_cache: bool,
}

/// Sync subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum SyncAction {
    /// Archive every mirror page, then recreate one per bookmark
    Full {
        #[command(flatten)]
        opts: CommonSyncOptions,
    },
    /// Create and update only what changed among recent bookmarks
    Smart {
        /// Consider bookmarks created within this many days (default from config or 30)
        #[arg(short = 'd', long)]
        days_back: Option<u32>,

        #[command(flatten)]
        opts: CommonSyncOptions,
    },
}

impl SyncAction {
    fn into_request(self) -> SyncRequest {
        match self {
            SyncAction::Full { opts } => SyncRequest::new(Strategy::FullReset)
                .with_limit(opts.limit)
                .with_cache(opts.use_cache),
            SyncAction::Smart { days_back, opts } => SyncRequest::new(Strategy::SmartIncremental)
                .with_limit(opts.limit)
                .with_days_back(days_back)
                .with_cache(opts.use_cache),
        }
    }
}

/// Handle sync commands.
pub(crate) async fn handle_sync(
    action: SyncAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let is_tty = Term::stdout().is_term();
    let request = action.into_request();
    let service = build_service(config)?;

    let mut viewer = service.broadcaster().subscribe(Uuid::new_v4());
    let ticket = service.start_sync(request)?;
    let reporter = ProgressReporter::new();

    let follow = async {
        while let Some(event) = viewer.recv().await {
            reporter.handle(&event);
            if event.is_complete() {
                break;
            }
        }
    };

    tokio::select! {
        _ = follow => {}
        _ = shutdown_signal() => {
            reporter.finish();
            return Err("Sync interrupted; the mirror may be partially updated".into());
        }
    }
    reporter.finish();

    let report = ticket.wait().await?;
    if let Some(error) = report.error {
        return Err(format!("Sync failed: {}", error).into());
    }

    if report.counts.failed > 0 {
        if is_tty {
            eprintln!(
                "{} {} item(s) failed, see messages above",
                style("⚠").yellow(),
                report.counts.failed
            );
        } else {
            tracing::warn!(failed = report.counts.failed, "Some items failed to sync");
        }
    }

    Ok(())
}
