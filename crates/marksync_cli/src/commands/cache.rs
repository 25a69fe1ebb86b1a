//! Snapshot cache management.

use clap::Subcommand;
use console::{Term, style};

use crate::commands::shared::{OutputFormat, format_age, print_json, raindrop_client, snapshot_cache};
use crate::config::Config;

/// Cache subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum CacheAction {
    /// Fetch every bookmark from Raindrop and store a fresh snapshot
    Refresh,
    /// Show whether a snapshot exists and is still fresh
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Delete the snapshot
    Clear,
}

/// Handle cache commands.
pub(crate) async fn handle_cache(
    action: CacheAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let is_tty = Term::stdout().is_term();
    let cache = snapshot_cache(config);

    match action {
        CacheAction::Refresh => {
            let source = raindrop_client(config)?;
            if is_tty {
                println!("Fetching bookmarks from Raindrop...");
            }
            let stats = cache.refresh(&source).await?;
            if is_tty {
                println!(
                    "{} Cached {} bookmarks ({} KB) in {:.1}s",
                    style("✓").green(),
                    stats.item_count,
                    stats.size_bytes / 1024,
                    stats.duration_ms as f64 / 1000.0
                );
            } else {
                tracing::info!(
                    item_count = stats.item_count,
                    size_bytes = stats.size_bytes,
                    duration_ms = stats.duration_ms,
                    "Snapshot refreshed"
                );
            }
        }
        CacheAction::Status { output } => {
            let status = cache.status().await;
            match output {
                OutputFormat::Json => print_json(&status)?,
                OutputFormat::Text => {
                    println!("Cache directory: {}", cache.dir().display());
                    if !status.exists {
                        println!("No snapshot. Run 'marksync cache refresh' to create one.");
                    } else {
                        let freshness = if status.valid {
                            style("fresh").green()
                        } else {
                            style("expired").red()
                        };
                        println!("Snapshot:        {}", freshness);
                        if let Some(count) = status.item_count {
                            println!("Bookmarks:       {}", count);
                        }
                        if let Some(age) = status.age_minutes {
                            println!("Age:             {}", format_age(age));
                        }
                    }
                }
            }
        }
        CacheAction::Clear => {
            cache.clear().await?;
            if is_tty {
                println!("{} Snapshot cleared", style("✓").green());
            } else {
                tracing::info!(dir = %cache.dir().display(), "Snapshot cleared");
            }
        }
    }

    Ok(())
}
