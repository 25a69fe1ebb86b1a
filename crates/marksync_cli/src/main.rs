//! Marksync CLI - mirror Raindrop.io bookmarks into a Notion database.

mod commands;
mod config;
mod progress;
mod server;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::cache::CacheAction;
use crate::commands::shared::OutputFormat;
use crate::commands::sync::SyncAction;

#[derive(Parser)]
#[command(name = "marksync")]
#[command(version)]
#[command(about = "Mirror Raindrop.io bookmarks into a Notion database")]
#[command(
    long_about = "Marksync keeps a Notion database in step with a Raindrop.io bookmark \
collection. A full sync archives every page and recreates the mirror; a smart sync \
only creates and updates what changed among recent bookmarks. A dashboard server \
exposes the same operations over HTTP with a live progress stream."
)]
#[command(after_long_help = r#"EXAMPLES
    Rebuild the whole mirror:
        $ marksync sync full

    Sync bookmarks from the last week:
        $ marksync sync smart --days-back 7

    Take a snapshot, then sync from it without hitting Raindrop again:
        $ marksync cache refresh
        $ marksync sync smart --use-cache

    Run the dashboard API:
        $ marksync serve --bind 0.0.0.0:3000

CONFIGURATION
    Marksync reads configuration from:
      1. ~/.config/marksync/config.toml (or $XDG_CONFIG_HOME/marksync/config.toml)
      2. ./marksync.toml
      3. Environment variables (MARKSYNC_* prefix, sections separated by "__")
      4. .env file in current directory

ENVIRONMENT VARIABLES
    MARKSYNC_RAINDROP__TOKEN         Raindrop.io API token
    MARKSYNC_RAINDROP__COLLECTION_ID Collection to mirror (default: 0, all bookmarks)
    MARKSYNC_NOTION__TOKEN           Notion integration token
    MARKSYNC_NOTION__DATABASE_ID     Target Notion database
    MARKSYNC_CACHE__DIR              Snapshot directory (default: ~/.local/state/marksync/cache)
    MARKSYNC_SERVER__PASSWORD        Shared secret for the dashboard API
    RUST_LOG                         Log filter (default: marksync=info,marksync_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Manage the local bookmark snapshot
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show bookmark and page counts
    Counts {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Run the dashboard API server
    Serve {
        /// Address to listen on (default from config or 127.0.0.1:3000)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Serving is always logged; interactive commands log only off-TTY.
    let serving = matches!(cli.command, Commands::Serve { .. });
    if serving || !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("marksync=info,marksync_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Completions { shell } => commands::meta::handle_completions(shell),
        Commands::Man { output } => commands::meta::handle_man(output),
        command => {
            // Load configuration (config files -> env vars -> defaults)
            let config = config::Config::load();

            match command {
                Commands::Sync { action } => commands::sync::handle_sync(action, &config).await,
                Commands::Cache { action } => commands::cache::handle_cache(action, &config).await,
                Commands::Counts { output } => {
                    commands::counts::handle_counts(output, &config).await
                }
                Commands::Serve { bind } => commands::serve::handle_serve(bind, &config).await,
                Commands::Completions { .. } | Commands::Man { .. } => Ok(()),
            }
        }
    }
}
