//! Helpers shared by the command handlers: building clients from
//! configuration and rendering output.

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use marksync::notion::NotionClient;
use marksync::raindrop::RaindropClient;
use marksync::snapshot::SnapshotCache;
use marksync::sync::SyncService;

use crate::config::Config;

/// Output format for status commands.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// Display as JSON
    Json,
}

fn required<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, Box<dyn std::error::Error>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| message.into())
}

/// Build the Raindrop client from configuration.
pub(crate) fn raindrop_client(config: &Config) -> Result<RaindropClient, Box<dyn std::error::Error>> {
    let token = required(
        config.raindrop.token.as_deref(),
        "No Raindrop token configured. Set MARKSYNC_RAINDROP__TOKEN or [raindrop] token in marksync.toml.",
    )?;

    Ok(RaindropClient::new(token, config.raindrop.collection_id)?
        .with_page_size(config.raindrop.page_size)
        .with_pacing(Duration::from_millis(config.raindrop.pacing_ms))
        .with_retry(config.retry_config()))
}

/// Build the Notion client from configuration.
pub(crate) fn notion_client(config: &Config) -> Result<NotionClient, Box<dyn std::error::Error>> {
    let token = required(
        config.notion.token.as_deref(),
        "No Notion token configured. Set MARKSYNC_NOTION__TOKEN or [notion] token in marksync.toml.",
    )?;
    let database_id = required(
        config.notion.database_id.as_deref(),
        "No Notion database configured. Set MARKSYNC_NOTION__DATABASE_ID or [notion] database_id in marksync.toml.",
    )?;

    Ok(NotionClient::new(token, database_id)?
        .with_pacing(Duration::from_millis(config.notion.pacing_ms))
        .with_retry(config.retry_config())
        .with_properties(config.property_names())
        .with_images(config.notion.attach_images))
}

pub(crate) fn snapshot_cache(config: &Config) -> SnapshotCache {
    SnapshotCache::new(config.cache_dir(), config.cache_ttl())
}

/// Wire both clients, the cache and the engine settings into a service.
pub(crate) fn build_service(config: &Config) -> Result<Arc<SyncService>, Box<dyn std::error::Error>> {
    let source = raindrop_client(config)?;
    let mirror = notion_client(config)?;
    tracing::debug!(
        collection_id = config.raindrop.collection_id,
        database_id = %mirror.database_id(),
        cache_dir = %config.cache_dir().display(),
        "Building sync service"
    );

    Ok(Arc::new(SyncService::new(
        Arc::new(source),
        Arc::new(mirror),
        Arc::new(snapshot_cache(config)),
        config.engine_config(),
    )))
}

/// Print a value as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format an age in minutes in a human-readable way.
pub(crate) fn format_age(minutes: i64) -> String {
    if minutes < 60 {
        format!("{}m", minutes)
    } else {
        let hours = minutes / 60;
        let mins = minutes % 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}
