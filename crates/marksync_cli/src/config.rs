//! Configuration file support for marksync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `MARKSYNC_`, sections separated by
//!    a double underscore, e.g. `MARKSYNC_NOTION__DATABASE_ID`)
//! 3. Config file (./marksync.toml, then ~/.config/marksync/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [raindrop]
//! token = "..."          # or MARKSYNC_RAINDROP__TOKEN
//! collection_id = 0      # 0 = all bookmarks
//!
//! [notion]
//! token = "secret_..."   # or MARKSYNC_NOTION__TOKEN
//! database_id = "..."
//! title_property = "Name"
//!
//! [cache]
//! ttl_hours = 6
//!
//! [sync]
//! days_back = 30
//! batch_size = 10
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! password = "..."
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use marksync::notion::PropertyNames;
use marksync::retry::{INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, RetryConfig};
use marksync::sync::EngineConfig;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub raindrop: RaindropConfig,
    pub notion: NotionConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
    pub server: ServerConfig,
}

/// Raindrop.io configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RaindropConfig {
    /// API test token.
    pub token: Option<String>,
    /// Collection to mirror; 0 means all bookmarks.
    pub collection_id: i64,
    pub page_size: usize,
    /// Pause before every Raindrop request.
    pub pacing_ms: u64,
}

impl Default for RaindropConfig {
    fn default() -> Self {
        Self {
            token: None,
            collection_id: 0,
            page_size: marksync::raindrop::PAGE_SIZE,
            pacing_ms: 0,
        }
    }
}

/// Notion configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    /// Integration token.
    pub token: Option<String>,
    pub database_id: Option<String>,
    pub title_property: String,
    pub url_property: String,
    pub tags_property: String,
    /// Pause before every Notion request. Notion allows about 3 requests per second.
    pub pacing_ms: u64,
    /// Attach cover images to created and updated pages.
    pub attach_images: bool,
}

impl Default for NotionConfig {
    fn default() -> Self {
        let names = PropertyNames::default();
        Self {
            token: None,
            database_id: None,
            title_property: names.title,
            url_property: names.url,
            tags_property: names.tags,
            pacing_ms: 350,
            attach_images: true,
        }
    }
}

/// Snapshot cache configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Defaults to `<state dir>/cache`.
    pub dir: Option<PathBuf>,
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_hours: 6,
        }
    }
}

/// Sync pacing and defaults.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub item_pacing_ms: u64,
    pub batch_pacing_ms: u64,
    pub batch_size: usize,
    pub days_back: u32,
    pub stale_lock_minutes: u64,
    /// Retry budget for rate-limited and failed API calls.
    pub max_retries: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            item_pacing_ms: 200,
            batch_pacing_ms: 1_500,
            batch_size: 10,
            days_back: 30,
            stale_lock_minutes: 15,
            max_retries: 5,
        }
    }
}

/// Dashboard server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Shared secret required as `?password=` on every API route.
    pub password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            password: None,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/marksync/config.toml)
    /// 3. Local config file (./marksync.toml)
    /// 4. Environment variables with MARKSYNC_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("marksync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./marksync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., MARKSYNC_NOTION__DATABASE_ID -> notion.database_id
        builder = builder.add_source(Self::environment());

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    fn environment() -> Environment {
        Environment::with_prefix("MARKSYNC")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "marksync").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/marksync` or `~/.local/state/marksync`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "marksync").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }

    /// Snapshot directory, falling back to the state directory, then `./.marksync-cache`.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .or_else(|| Self::default_state_dir().map(|d| d.join("cache")))
            .unwrap_or_else(|| PathBuf::from(".marksync-cache"))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_hours.saturating_mul(60 * 60))
    }

    pub fn property_names(&self) -> PropertyNames {
        PropertyNames {
            title: self.notion.title_property.clone(),
            url: self.notion.url_property.clone(),
            tags: self.notion.tags_property.clone(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            item_pacing: Duration::from_millis(self.sync.item_pacing_ms),
            batch_pacing: Duration::from_millis(self.sync.batch_pacing_ms),
            batch_size: self.sync.batch_size.max(1),
            days_back: self.sync.days_back,
            stale_lock_after: Duration::from_secs(self.sync.stale_lock_minutes.saturating_mul(60)),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            Duration::from_millis(INITIAL_BACKOFF_MS),
            Duration::from_millis(MAX_BACKOFF_MS),
            self.sync.max_retries,
        )
    }
}
