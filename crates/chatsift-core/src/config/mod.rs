//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Largest page that still leaves room for the header card in a 50-result answer
pub const MAX_PAGE_SIZE: u32 = 49;

/// chatsift configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub ingest: IngestConfig,
    pub search: SearchConfig,
    pub format: FormatConfig,
    pub cache: CacheConfig,
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Edits arriving later than this after the original send time are ignored
    pub edit_window_secs: u64,
    /// Id of the account that relays searches; its own relayed messages are not indexed
    pub self_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// IANA zone used for hit timestamps
    pub time_zone: String,
    /// Scheme and host of deep links, without trailing slash
    pub link_base: String,
    /// Sticker shown to requesters without any membership
    pub unauthorized_sticker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub result_secs: u32,
    pub sentinel_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub reply_ttl_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: crate::storage::default_database_path(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            edit_window_secs: 2 * 24 * 60 * 60,
            self_id: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            time_zone: "Asia/Taipei".to_string(),
            link_base: "https://t.me".to_string(),
            unauthorized_sticker:
                "CAACAgUAAxkDAAEFBIhjffVfXIFyngE4vR2Zg_uDkDS41gACMAsAAoB48FdrYCP5TE3CEh4E"
                    .to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            result_secs: 15,
            sentinel_secs: 300,
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self { reply_ttl_secs: 10 }
    }
}

impl IngestConfig {
    pub fn edit_window(&self) -> Duration {
        Duration::from_secs(self.edit_window_secs)
    }
}

impl FormatConfig {
    /// Resolve the configured time zone
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid time zone '{}': {}", self.time_zone, e))
    }
}

impl ModerationConfig {
    pub fn reply_ttl(&self) -> Duration {
        Duration::from_secs(self.reply_ttl_secs)
    }
}

const KEYS: &[&str] = &[
    "database.path",
    "ingest.edit_window_secs",
    "ingest.self_id",
    "search.page_size",
    "format.time_zone",
    "format.link_base",
    "format.unauthorized_sticker",
    "cache.result_secs",
    "cache.sentinel_secs",
    "moderation.reply_ttl_secs",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CHATSIFT_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("chatsift")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or fall back to defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config = Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "Loaded configuration");
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.search.page_size) {
            return Err(anyhow!(
                "search.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            ));
        }
        if i64::try_from(self.ingest.edit_window_secs).is_err() {
            return Err(anyhow!(
                "ingest.edit_window_secs must be at most {}",
                i64::MAX
            ));
        }
        self.format.tz()?;
        if !self.format.link_base.contains("://") {
            return Err(anyhow!(
                "format.link_base must include a scheme, e.g. https://t.me"
            ));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "database.path" => Ok(self.database.path.display().to_string()),
            "ingest.edit_window_secs" => Ok(self.ingest.edit_window_secs.to_string()),
            "ingest.self_id" => Ok(self
                .ingest
                .self_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "(not set)".to_string())),
            "search.page_size" => Ok(self.search.page_size.to_string()),
            "format.time_zone" => Ok(self.format.time_zone.clone()),
            "format.link_base" => Ok(self.format.link_base.clone()),
            "format.unauthorized_sticker" => Ok(self.format.unauthorized_sticker.clone()),
            "cache.result_secs" => Ok(self.cache.result_secs.to_string()),
            "cache.sentinel_secs" => Ok(self.cache.sentinel_secs.to_string()),
            "moderation.reply_ttl_secs" => Ok(self.moderation.reply_ttl_secs.to_string()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `chatsift config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "database.path" => {
                self.database.path = PathBuf::from(value);
            }
            "ingest.edit_window_secs" => {
                self.ingest.edit_window_secs = value
                    .parse()
                    .with_context(|| format!("Invalid edit_window_secs value: {}", value))?;
            }
            "ingest.self_id" => {
                self.ingest.self_id = if value.is_empty() {
                    None
                } else {
                    Some(
                        value
                            .parse()
                            .with_context(|| format!("Invalid self_id value: {}", value))?,
                    )
                };
            }
            "search.page_size" => {
                let size: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid page_size value: {}", value))?;
                if !(1..=MAX_PAGE_SIZE).contains(&size) {
                    return Err(anyhow!("Page size must be between 1 and {}", MAX_PAGE_SIZE));
                }
                self.search.page_size = size;
            }
            "format.time_zone" => {
                value
                    .parse::<Tz>()
                    .map_err(|e| anyhow!("Invalid time zone '{}': {}", value, e))?;
                self.format.time_zone = value.to_string();
            }
            "format.link_base" => {
                self.format.link_base = value.trim_end_matches('/').to_string();
            }
            "format.unauthorized_sticker" => {
                self.format.unauthorized_sticker = value.to_string();
            }
            "cache.result_secs" => {
                self.cache.result_secs = value
                    .parse()
                    .with_context(|| format!("Invalid result_secs value: {}", value))?;
            }
            "cache.sentinel_secs" => {
                self.cache.sentinel_secs = value
                    .parse()
                    .with_context(|| format!("Invalid sentinel_secs value: {}", value))?;
            }
            "moderation.reply_ttl_secs" => {
                self.moderation.reply_ttl_secs = value
                    .parse()
                    .with_context(|| format!("Invalid reply_ttl_secs value: {}", value))?;
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `chatsift config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }
}
