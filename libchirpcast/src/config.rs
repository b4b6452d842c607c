//! Configuration management for Chirpcast
//!
//! Settings live in a TOML file; every section is optional and falls back to
//! the defaults below. Credentials are never read from the file, only from the
//! environment (optionally populated from `bot.env` / `.env`).

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

pub const CONFIG_ENV: &str = "CHIRPCAST_CONFIG";

pub const TWITTER_API_KEY: &str = "TWITTER_API_KEY";
pub const TWITTER_API_SECRET: &str = "TWITTER_API_SECRET";
pub const TWITTER_ACCESS_TOKEN: &str = "TWITTER_ACCESS_TOKEN";
pub const TWITTER_ACCESS_SECRET: &str = "TWITTER_ACCESS_SECRET";
pub const GROK_API_KEY: &str = "GROK_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.local/share/chirpcast".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file, relative paths resolve against the data directory
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> Option<String> {
    Some("bot.log".to_string())
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA timezone the daily times are expressed in
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Fixed tick, e.g. "5m"; `None` disables it
    #[serde(default = "default_interval")]
    pub interval: Option<String>,
    /// Daily posting times as "HH:MM"
    #[serde(default = "default_daily")]
    pub daily: Vec<String>,
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_interval() -> Option<String> {
    Some("5m".to_string())
}

fn default_daily() -> Vec<String> {
    ["09:00", "12:00", "17:00", "20:00"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            interval: default_interval(),
            daily: default_daily(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_image_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_image_model")]
    pub model: String,
}

fn default_true() -> bool {
    true
}

fn default_image_endpoint() -> String {
    "https://api.x.ai/v1/images/generations".to_string()
}

fn default_image_model() -> String {
    "grok-2-image".to_string()
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_image_endpoint(),
            model: default_image_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_upload_base")]
    pub upload_base: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.twitter.com".to_string()
}

fn default_upload_base() -> String {
    "https://upload.twitter.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            upload_base: default_upload_base(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file at the default location yields the default config. A
    /// path given through `CHIRPCAST_CONFIG` must exist.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(shellexpand::tilde(&path).to_string());
            return Self::load_from_path(&path);
        }

        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// The expanded data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.data_dir).to_string())
    }

    /// The expanded log file path, if file logging is on
    pub fn log_file(&self) -> Option<PathBuf> {
        let file = self.logging.file.as_ref()?;
        let path = PathBuf::from(shellexpand::tilde(file).to_string());
        if path.is_absolute() {
            Some(path)
        } else {
            Some(self.data_dir().join(path))
        }
    }
}

/// Resolve the configuration file path under the platform config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("chirpcast").join("config.toml"))
}

/// Populate the process environment from `bot.env` and `.env`
///
/// Variables already set in the environment win over both files.
pub fn load_env_files() {
    for file in ["bot.env", ".env"] {
        if dotenvy::from_filename(file).is_ok() {
            tracing::debug!("Loaded environment from {}", file);
        }
    }
}

/// OAuth 1.0a user-context credentials for the Twitter API
#[derive(Debug)]
pub struct TwitterCredentials {
    pub api_key: SecretString,
    pub api_secret: SecretString,
    pub access_token: SecretString,
    pub access_secret: SecretString,
}

impl TwitterCredentials {
    /// Read credentials from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary lookup
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingCredentials` naming every variable that
    /// is unset or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let api_key = read(TWITTER_API_KEY);
        let api_secret = read(TWITTER_API_SECRET);
        let access_token = read(TWITTER_ACCESS_TOKEN);
        let access_secret = read(TWITTER_ACCESS_SECRET);

        match (api_key, api_secret, access_token, access_secret) {
            (Some(api_key), Some(api_secret), Some(access_token), Some(access_secret)) => Ok(Self {
                api_key: SecretString::from(api_key),
                api_secret: SecretString::from(api_secret),
                access_token: SecretString::from(access_token),
                access_secret: SecretString::from(access_secret),
            }),
            (api_key, api_secret, access_token, access_secret) => {
                let missing: Vec<&str> = [
                    (TWITTER_API_KEY, api_key.is_none()),
                    (TWITTER_API_SECRET, api_secret.is_none()),
                    (TWITTER_ACCESS_TOKEN, access_token.is_none()),
                    (TWITTER_ACCESS_SECRET, access_secret.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(ConfigError::MissingCredentials(missing.join(", ")).into())
            }
        }
    }
}

/// Optional key for the x.ai image endpoint
pub fn grok_api_key() -> Option<SecretString> {
    std::env::var(GROK_API_KEY)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}
