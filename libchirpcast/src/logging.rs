//! Log output for the bot
//!
//! Events go to stderr and, unless disabled, are also appended to the log
//! file in the data directory (`bot.log`). The `[logging]` section picks the
//! format and level; `CHIRPCAST_LOG_FORMAT` / `CHIRPCAST_LOG_LEVEL` override
//! it and `RUST_LOG` overrides both.
//!
//! ```no_run
//! use libchirpcast::logging::LogSettings;
//! use libchirpcast::Config;
//!
//! # fn main() -> libchirpcast::Result<()> {
//! let config = Config::load()?;
//! LogSettings::resolve(&config, false)?.install()?;
//! # Ok(())
//! # }
//! ```

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{ConfigError, Result};

pub const LOG_FORMAT_ENV: &str = "CHIRPCAST_LOG_FORMAT";
pub const LOG_LEVEL_ENV: &str = "CHIRPCAST_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain lines, no target
    Text,
    /// One JSON object per event
    Json,
    /// Multi-line output with source locations
    Pretty,
}

impl LogFormat {
    const ALL: [LogFormat; 3] = [LogFormat::Text, LogFormat::Json, LogFormat::Pretty];

    pub fn name(self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.name() == wanted)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                reason: format!("'{}' is not one of text, json, pretty", s),
            })
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved logging setup for one process
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub directive: String,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Combine the config file, the environment and `--verbose`
    pub fn resolve(config: &Config, verbose: bool) -> Result<Self> {
        let format = match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) => value.parse()?,
            Err(_) => config.logging.format.parse()?,
        };

        let directive = if verbose {
            "debug".to_string()
        } else {
            std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| config.logging.level.clone())
        };

        Ok(Self {
            format,
            directive,
            file: config.log_file(),
        })
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.directive))
    }

    /// Log file opened for appending; a file that cannot be opened is
    /// reported on stderr and skipped
    fn open_file(&self) -> Option<File> {
        let path = self.file.as_ref()?;
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Install the global subscriber
    ///
    /// Fails when a subscriber is already installed.
    pub fn install(&self) -> Result<()> {
        let file = self.open_file();
        let ansi = file.is_none();
        let writer = match file {
            Some(file) => BoxMakeWriter::new(std::io::stderr.and(Mutex::new(file))),
            None => BoxMakeWriter::new(std::io::stderr),
        };

        let installed = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(self.filter())
                .with_writer(writer)
                .flatten_event(true)
                .with_current_span(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(self.filter())
                .with_writer(writer)
                .with_ansi(ansi)
                .with_file(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(self.filter())
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false)
                .try_init(),
        };

        installed.map_err(|e| {
            ConfigError::InvalidValue {
                field: "logging".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}
