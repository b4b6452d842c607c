//! Chirpcast - a scheduled posting bot for Twitter/X
//!
//! This library holds the bot's logic: content selection, the publish and
//! retry chain, persistent documents, the platform client and scheduling.
//! The `chirp-bot` binary is a thin operator CLI over [`Bot`].

pub mod bot;
pub mod config;
pub mod content;
pub mod error;
pub mod images;
pub mod logging;
pub mod platforms;
pub mod publisher;
pub mod scheduling;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use bot::Bot;
pub use config::Config;
pub use content::ContentProvider;
pub use error::{ChirpcastError, PlatformError, Result};
pub use publisher::{Publisher, RetrySession};
pub use scheduling::Schedule;
pub use store::Store;
pub use types::{BotStats, ContentLibrary, GenerationConfig, HistoryLog, PostRecord};
