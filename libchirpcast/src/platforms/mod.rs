//! Platform abstraction and implementations
//!
//! The publisher talks to a social platform only through [`Platform`]. The
//! real client lives in [`twitter`]; [`mock`] provides a scripted fake for
//! tests.
//!
//! # Examples
//!
//! ```no_run
//! use libchirpcast::config::{TwitterConfig, TwitterCredentials};
//! use libchirpcast::platforms::{Platform, twitter::TwitterClient};
//!
//! # async fn example() -> libchirpcast::error::Result<()> {
//! let credentials = TwitterCredentials::from_env()?;
//! let client = TwitterClient::new(&TwitterConfig::default(), credentials)?;
//!
//! let post_id = client.post("Hello from the bot", None).await?;
//! println!("Posted {} on {}", post_id, client.name());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ImageMimeType;

pub mod twitter;

// Available outside tests so the binary's integration tests can use it
pub mod mock;

/// A social platform the bot publishes to
///
/// Failures are reported as [`crate::error::PlatformError`] wrapped in
/// [`crate::error::ChirpcastError::Platform`], classified so the publisher
/// can tell duplicate and length rejections from terminal ones.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Publish `text`, optionally with previously uploaded media
    ///
    /// Returns the platform-assigned post id.
    ///
    /// # Errors
    ///
    /// - `PlatformError::Duplicate` if the platform rejects repeated content
    /// - `PlatformError::Length` if the text exceeds the platform limit
    /// - `PlatformError::Authentication` or `PlatformError::RateLimit`
    /// - `PlatformError::Network` or `PlatformError::Posting` otherwise
    async fn post(&self, text: &str, media_id: Option<&str>) -> Result<String>;

    /// Upload image bytes, returning a media id for [`Platform::post`]
    async fn upload_media(&self, bytes: &[u8], mime: ImageMimeType) -> Result<String>;

    /// Lowercase platform identifier (e.g. "twitter")
    fn name(&self) -> &str;

    /// Maximum post length in characters
    fn character_limit(&self) -> usize;
}
