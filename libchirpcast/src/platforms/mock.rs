//! Mock platform implementation for testing
//!
//! A configurable fake that replays a script of post outcomes, optionally
//! enforces its character limit, and records every call. It needs no network
//! access or credentials, so the publisher and the CLI can be exercised end
//! to end.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::types::ImageMimeType;

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name (e.g., "mock-twitter")
    pub name: String,

    /// Character limit reported to the publisher
    pub character_limit: usize,

    /// Reject posts longer than the limit with `PlatformError::Length`
    pub enforce_limit: bool,

    /// Outcomes for successive post calls; empty means success
    pub script: Arc<Mutex<VecDeque<Option<PlatformError>>>>,

    /// Error for every post once the script runs out
    pub post_error: Option<PlatformError>,

    /// Error for every media upload
    pub upload_error: Option<PlatformError>,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Number of times post has been called
    pub post_call_count: Arc<Mutex<usize>>,

    /// Number of times upload_media has been called
    pub upload_call_count: Arc<Mutex<usize>>,

    /// Texts and media ids that were posted successfully
    pub posted: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            character_limit: 280,
            enforce_limit: false,
            script: Arc::new(Mutex::new(VecDeque::new())),
            post_error: None,
            upload_error: None,
            delay: Duration::from_millis(0),
            post_call_count: Arc::new(Mutex::new(0)),
            upload_call_count: Arc::new(Mutex::new(0)),
            posted: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock platform for testing
pub struct MockPlatform {
    config: MockConfig,
}

impl MockPlatform {
    /// Create a new mock platform with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock platform that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock platform whose posts always fail with `error`
    pub fn post_failure(name: &str, error: PlatformError) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            post_error: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock platform that replays `outcomes` for successive posts
    ///
    /// `None` entries succeed. Posts after the script runs out succeed.
    pub fn scripted(name: &str, outcomes: Vec<Option<PlatformError>>) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            script: Arc::new(Mutex::new(outcomes.into())),
            ..Default::default()
        })
    }

    /// Create a mock platform that rejects posts over `limit` characters
    pub fn with_limit(name: &str, limit: usize) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            character_limit: limit,
            enforce_limit: true,
            ..Default::default()
        })
    }

    /// Create a mock platform with a delay
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    /// Make every media upload fail
    pub fn failing_uploads(mut self, error: PlatformError) -> Self {
        self.config.upload_error = Some(error);
        self
    }

    /// Get the number of times post was called
    pub fn post_call_count(&self) -> usize {
        *self.config.post_call_count.lock().unwrap()
    }

    /// Get the number of times upload_media was called
    pub fn upload_call_count(&self) -> usize {
        *self.config.upload_call_count.lock().unwrap()
    }

    /// Get all texts that were posted
    pub fn posted_content(&self) -> Vec<String> {
        self.config
            .posted
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    /// Get the media id attached to each successful post
    pub fn posted_media(&self) -> Vec<Option<String>> {
        self.config
            .posted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, media)| media.clone())
            .collect()
    }

    /// Shared handle on the recorded posts, usable after the platform moves
    pub fn posted_handle(&self) -> Arc<Mutex<Vec<(String, Option<String>)>>> {
        Arc::clone(&self.config.posted)
    }

    /// Shared handle on the post call counter
    pub fn post_count_handle(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.config.post_call_count)
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn post(&self, text: &str, media_id: Option<&str>) -> Result<String> {
        let call = {
            let mut count = self.config.post_call_count.lock().unwrap();
            *count += 1;
            *count
        };

        // Simulate delay
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        let scripted = self.config.script.lock().unwrap().pop_front();
        let outcome = match scripted {
            Some(outcome) => outcome,
            None => self.config.post_error.clone(),
        };
        if let Some(error) = outcome {
            return Err(error.into());
        }

        let length = text.chars().count();
        if self.config.enforce_limit && length > self.config.character_limit {
            return Err(PlatformError::Length(format!(
                "Content exceeds {} character limit (got {} characters)",
                self.config.character_limit, length
            ))
            .into());
        }

        self.config
            .posted
            .lock()
            .unwrap()
            .push((text.to_string(), media_id.map(String::from)));

        Ok(format!("{}-{}", self.config.name, call))
    }

    async fn upload_media(&self, bytes: &[u8], mime: ImageMimeType) -> Result<String> {
        let call = {
            let mut count = self.config.upload_call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if let Some(error) = &self.config.upload_error {
            return Err(error.clone().into());
        }
        if bytes.is_empty() {
            return Err(PlatformError::Media("Empty upload".to_string()).into());
        }

        Ok(format!("{}-media-{}.{}", self.config.name, call, mime.extension()))
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn character_limit(&self) -> usize {
        self.config.character_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChirpcastError;

    #[tokio::test]
    async fn test_mock_success() {
        let platform = MockPlatform::success("test");

        assert_eq!(platform.name(), "test");
        assert_eq!(platform.character_limit(), 280);

        let post_id = platform.post("Test content", None).await.unwrap();
        assert_eq!(post_id, "test-1");
        assert_eq!(platform.post_call_count(), 1);

        let posted = platform.posted_content();
        assert_eq!(posted, vec!["Test content"]);
    }

    #[tokio::test]
    async fn test_mock_ids_are_unique() {
        let platform = MockPlatform::success("test");
        let a = platform.post("one", None).await.unwrap();
        let b = platform.post("two", None).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_mock_post_failure() {
        let platform =
            MockPlatform::post_failure("test", PlatformError::Network("connection reset".into()));

        let result = platform.post("Test content", None).await;
        assert!(matches!(
            result,
            Err(ChirpcastError::Platform(PlatformError::Network(_)))
        ));
        assert_eq!(platform.post_call_count(), 1);
        assert!(platform.posted_content().is_empty());
    }

    #[tokio::test]
    async fn test_mock_script_replays_in_order() {
        let platform = MockPlatform::scripted(
            "test",
            vec![Some(PlatformError::Duplicate("dup".into())), None],
        );

        assert!(platform.post("first", None).await.is_err());
        assert!(platform.post("second", None).await.is_ok());
        // Script exhausted
        assert!(platform.post("third", None).await.is_ok());
        assert_eq!(platform.posted_content(), vec!["second", "third"]);
    }

    #[tokio::test]
    async fn test_mock_with_character_limit() {
        let platform = MockPlatform::with_limit("test", 10);

        assert!(platform.post("Short", None).await.is_ok());

        let result = platform.post("This is way too long", None).await;
        match result {
            Err(ChirpcastError::Platform(PlatformError::Length(msg))) => {
                assert!(msg.contains("character limit"))
            }
            other => panic!("Expected length error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let platform = MockPlatform::with_delay("test", Duration::from_millis(50));

        let start = std::time::Instant::now();
        platform.post("Test", None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_mock_media() {
        let platform = MockPlatform::success("test");
        let media = platform
            .upload_media(&[0x89, b'P', b'N', b'G'], ImageMimeType::Png)
            .await
            .unwrap();
        assert_eq!(media, "test-media-1.png");

        platform.post("with image", Some(&media)).await.unwrap();
        assert_eq!(platform.posted_media(), vec![Some(media)]);

        let failing = MockPlatform::success("test")
            .failing_uploads(PlatformError::Media("boom".into()));
        assert!(failing.upload_media(b"x", ImageMimeType::Jpeg).await.is_err());
        assert_eq!(failing.upload_call_count(), 1);
    }
}
