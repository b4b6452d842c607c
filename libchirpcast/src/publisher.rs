//! Publishing with bounded recovery
//!
//! One call to [`Publisher::publish`] is a chain of attempts:
//!
//! - a duplicate rejection discards the text and tries again with fresh
//!   content, at most `max_depth` times before giving up with `Ok(None)`
//! - a length rejection of over-limit text retries once with the text cut to
//!   the platform limit
//! - every other failure ends the chain with the error
//!
//! A successful post is appended to the history log. Image attachment is
//! best-effort and never fails a post.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::content::{truncate_with_ellipsis, ContentProvider};
use crate::error::{PlatformError, Result};
use crate::images::{GeneratedImage, ImageProvider};
use crate::platforms::Platform;
use crate::store::Store;
use crate::types::{ImageMimeType, PostRecord};

/// Duplicate retries allowed after the first attempt
pub const MAX_DUPLICATE_RETRIES: u32 = 3;

/// Duplicate-retry bookkeeping for one publish chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySession {
    depth: u32,
    max_depth: u32,
}

impl Default for RetrySession {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrySession {
    pub fn new() -> Self {
        Self::with_max_depth(MAX_DUPLICATE_RETRIES)
    }

    pub fn with_max_depth(max_depth: u32) -> Self {
        Self {
            depth: 0,
            max_depth,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Count one more duplicate retry, `false` once the budget is spent
    fn try_advance(&mut self) -> bool {
        if self.depth < self.max_depth {
            self.depth += 1;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.depth = 0;
    }
}

pub struct Publisher {
    store: Arc<Store>,
    content: ContentProvider,
    platform: Arc<dyn Platform>,
    images: Arc<dyn ImageProvider>,
}

impl Publisher {
    pub fn new(
        store: Arc<Store>,
        content: ContentProvider,
        platform: Arc<dyn Platform>,
        images: Arc<dyn ImageProvider>,
    ) -> Self {
        Self {
            store,
            content,
            platform,
            images,
        }
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// Publish `text`, or freshly selected content when `None`
    ///
    /// Returns the record of the successful post, or `Ok(None)` when the
    /// duplicate retry budget ran out.
    ///
    /// # Errors
    ///
    /// Returns the platform error for authentication, rate limit and other
    /// non-recoverable failures, and for a length failure that truncation
    /// cannot fix. `session` is reset whenever the chain ends.
    pub async fn publish(
        &self,
        text: Option<String>,
        session: &mut RetrySession,
    ) -> Result<Option<PostRecord>> {
        let limit = self.platform.character_limit();
        let mut pending = text;
        let mut truncated = false;

        loop {
            let text = match pending.take() {
                Some(text) => text,
                None => self.content.select_content().await,
            };
            let media_id = self.attach_image(&text).await;

            let err = match self.platform.post(&text, media_id.as_deref()).await {
                Ok(id) => {
                    session.reset();
                    let record = PostRecord::new(text, id);
                    info!(id = %record.id, platform = self.platform.name(), "Posted");
                    self.record(&record).await;
                    return Ok(Some(record));
                }
                Err(err) => err,
            };

            match err.as_platform() {
                Some(PlatformError::Duplicate(reason)) => {
                    if session.try_advance() {
                        warn!(
                            "Duplicate content ({}), retrying with fresh content ({}/{})",
                            reason,
                            session.depth(),
                            session.max_depth()
                        );
                        continue;
                    }
                    warn!(
                        "Still duplicate after {} retries, skipping this cycle",
                        session.max_depth()
                    );
                    session.reset();
                    return Ok(None);
                }
                Some(PlatformError::Length(reason))
                    if !truncated && text.chars().count() > limit =>
                {
                    warn!("Content too long ({}), retrying truncated to {}", reason, limit);
                    truncated = true;
                    pending = Some(truncate_with_ellipsis(&text, limit));
                    continue;
                }
                _ => {
                    error!("Posting failed: {}", err);
                    session.reset();
                    return Err(err);
                }
            }
        }
    }

    /// Upload a generated image for `text`, returning its media id
    async fn attach_image(&self, text: &str) -> Option<String> {
        let bytes = match self.images.request_image(text).await? {
            GeneratedImage::Bytes(bytes) => bytes,
            GeneratedImage::Url(url) => {
                debug!("Downloading image from {}", url);
                self.images.download(&url).await?
            }
        };
        if bytes.is_empty() {
            warn!("Generated image is empty, posting text only");
            return None;
        }

        let mime = ImageMimeType::sniff(&bytes);
        match self.platform.upload_media(&bytes, mime).await {
            Ok(media_id) => {
                debug!("Attached media {}", media_id);
                Some(media_id)
            }
            Err(e) => {
                warn!("Image upload failed, posting text only: {}", e);
                None
            }
        }
    }

    async fn record(&self, record: &PostRecord) {
        match self.store.append_history(record.clone()).await {
            Ok(len) => debug!("History now holds {} posts", len),
            Err(e) => error!("Posted {} but failed to record history: {}", record.id, e),
        }
    }
}
