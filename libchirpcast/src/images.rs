//! Optional image generation for posts
//!
//! Every failure here is best-effort: providers log and return `None`, and
//! the publisher posts text-only.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ImagesConfig;
use crate::error::{PlatformError, Result};

/// An image produced for a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    /// Raw image bytes, uploaded directly
    Bytes(Vec<u8>),
    /// A remote image, downloaded before upload
    Url(String),
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Image to accompany `text`, if one can be produced
    async fn request_image(&self, text: &str) -> Option<GeneratedImage>;

    /// Fetch the bytes behind a generated image URL
    async fn download(&self, url: &str) -> Option<Vec<u8>>;
}

/// Provider used when image generation is off
pub struct NoImages;

#[async_trait]
impl ImageProvider for NoImages {
    async fn request_image(&self, _text: &str) -> Option<GeneratedImage> {
        None
    }

    async fn download(&self, _url: &str) -> Option<Vec<u8>> {
        None
    }
}

const TECHNICAL_TERMS: &[&str] = &[
    "neural network",
    "machine learning",
    "algorithm",
    "data science",
    "quantitative",
    "trading",
    "finance",
    "backtesting",
    "sharpe ratio",
    "gradient descent",
    "feature engineering",
    "deep learning",
    "model",
    "prediction",
    "analysis",
    "code",
    "programming",
    "statistics",
];

/// Image prompt derived from the post text
///
/// Uses the first entry of the technical term list that occurs in the text,
/// matched case-insensitively.
pub fn image_prompt(text: &str) -> String {
    let lower = text.to_lowercase();
    let subject = TECHNICAL_TERMS
        .iter()
        .find(|term| lower.contains(*term))
        .map(|term| format!("{} concept", term))
        .unwrap_or_else(|| "AI and machine learning".to_string());

    format!(
        "Create a technical visualization of {}, digital art style, professional, clean, modern, technical diagram, futuristic, blue and white color scheme",
        subject
    )
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedEntry>,
}

#[derive(Deserialize)]
struct GeneratedEntry {
    url: Option<String>,
    b64_json: Option<String>,
}

/// x.ai image generation
pub struct GrokImageProvider {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
}

impl GrokImageProvider {
    pub fn new(config: &ImagesConfig, api_key: SecretString, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<GeneratedImage, String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| format!("response unreadable: {}", e))?;
        if !status.is_success() {
            if raw.contains("credits") {
                return Err("account has no image credits".to_string());
            }
            return Err(format!("HTTP {}: {}", status.as_u16(), raw.trim()));
        }

        parse_generation(&raw)
    }
}

fn parse_generation(raw: &str) -> std::result::Result<GeneratedImage, String> {
    let parsed: GenerationResponse =
        serde_json::from_str(raw).map_err(|e| format!("unexpected response: {}", e))?;
    let entry = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| "no image in response".to_string())?;

    if let Some(encoded) = entry.b64_json {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| format!("invalid base64 image: {}", e))?;
        return Ok(GeneratedImage::Bytes(bytes));
    }
    entry
        .url
        .map(GeneratedImage::Url)
        .ok_or_else(|| "no image url in response".to_string())
}

#[async_trait]
impl ImageProvider for GrokImageProvider {
    async fn request_image(&self, text: &str) -> Option<GeneratedImage> {
        let prompt = image_prompt(text);
        debug!("Generating image with prompt: {:?}", prompt);

        match self.generate(&prompt).await {
            Ok(image) => {
                info!("Image generated");
                Some(image)
            }
            Err(e) => {
                warn!("Image generation failed: {}", e);
                None
            }
        }
    }

    async fn download(&self, url: &str) -> Option<Vec<u8>> {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to download image: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("Failed to download image: HTTP {}", response.status().as_u16());
            return None;
        }

        match response.bytes().await {
            Ok(bytes) => {
                debug!("Image downloaded: {} bytes", bytes.len());
                Some(bytes.to_vec())
            }
            Err(e) => {
                warn!("Failed to read image body: {}", e);
                None
            }
        }
    }
}
