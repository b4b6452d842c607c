//! Twitter/X platform implementation
//!
//! Requests are signed with OAuth 1.0a (HMAC-SHA1) user-context credentials.
//! Posts go through the v2 `POST /2/tweets` endpoint; images are uploaded
//! first through the v1.1 media endpoint and referenced by media id.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha1::Sha1;
use tracing::{debug, info};

use crate::config::{TwitterConfig, TwitterCredentials};
use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::types::ImageMimeType;

type HmacSha1 = Hmac<Sha1>;

/// Maximum characters in a single post
pub const TWEET_LIMIT: usize = 280;

/// Map a rejected Twitter response to a PlatformError
///
/// The body is checked before the status code: Twitter reports duplicate
/// content with a 403, which would otherwise read as an auth failure.
pub fn classify_response(status: u16, body: &str) -> PlatformError {
    let detail = error_detail(body);
    let lower = body.to_lowercase();

    if lower.contains("duplicate") {
        return PlatformError::Duplicate(detail);
    }
    if lower.contains("too long") || lower.contains("length") {
        return PlatformError::Length(detail);
    }

    match status {
        401 | 403 => PlatformError::Authentication(format!(
            "Twitter rejected the credentials (HTTP {}): {}. Check the TWITTER_* variables.",
            status, detail
        )),
        429 => PlatformError::RateLimit(format!(
            "Twitter rate limit exceeded: {}. Please wait before trying again.",
            detail
        )),
        _ => PlatformError::Posting(format!("Twitter returned HTTP {}: {}", status, detail)),
    }
}

/// Best human-readable message in a Twitter error body
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: Option<String>,
        title: Option<String>,
        #[serde(default)]
        errors: Vec<ErrorEntry>,
    }

    #[derive(Deserialize)]
    struct ErrorEntry {
        message: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed
            .detail
            .or_else(|| parsed.errors.into_iter().find_map(|e| e.message))
            .or(parsed.title)
        {
            return message;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// RFC 3986 percent-encoding as OAuth 1.0a requires
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// OAuth 1.0a request signer
pub struct OAuthSigner {
    credentials: TwitterCredentials,
}

impl OAuthSigner {
    pub fn new(credentials: TwitterCredentials) -> Self {
        Self { credentials }
    }

    /// `Authorization` header for a request with a fresh nonce and timestamp
    ///
    /// `params` are the query or form parameters that take part in the
    /// signature; JSON and multipart bodies do not.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<String> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, params, &nonce, &timestamp)
    }

    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let mut oauth: BTreeMap<&str, String> = BTreeMap::new();
        oauth.insert(
            "oauth_consumer_key",
            self.credentials.api_key.expose_secret().to_string(),
        );
        oauth.insert("oauth_nonce", nonce.to_string());
        oauth.insert("oauth_signature_method", "HMAC-SHA1".to_string());
        oauth.insert("oauth_timestamp", timestamp.to_string());
        oauth.insert(
            "oauth_token",
            self.credentials.access_token.expose_secret().to_string(),
        );
        oauth.insert("oauth_version", "1.0".to_string());

        let mut all: Vec<(String, String)> = oauth
            .iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .chain(
                params
                    .iter()
                    .map(|(k, v)| (percent_encode(k), percent_encode(v))),
            )
            .collect();
        all.sort();

        let signature = self.sign(method, url, &all)?;
        oauth.insert("oauth_signature", signature);

        let fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }

    /// HMAC-SHA1 over the signature base string, base64 encoded
    ///
    /// `encoded_params` must already be percent-encoded and sorted.
    fn sign(&self, method: &str, url: &str, encoded_params: &[(String, String)]) -> Result<String> {
        let param_string = encoded_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let base = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(url),
            percent_encode(&param_string)
        );
        let key = format!(
            "{}&{}",
            percent_encode(self.credentials.api_secret.expose_secret()),
            percent_encode(self.credentials.access_secret.expose_secret())
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| PlatformError::Authentication(format!("Invalid signing key: {}", e)))?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

#[derive(Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

/// Twitter/X API client
pub struct TwitterClient {
    http: reqwest::Client,
    signer: OAuthSigner,
    api_base: String,
    upload_base: String,
}

impl TwitterClient {
    /// Create a client from the `[twitter]` config section and credentials
    pub fn new(config: &TwitterConfig, credentials: TwitterCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("chirpcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            signer: OAuthSigner::new(credentials),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
        })
    }

    fn network_error(e: reqwest::Error) -> PlatformError {
        PlatformError::Network(format!("Twitter request failed: {}", e))
    }
}

#[async_trait]
impl Platform for TwitterClient {
    async fn post(&self, text: &str, media_id: Option<&str>) -> Result<String> {
        let url = format!("{}/2/tweets", self.api_base);
        let mut body = serde_json::json!({ "text": text });
        if let Some(id) = media_id {
            body["media"] = serde_json::json!({ "media_ids": [id] });
        }

        let auth = self.signer.authorization_header("POST", &url, &[])?;
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, auth)
            .json(&body)
            .send()
            .await
            .map_err(Self::network_error)?;

        let status = response.status();
        let raw = response.text().await.map_err(Self::network_error)?;
        if !status.is_success() {
            debug!("Twitter rejected post with HTTP {}: {}", status, raw);
            return Err(classify_response(status.as_u16(), &raw).into());
        }

        let created: CreateTweetResponse = serde_json::from_str(&raw).map_err(|e| {
            PlatformError::Posting(format!("Unexpected response from Twitter: {}", e))
        })?;
        info!("Posted tweet {}", created.data.id);
        Ok(created.data.id)
    }

    async fn upload_media(&self, bytes: &[u8], mime: ImageMimeType) -> Result<String> {
        let url = format!("{}/1.1/media/upload.json", self.upload_base);

        let part = Part::bytes(bytes.to_vec())
            .file_name(format!("image.{}", mime.extension()))
            .mime_str(mime.as_str())
            .map_err(|e| PlatformError::Media(format!("Invalid media type {}: {}", mime, e)))?;
        let form = Form::new()
            .text("media_category", "tweet_image")
            .part("media", part);

        let auth = self.signer.authorization_header("POST", &url, &[])?;
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, auth)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PlatformError::Media(format!("Upload request failed: {}", e)))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| PlatformError::Media(format!("Upload response unreadable: {}", e)))?;
        if !status.is_success() {
            return Err(PlatformError::Media(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_detail(&raw)
            ))
            .into());
        }

        let uploaded: MediaUploadResponse = serde_json::from_str(&raw)
            .map_err(|e| PlatformError::Media(format!("Unexpected upload response: {}", e)))?;
        debug!("Uploaded {} bytes of {} as media {}", bytes.len(), mime, uploaded.media_id_string);
        Ok(uploaded.media_id_string)
    }

    fn name(&self) -> &str {
        "twitter"
    }

    fn character_limit(&self) -> usize {
        TWEET_LIMIT
    }
}
