//! Error types for Chirpcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChirpcastError>;

#[derive(Error, Debug)]
pub enum ChirpcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ChirpcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ChirpcastError::InvalidInput(_) => 3,
            ChirpcastError::Platform(PlatformError::Authentication(_)) => 2,
            ChirpcastError::Platform(_) => 1,
            ChirpcastError::Config(_) => 1,
            ChirpcastError::Storage(_) => 1,
        }
    }

    /// The platform failure behind this error, if any
    pub fn as_platform(&self) -> Option<&PlatformError> {
        match self {
            ChirpcastError::Platform(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Missing required environment variables: {0}")]
    MissingCredentials(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed document {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document not found: {0}")]
    NotFound(String),
}

/// Failures reported by a social platform
///
/// The variants are the classification the publisher acts on: duplicate and
/// length failures are recoverable, everything else is terminal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Duplicate content: {0}")]
    Duplicate(String),

    #[error("Content too long: {0}")]
    Length(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Media upload failed: {0}")]
    Media(String),

    #[error("Posting failed: {0}")]
    Posting(String),
}

impl PlatformError {
    /// Whether the publisher may recover from this failure locally
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlatformError::Duplicate(_) | PlatformError::Length(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = ChirpcastError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = ChirpcastError::Platform(PlatformError::Authentication(
            "Invalid token".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_errors() {
        let rate_limit = ChirpcastError::Platform(PlatformError::RateLimit("429".to_string()));
        assert_eq!(rate_limit.exit_code(), 1);

        let config = ChirpcastError::Config(ConfigError::MissingCredentials(
            "TWITTER_API_KEY".to_string(),
        ));
        assert_eq!(config.exit_code(), 1);

        let storage = ChirpcastError::Storage(StoreError::NotFound("content".to_string()));
        assert_eq!(storage.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting() {
        let error = ChirpcastError::Platform(PlatformError::Duplicate(
            "You are not allowed to create a Tweet with duplicate content.".to_string(),
        ));
        assert_eq!(
            error.to_string(),
            "Platform error: Duplicate content: You are not allowed to create a Tweet with duplicate content."
        );

        let config = ConfigError::MissingCredentials("TWITTER_API_KEY, TWITTER_API_SECRET".to_string());
        assert_eq!(
            config.to_string(),
            "Missing required environment variables: TWITTER_API_KEY, TWITTER_API_SECRET"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(PlatformError::Duplicate("dup".to_string()).is_recoverable());
        assert!(PlatformError::Length("long".to_string()).is_recoverable());
        assert!(!PlatformError::Authentication("auth".to_string()).is_recoverable());
        assert!(!PlatformError::RateLimit("slow down".to_string()).is_recoverable());
        assert!(!PlatformError::Posting("boom".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_conversion_from_platform_error() {
        let err: ChirpcastError = PlatformError::Network("timeout".to_string()).into();
        assert_eq!(
            err.as_platform(),
            Some(&PlatformError::Network("timeout".to_string()))
        );
    }
}
