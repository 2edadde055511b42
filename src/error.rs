//! Error types for ingest-relay
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// Substrings (lowercase) that mark a transformation error as throttling.
const RATE_LIMIT_SIGNATURES: &[&str] = &[
    "resource_exhausted",
    "rate limit",
    "ratelimit",
    "quota exceeded",
    "too many requests",
];

/// The main error type for ingest-relay
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Max retries ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Decoding Errors
    // ============================================================================
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Feed parsing error: {message}")]
    FeedParse { message: String },

    // ============================================================================
    // Connector Errors
    // ============================================================================
    #[error("Discovery failed for source '{source_handle}': {message}")]
    Discovery {
        source_handle: String,
        message: String,
    },

    #[error("Transformation failed: {message}")]
    Transform { message: String },

    #[error("Document store error: {message}")]
    Store { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },
}

impl Error {
    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a feed parse error
    pub fn feed(message: impl Into<String>) -> Self {
        Self::FeedParse {
            message: message.into(),
        }
    }

    /// Create a discovery error for a source handle
    pub fn discovery(source_handle: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            source_handle: source_handle.into(),
            message: message.into(),
        }
    }

    /// Create a transformation error
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform {
            message: message.into(),
        }
    }

    /// Create a document store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Check if this error signals throttling by the remote service.
    ///
    /// This is the only failure class the transformation driver backs off on.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::HttpStatus { status: 429, .. } => true,
            other => {
                let text = other.to_string().to_lowercase();
                RATE_LIMIT_SIGNATURES.iter().any(|sig| text.contains(sig))
            }
        }
    }

    /// Check if this error means the remote resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::HttpStatus { status: 404, .. })
    }
}

/// Result type alias for ingest-relay
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_value("store.fragment_max", "must be > 0");
        assert_eq!(
            err.to_string(),
            "Invalid config value for 'store.fragment_max': must be > 0"
        );

        let err = Error::missing_field("NOTION_API_KEY");
        assert_eq!(
            err.to_string(),
            "Missing required config field: NOTION_API_KEY"
        );

        let err = Error::discovery("@vidiq", "boom");
        assert_eq!(
            err.to_string(),
            "Discovery failed for source '@vidiq': boom"
        );
    }

    #[test_case(Error::RateLimited { retry_after_seconds: 1 }, true ; "explicit rate limit")]
    #[test_case(Error::http_status(429, ""), true ; "status 429")]
    #[test_case(Error::http_status(400, r#"{"status":"RESOURCE_EXHAUSTED"}"#), true ; "resource exhausted body")]
    #[test_case(Error::transform("Quota exceeded for model"), true ; "quota message")]
    #[test_case(Error::transform("Rate limit reached"), true ; "rate limit message")]
    #[test_case(Error::http_status(500, "internal"), false ; "server error")]
    #[test_case(Error::transform("video is private"), false ; "other transform error")]
    #[test_case(Error::Timeout { timeout_ms: 10 }, false ; "timeout")]
    fn test_is_rate_limited(err: Error, expected: bool) {
        assert_eq!(err.is_rate_limited(), expected);
    }
}
