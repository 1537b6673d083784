//! Transport error types

use thiserror::Error;

/// A remote call that did not produce a usable response
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Timeout, message)
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Status(code), message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Decode, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Remote, message)
    }
}

/// Error classification, used for diagnostics only (the client never retries)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connection refused, reset, DNS failure
    Network,
    Timeout,
    /// Non-2xx response
    Status(u16),
    /// Response body did not match the expected shape
    Decode,
    /// The service reported a failure inside an otherwise valid response
    Remote,
}

impl ApiErrorKind {
    /// Whether the same call might succeed if repeated later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network | Self::Timeout => true,
            Self::Status(code) => *code == 429 || *code >= 500,
            Self::Decode | Self::Remote => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::timeout(e.to_string())
        } else if e.is_decode() {
            ApiError::decode(e.to_string())
        } else if let Some(status) = e.status() {
            ApiError::status(status.as_u16(), e.to_string())
        } else {
            ApiError::network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::decode(e.to_string())
    }
}
