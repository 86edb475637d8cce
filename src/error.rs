//! Error types for the GEVER client

use reqwest::StatusCode;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for GEVER client operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Message attached to a failing resource request when the caller gives none
pub const REQUEST_FAILED_MESSAGE: &str = "Request to GEVER failed.";

/// Message attached to a failing token exchange
pub const AUTHORIZATION_FAILED_MESSAGE: &str =
    "An error occurred while acquiring the GEVER token. Maybe your API key is corrupt or invalid.";

/// The original cause of a failed HTTP exchange.
///
/// Renders like a `raise_for_status` message when the backend answered with a
/// status code (`"404 Client Error: Not Found for url: ..."`), otherwise as the
/// transport error detail.
#[derive(Debug)]
pub struct RequestFailure {
    pub status: Option<StatusCode>,
    pub url: String,
    /// Response body as sent by the backend, if there was one
    pub body: Option<String>,
    pub detail: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RequestFailure {
    /// A response with a non-2xx status code
    pub fn status(status: StatusCode, url: impl Into<String>, body: Option<String>) -> Self {
        let body = body.filter(|b| !b.trim().is_empty());
        Self {
            status: Some(status),
            url: url.into(),
            body,
            detail: status.canonical_reason().unwrap_or("Unknown").to_string(),
            source: None,
        }
    }

    /// The request never produced a response
    pub fn transport(url: impl Into<String>, err: reqwest::Error) -> Self {
        Self {
            status: err.status(),
            url: url.into(),
            body: None,
            detail: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Any other failure while talking to `url`
    pub fn other(
        url: impl Into<String>,
        detail: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            status: None,
            url: url.into(),
            body: None,
            detail: detail.into(),
            source,
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.source) {
            (Some(status), None) => {
                let side = if status.is_server_error() {
                    "Server Error"
                } else {
                    "Client Error"
                };
                write!(
                    f,
                    "{} {}: {} for url: {}",
                    status.as_u16(),
                    side,
                    self.detail,
                    self.url
                )
            }
            _ => f.write_str(&self.detail),
        }
    }
}

impl std::error::Error for RequestFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// GEVER client error types
#[derive(Debug, Error)]
pub enum ApiError {
    /// No service key is configured for the requested URL
    #[error(
        "No GEVER service key found for URL {url}.\nFound keys {known_base_urls:?} in paths {key_dirs:?}"
    )]
    ServiceKeyMissing {
        url: String,
        known_base_urls: Vec<String>,
        key_dirs: Vec<PathBuf>,
    },

    /// The token exchange with the backend failed
    #[error("{failure}")]
    AuthorizationFailed {
        #[source]
        failure: RequestFailure,
        message: String,
    },

    /// A request against the backend failed after a session was obtained
    #[error("{failure}")]
    Request {
        #[source]
        failure: RequestFailure,
        message: String,
    },

    /// Malformed resource item or invalid model registration
    #[error("{0}")]
    InvalidItem(String),

    /// The item does not carry the requested field
    #[error("'{portal_type}' item has no field '{field}'")]
    FieldMissing { field: String, portal_type: String },

    /// The field exists but holds a value of another type
    #[error("Field '{field}' is not {expected}")]
    FieldType { field: String, expected: &'static str },

    /// A service key file could not be parsed
    #[error("Invalid service key file {}: {source}", path.display())]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A service key directory or file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A successful response carried an unexpected body
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The HTTP transport could not be set up
    #[error("HTTP client error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// Build an `AuthorizationFailed` error and log it
    pub fn authorization_failed(failure: RequestFailure) -> Self {
        emit_log("AuthorizationFailed", AUTHORIZATION_FAILED_MESSAGE, &failure);
        ApiError::AuthorizationFailed {
            failure,
            message: AUTHORIZATION_FAILED_MESSAGE.to_string(),
        }
    }

    /// Build a general `Request` error and log it
    pub fn request_failed(failure: RequestFailure, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| REQUEST_FAILED_MESSAGE.to_string());
        emit_log("APIRequestException", &message, &failure);
        ApiError::Request { failure, message }
    }

    /// Create a value error for a malformed item
    pub fn invalid_item(message: impl Into<String>) -> Self {
        ApiError::InvalidItem(message.into())
    }

    /// Whether the error comes from acquiring credentials rather than from a resource
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::ServiceKeyMissing { .. } | ApiError::AuthorizationFailed { .. }
        )
    }

    /// HTTP status reported by the backend, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::AuthorizationFailed { failure, .. } | ApiError::Request { failure, .. } => {
                failure.status
            }
            _ => None,
        }
    }

    /// Human readable message attached to request and authorization failures
    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::AuthorizationFailed { message, .. } | ApiError::Request { message, .. } => {
                Some(message)
            }
            _ => None,
        }
    }
}

fn emit_log(kind: &str, message: &str, failure: &RequestFailure) {
    let mut lines = vec![kind.to_string(), message.to_string()];
    lines.push(format!("Original exception: {}.", failure));
    if let Some(body) = &failure.body {
        lines.push(format!("Response from GEVER: {}", body));
    }

    tracing::error!(
        target: "api::error",
        status = failure.status.map(|s| s.as_u16()),
        url = %failure.url,
        "{}",
        lines.join("\n")
    );
}
