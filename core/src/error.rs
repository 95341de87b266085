//! Error types for the CMS client.
//!
//! # Design
//! One enum covers the whole taxonomy so every operation returns the same
//! `CmsResult`. `Validation` is shared by local schema/query checks (which
//! carry the offending `field`) and backend rejections on 400/422 (which
//! carry the `status`). `Server` and `Network` are the only kinds a caller
//! may reasonably retry; the client itself never does.

use thiserror::Error;

/// Result type for CMS client operations.
pub type CmsResult<T> = Result<T, CmsError>;

/// Errors returned by `CmsClient`, `SchemaMigrator` and `Collection`.
#[derive(Debug, Error)]
pub enum CmsError {
    /// The client configuration is missing or malformed. Raised only at
    /// construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A schema, query or content payload failed shape rules, either locally
    /// (`field` is set, no request was sent) or on the backend (`status` is set).
    #[error("validation failed{}: {message}", field_suffix(.field))]
    Validation {
        field: Option<String>,
        status: Option<u16>,
        message: String,
    },

    /// The backend returned 401 or 403.
    #[error("authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// The backend returned a 4xx other than auth or validation failures.
    #[error("request rejected (HTTP {status}): {message}")]
    Request { status: u16, message: String },

    /// The backend returned a 5xx.
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// No response reached the client.
    #[error("network failure: {0}")]
    Network(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be decoded into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

fn field_suffix(field: &Option<String>) -> String {
    field
        .as_deref()
        .map(|f| format!(" for field `{f}`"))
        .unwrap_or_default()
}

impl CmsError {
    /// Local validation failure attributed to `field`.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        CmsError::Validation {
            field: Some(field.into()),
            status: None,
            message: message.into(),
        }
    }

    /// The HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            CmsError::Validation { status, .. } => *status,
            CmsError::Auth { status, .. }
            | CmsError::Request { status, .. }
            | CmsError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures a caller may retry unchanged: 5xx and network errors.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CmsError::Server { .. } | CmsError::Network(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CmsError::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CmsError::Request { status: 404, .. })
    }
}
