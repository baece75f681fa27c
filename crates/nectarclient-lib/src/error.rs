//! Error types for resource modelling operations.
//!
//! HTTP failures reported by the cloud service are classified into
//! [`HttpException`](crate::exceptions::HttpException) and carried by
//! [`Error::Api`]; everything else that can go wrong while modelling a
//! response has its own variant here.

use thiserror::Error;

use crate::exceptions::HttpException;

/// Main error type for client library operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The service answered with an HTTP error status
    #[error(transparent)]
    Api(#[from] HttpException),

    /// A modelled attribute is not present on the resource
    #[error("{resource} has no attribute `{attribute}`")]
    AttributeNotFound {
        /// Type name of the resource
        resource: String,
        /// Requested attribute
        attribute: String,
    },

    /// A lookup that should match one resource matched several
    #[error("No unique match: {0}")]
    NoUniqueMatch(String),

    /// The resource was built without a manager
    #[error("Resource has no manager: {0}")]
    MissingManager(String),

    /// The resource has no `id` field to refresh by
    #[error("Resource has no id: {0}")]
    MissingId(String),

    /// The response could not be represented
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Failed to decode or encode JSON
    #[error("JSON error: {0}")]
    Json(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP transport failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The service could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Specialized result type for client library operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Api(_) => "API_ERROR",
            Self::AttributeNotFound { .. } => "ATTRIBUTE_NOT_FOUND",
            Self::NoUniqueMatch(_) => "NO_UNIQUE_MATCH",
            Self::MissingManager(_) => "MISSING_MANAGER",
            Self::MissingId(_) => "MISSING_ID",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::Json(_) => "JSON_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Returns true if the service reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(HttpException::NotFound(_)))
    }

    /// Returns the classified HTTP exception, if this is one.
    #[must_use]
    pub const fn as_http_exception(&self) -> Option<&HttpException> {
        match self {
            Self::Api(exception) => Some(exception),
            _ => None,
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}
