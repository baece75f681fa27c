//! HTTP exception taxonomy and response classification.
//!
//! [`from_response`] turns a failed response and its decoded body into one
//! [`HttpException`] variant, chosen by status code. Statuses without a
//! dedicated variant become [`HttpException::ClientException`].

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::response::{request_id, HttpResponse, RETRY_AFTER_HEADER};

/// Message used when the error body does not carry one.
pub const UNKNOWN_ERROR: &str = "Unknown Error";

/// Fields shared by every HTTP exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// HTTP status code
    pub http_status: u16,
    /// Human-readable message
    pub message: String,
    /// Additional details from the error body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request correlation ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Method of the failed request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// URL of the failed request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Seconds to wait before retrying, when advertised
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorInfo {
    /// Create error info with only a status and message.
    #[must_use]
    pub fn new(http_status: u16, message: impl Into<String>) -> Self {
        Self {
            http_status,
            message: message.into(),
            details: None,
            request_id: None,
            method: None,
            url: None,
            retry_after: None,
        }
    }

    /// Set the details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HTTP {})", self.message, self.http_status)?;
        if let Some(request_id) = &self.request_id {
            write!(f, " (Request-ID: {request_id})")?;
        }
        Ok(())
    }
}

/// An HTTP error reported by the service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpException {
    /// 400
    #[error("{0}")]
    BadRequest(ErrorInfo),
    /// 401
    #[error("{0}")]
    Unauthorized(ErrorInfo),
    /// 403
    #[error("{0}")]
    Forbidden(ErrorInfo),
    /// 404
    #[error("{0}")]
    NotFound(ErrorInfo),
    /// 405
    #[error("{0}")]
    MethodNotAllowed(ErrorInfo),
    /// 406
    #[error("{0}")]
    NotAcceptable(ErrorInfo),
    /// 409
    #[error("{0}")]
    Conflict(ErrorInfo),
    /// 413, quota exceeded
    #[error("{0}")]
    OverLimit(ErrorInfo),
    /// 429, rate limited
    #[error("{0}")]
    Throttled(ErrorInfo),
    /// 501
    #[error("{0}")]
    NotImplemented(ErrorInfo),
    /// 502
    #[error("{0}")]
    BadGateway(ErrorInfo),
    /// 503
    #[error("{0}")]
    ServiceUnavailable(ErrorInfo),
    /// 504
    #[error("{0}")]
    GatewayTimeout(ErrorInfo),
    /// Any status without a dedicated variant
    #[error("{0}")]
    ClientException(ErrorInfo),
}

impl HttpException {
    /// Statuses that map to a dedicated variant.
    pub const MAPPED_STATUSES: &'static [u16] =
        &[400, 401, 403, 404, 405, 406, 409, 413, 429, 501, 502, 503, 504];

    /// Pick the variant for `info.http_status`.
    #[must_use]
    pub fn from_status(info: ErrorInfo) -> Self {
        match info.http_status {
            400 => Self::BadRequest(info),
            401 => Self::Unauthorized(info),
            403 => Self::Forbidden(info),
            404 => Self::NotFound(info),
            405 => Self::MethodNotAllowed(info),
            406 => Self::NotAcceptable(info),
            409 => Self::Conflict(info),
            413 => Self::OverLimit(info),
            429 => Self::Throttled(info),
            501 => Self::NotImplemented(info),
            502 => Self::BadGateway(info),
            503 => Self::ServiceUnavailable(info),
            504 => Self::GatewayTimeout(info),
            _ => Self::ClientException(info),
        }
    }

    /// Returns true if `status` has a dedicated variant.
    #[must_use]
    pub fn is_mapped(status: u16) -> bool {
        Self::MAPPED_STATUSES.contains(&status)
    }

    /// Shared exception fields.
    #[must_use]
    pub const fn info(&self) -> &ErrorInfo {
        match self {
            Self::BadRequest(info)
            | Self::Unauthorized(info)
            | Self::Forbidden(info)
            | Self::NotFound(info)
            | Self::MethodNotAllowed(info)
            | Self::NotAcceptable(info)
            | Self::Conflict(info)
            | Self::OverLimit(info)
            | Self::Throttled(info)
            | Self::NotImplemented(info)
            | Self::BadGateway(info)
            | Self::ServiceUnavailable(info)
            | Self::GatewayTimeout(info)
            | Self::ClientException(info) => info,
        }
    }

    /// Consume the exception, returning its fields.
    #[must_use]
    pub fn into_info(self) -> ErrorInfo {
        match self {
            Self::BadRequest(info)
            | Self::Unauthorized(info)
            | Self::Forbidden(info)
            | Self::NotFound(info)
            | Self::MethodNotAllowed(info)
            | Self::NotAcceptable(info)
            | Self::Conflict(info)
            | Self::OverLimit(info)
            | Self::Throttled(info)
            | Self::NotImplemented(info)
            | Self::BadGateway(info)
            | Self::ServiceUnavailable(info)
            | Self::GatewayTimeout(info)
            | Self::ClientException(info) => info,
        }
    }

    /// Variant name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BadRequest",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "NotFound",
            Self::MethodNotAllowed(_) => "MethodNotAllowed",
            Self::NotAcceptable(_) => "NotAcceptable",
            Self::Conflict(_) => "Conflict",
            Self::OverLimit(_) => "OverLimit",
            Self::Throttled(_) => "Throttled",
            Self::NotImplemented(_) => "NotImplemented",
            Self::BadGateway(_) => "BadGateway",
            Self::ServiceUnavailable(_) => "ServiceUnavailable",
            Self::GatewayTimeout(_) => "GatewayTimeout",
            Self::ClientException(_) => "ClientException",
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.info().http_status
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.info().message
    }

    /// Details from the error body.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.info().details.as_deref()
    }

    /// Request correlation ID.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.info().request_id.as_deref()
    }

    /// Seconds to wait before retrying, when advertised.
    #[must_use]
    pub const fn retry_after(&self) -> Option<u64> {
        self.info().retry_after
    }
}

/// Classify a failed response.
///
/// If `body` is a mapping, its first top-level entry in document order is
/// read as the error object and supplies `message` and `details`. Never
/// fails: a missing body yields the [`UNKNOWN_ERROR`] message.
#[must_use]
pub fn from_response<R: HttpResponse + ?Sized>(
    response: &R,
    body: Option<&Value>,
) -> HttpException {
    let status = response.status_code();
    let (message, details) = body.map_or((None, None), error_fields);

    let mut info = ErrorInfo::new(status, message.unwrap_or_else(|| UNKNOWN_ERROR.to_string()));
    info.details = details;
    info.request_id = request_id(response);
    info.method = response.method().map(str::to_string);
    info.url = response.url().map(str::to_string);

    if matches!(status, 413 | 429) {
        info.retry_after = response
            .header(RETRY_AFTER_HEADER)
            .and_then(|value| value.trim().parse().ok());
    }

    let exception = HttpException::from_status(info);
    if HttpException::is_mapped(status) {
        debug!(status, kind = exception.name(), "classified error response");
    } else {
        warn!(status, "unmapped error status, using ClientException");
    }
    exception
}

fn error_fields(body: &Value) -> (Option<String>, Option<String>) {
    let Some(error) = body.as_object().and_then(|map| map.values().next()) else {
        return (None, None);
    };

    (text_field(error, "message"), text_field(error, "details"))
}

fn text_field(error: &Value, key: &str) -> Option<String> {
    match error.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{ResponseMeta, COMPUTE_REQUEST_ID_HEADER, OPENSTACK_REQUEST_ID_HEADER};
    use serde_json::json;

    fn response(status: u16) -> ResponseMeta {
        ResponseMeta::from_code(status).unwrap()
    }

    #[test]
    fn unmapped_500_without_message_is_client_exception() {
        let body = json!({"keys": {}});
        let ex = from_response(&response(500), Some(&body));

        assert!(matches!(ex, HttpException::ClientException(_)));
        assert_eq!(ex.message(), UNKNOWN_ERROR);
        assert_eq!(ex.http_status(), 500);
    }

    #[test]
    fn absent_body_uses_fallback_message() {
        let ex = from_response(&response(500), None);
        assert!(matches!(ex, HttpException::ClientException(_)));
        assert_eq!(ex.message(), "Unknown Error");
        assert!(ex.details().is_none());
    }

    #[test]
    fn table_lookup() {
        let cases: &[(u16, &str)] = &[
            (400, "BadRequest"),
            (401, "Unauthorized"),
            (403, "Forbidden"),
            (404, "NotFound"),
            (405, "MethodNotAllowed"),
            (406, "NotAcceptable"),
            (409, "Conflict"),
            (413, "OverLimit"),
            (429, "Throttled"),
            (501, "NotImplemented"),
            (502, "BadGateway"),
            (503, "ServiceUnavailable"),
            (504, "GatewayTimeout"),
            (418, "ClientException"),
            (500, "ClientException"),
            (599, "ClientException"),
        ];

        for (status, name) in cases {
            let ex = from_response(&response(*status), None);
            assert_eq!(ex.name(), *name, "status {status}");
            assert_eq!(ex.http_status(), *status);
            assert_eq!(HttpException::is_mapped(*status), *name != "ClientException");
        }
    }

    #[test]
    fn body_message_and_details_are_used() {
        let body = json!({
            "itemNotFound": {
                "code": 404,
                "message": "Instance could not be found",
                "details": "Instance 42 was deleted"
            }
        });
        let ex = from_response(&response(404), Some(&body));

        assert!(matches!(ex, HttpException::NotFound(_)));
        assert_eq!(ex.message(), "Instance could not be found");
        assert_eq!(ex.details(), Some("Instance 42 was deleted"));
    }

    #[test]
    fn any_error_key_is_accepted() {
        let body = json!({"conflictingRequest": {"message": "Cannot delete while building"}});
        let ex = from_response(&response(409), Some(&body));

        assert!(matches!(ex, HttpException::Conflict(_)));
        assert_eq!(ex.message(), "Cannot delete while building");
        assert!(ex.details().is_none());
    }

    #[test]
    fn error_key_is_first_in_document_order() {
        let body: Value = serde_json::from_str(
            r#"{"overLimit": {"message": "Quota exceeded", "details": "12 of 12"}, "code": 413}"#,
        )
        .unwrap();
        let ex = from_response(&response(413), Some(&body));

        assert!(matches!(ex, HttpException::OverLimit(_)));
        assert_eq!(ex.message(), "Quota exceeded");
        assert_eq!(ex.details(), Some("12 of 12"));

        let body = json!({"badRequest": {"message": "Invalid flavor"}, "additional": {}});
        let ex = from_response(&response(400), Some(&body));
        assert_eq!(ex.message(), "Invalid flavor");
    }

    #[test]
    fn non_mapping_body_is_ignored() {
        let body = json!("plain text error");
        let ex = from_response(&response(400), Some(&body));
        assert_eq!(ex.message(), UNKNOWN_ERROR);

        let body = json!({"error": "flat string"});
        let ex = from_response(&response(400), Some(&body));
        assert_eq!(ex.message(), UNKNOWN_ERROR);
    }

    #[test]
    fn request_id_is_captured() {
        let resp = response(403)
            .with_header(OPENSTACK_REQUEST_ID_HEADER, "req-1234")
            .unwrap();
        let ex = from_response(&resp, None);
        assert_eq!(ex.request_id(), Some("req-1234"));

        let resp = response(403)
            .with_header(COMPUTE_REQUEST_ID_HEADER, "req-5678")
            .unwrap();
        let ex = from_response(&resp, None);
        assert_eq!(ex.request_id(), Some("req-5678"));
    }

    #[test]
    fn retry_after_is_parsed_for_limits() {
        let resp = response(429).with_header("Retry-After", "30").unwrap();
        let ex = from_response(&resp, None);
        assert!(matches!(ex, HttpException::Throttled(_)));
        assert_eq!(ex.retry_after(), Some(30));

        let resp = response(413).with_header("Retry-After", "soon").unwrap();
        assert_eq!(from_response(&resp, None).retry_after(), None);

        let resp = response(503).with_header("Retry-After", "30").unwrap();
        assert_eq!(from_response(&resp, None).retry_after(), None);
    }

    #[test]
    fn display_includes_status_and_request_id() {
        let ex = HttpException::from_status(
            ErrorInfo::new(404, "Flavor not found").with_request_id("req-1"),
        );
        assert_eq!(ex.to_string(), "Flavor not found (HTTP 404) (Request-ID: req-1)");

        let ex = HttpException::from_status(ErrorInfo::new(599, "Odd"));
        assert_eq!(ex.to_string(), "Odd (HTTP 599)");
    }

    #[test]
    fn error_info_serialization_skips_absent_fields() {
        let info = ErrorInfo::new(400, "Bad").with_details("missing name");
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("missing name"));
        assert!(!json.contains("request_id"));
        assert!(!json.contains("retry_after"));
    }

    #[test]
    fn into_info_returns_fields() {
        let info = ErrorInfo::new(401, "Authentication required");
        let ex = HttpException::from_status(info.clone());
        assert_eq!(ex.into_info(), info);
    }
}
