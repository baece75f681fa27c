//! HTTP response views and request-ID extraction.
//!
//! The transport collaborator hands this crate a finished response. Anything
//! that can report a status code and case-insensitive headers implements
//! [`HttpResponse`]; [`ResponseMeta`] is an owned snapshot that outlives the
//! body read, and is what tests construct by hand.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::exceptions::from_response;

/// Primary header carrying the request correlation ID.
pub const OPENSTACK_REQUEST_ID_HEADER: &str = "x-openstack-request-id";

/// Legacy header carrying the request correlation ID.
pub const COMPUTE_REQUEST_ID_HEADER: &str = "x-compute-request-id";

/// Header advertising how long to wait before retrying.
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Read access to a completed HTTP response.
pub trait HttpResponse {
    /// Numeric HTTP status code.
    fn status_code(&self) -> u16;

    /// Header value by name. Lookups are case-insensitive.
    fn header(&self, name: &str) -> Option<&str>;

    /// Method of the originating request, when known.
    fn method(&self) -> Option<&str> {
        None
    }

    /// URL of the originating request, when known.
    fn url(&self) -> Option<&str> {
        None
    }

    /// Owned copy of the status, headers, method and URL.
    fn snapshot(&self) -> ResponseMeta;
}

/// Owned snapshot of a response's status line and headers.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    status: StatusCode,
    headers: HeaderMap,
    method: Option<Method>,
    url: Option<Url>,
}

impl ResponseMeta {
    /// Create a snapshot with no headers.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            method: None,
            url: None,
        }
    }

    /// Create a snapshot from a raw status code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is outside 100..=999.
    pub fn from_code(code: u16) -> Result<Self> {
        StatusCode::from_u16(code)
            .map(Self::new)
            .map_err(|err| Error::InvalidResponse(format!("status {code}: {err}")))
    }

    /// Add a header.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not valid in an HTTP header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| Error::InvalidResponse(format!("header name `{name}`: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| Error::InvalidResponse(format!("header value `{value}`: {err}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Replace all headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Record the request method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Record the request URL.
    #[must_use]
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Snapshot the status, headers and URL of a `reqwest` response.
    #[must_use]
    pub fn from_reqwest(response: &reqwest::Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            method: None,
            url: Some(response.url().clone()),
        }
    }

    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl HttpResponse for ResponseMeta {
    fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn method(&self) -> Option<&str> {
        self.method.as_ref().map(Method::as_str)
    }

    fn url(&self) -> Option<&str> {
        self.url.as_ref().map(Url::as_str)
    }

    fn snapshot(&self) -> ResponseMeta {
        self.clone()
    }
}

impl HttpResponse for reqwest::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|value| value.to_str().ok())
    }

    fn url(&self) -> Option<&str> {
        Some(reqwest::Response::url(self).as_str())
    }

    fn snapshot(&self) -> ResponseMeta {
        ResponseMeta::from_reqwest(self)
    }
}

/// Names of the headers a request ID is read from, in lookup order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdHeaders {
    primary: String,
    legacy: String,
}

impl RequestIdHeaders {
    /// Use custom header names.
    #[must_use]
    pub fn new(primary: impl Into<String>, legacy: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            legacy: legacy.into(),
        }
    }

    /// The request ID carried by `response`, if any.
    #[must_use]
    pub fn request_id<R: HttpResponse + ?Sized>(&self, response: &R) -> Option<String> {
        response
            .header(&self.primary)
            .or_else(|| response.header(&self.legacy))
            .map(str::to_string)
    }

    /// The request IDs carried by `response`: zero or one entries.
    #[must_use]
    pub fn request_ids<R: HttpResponse + ?Sized>(&self, response: &R) -> Vec<String> {
        self.request_id(response).into_iter().collect()
    }
}

impl Default for RequestIdHeaders {
    fn default() -> Self {
        Self::new(OPENSTACK_REQUEST_ID_HEADER, COMPUTE_REQUEST_ID_HEADER)
    }
}

/// The request ID carried by `response`, using the default header names.
#[must_use]
pub fn request_id<R: HttpResponse + ?Sized>(response: &R) -> Option<String> {
    RequestIdHeaders::default().request_id(response)
}

/// The request IDs carried by `response`, using the default header names.
#[must_use]
pub fn request_ids<R: HttpResponse + ?Sized>(response: &R) -> Vec<String> {
    RequestIdHeaders::default().request_ids(response)
}

/// Snapshot a `reqwest` response and decode its body as JSON.
///
/// Empty or non-JSON bodies decode to `None`.
///
/// # Errors
///
/// Returns an error if the body cannot be read.
pub async fn read_response(response: reqwest::Response) -> Result<(ResponseMeta, Option<Value>)> {
    let meta = ResponseMeta::from_reqwest(&response);
    let bytes = response.bytes().await?;

    let body = if bytes.is_empty() {
        None
    } else {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(status = meta.status_code(), "response body is not JSON: {err}");
                None
            }
        }
    };

    Ok((meta, body))
}

/// Like [`read_response`], but classifies 4xx and 5xx responses.
///
/// # Errors
///
/// Returns [`Error::Api`] for error statuses, or a transport error if the
/// body cannot be read.
pub async fn check_response(response: reqwest::Response) -> Result<(ResponseMeta, Option<Value>)> {
    let (meta, body) = read_response(response).await?;

    if meta.status.is_client_error() || meta.status.is_server_error() {
        return Err(Error::Api(from_response(&meta, body.as_ref())));
    }

    Ok((meta, body))
}
