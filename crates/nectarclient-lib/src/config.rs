//! Configuration for resource modelling.
//!
//! Controls which headers carry the request correlation ID and which time
//! zone datetime fields are shown in.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::datetime::DisplayZone;
use crate::response::{RequestIdHeaders, COMPUTE_REQUEST_ID_HEADER, OPENSTACK_REQUEST_ID_HEADER};
use crate::Error;

/// Largest UTC offset accepted for the display zone, in seconds.
pub const MAX_UTC_OFFSET_SECS: i32 = 86_399;

/// Configuration shared by resources built from responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ModelConfig {
    /// Header read first for the request ID
    #[validate(length(min = 1))]
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Header read when the primary one is absent
    #[validate(length(min = 1))]
    #[serde(default = "default_legacy_request_id_header")]
    pub legacy_request_id_header: String,

    /// Fixed UTC offset for datetime fields; the local zone when unset
    #[validate(range(min = -86_399, max = 86_399))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_secs: Option<i32>,
}

fn default_request_id_header() -> String {
    OPENSTACK_REQUEST_ID_HEADER.to_string()
}

fn default_legacy_request_id_header() -> String {
    COMPUTE_REQUEST_ID_HEADER.to_string()
}

impl ModelConfig {
    /// Create a configuration with the default header names and the local zone.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id_header: default_request_id_header(),
            legacy_request_id_header: default_legacy_request_id_header(),
            utc_offset_secs: None,
        }
    }

    /// Set the request ID header names.
    #[must_use]
    pub fn with_request_id_headers(
        mut self,
        primary: impl Into<String>,
        legacy: impl Into<String>,
    ) -> Self {
        self.request_id_header = primary.into();
        self.legacy_request_id_header = legacy.into();
        self
    }

    /// Show datetime fields at a fixed UTC offset.
    #[must_use]
    pub const fn with_utc_offset(mut self, seconds: i32) -> Self {
        self.utc_offset_secs = Some(seconds);
        self
    }

    /// Show datetime fields in the local zone.
    #[must_use]
    pub const fn with_local_zone(mut self) -> Self {
        self.utc_offset_secs = None;
        self
    }

    /// Check field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if a header name is empty or the
    /// offset is out of range.
    pub fn validated(self) -> Result<Self, Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid model configuration: {e}")))?;
        Ok(self)
    }

    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or validation fails.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str::<Self>(json)?.validated()
    }

    /// The zone datetime fields are converted to.
    #[must_use]
    pub fn display_zone(&self) -> DisplayZone {
        self.utc_offset_secs
            .and_then(FixedOffset::east_opt)
            .map_or(DisplayZone::Local, DisplayZone::Fixed)
    }

    /// The headers request IDs are read from.
    #[must_use]
    pub fn request_id_headers(&self) -> RequestIdHeaders {
        RequestIdHeaders::new(&self.request_id_header, &self.legacy_request_id_header)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new()
    }
}
