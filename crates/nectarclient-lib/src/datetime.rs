//! Timestamp parsing for datetime-typed resource fields.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATETIME_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Why a field value could not be coerced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    /// The value is not a JSON string
    #[error("expected a string, found {0}")]
    NotAString(String),

    /// The string matches none of the accepted layouts
    #[error("unrecognised timestamp `{0}`")]
    UnrecognisedFormat(String),

    /// A custom coercion rejected the value
    #[error("{0}")]
    Rejected(String),
}

/// Time zone parsed timestamps are shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    /// The system's local zone
    #[default]
    Local,
    /// A fixed UTC offset
    Fixed(FixedOffset),
}

impl DisplayZone {
    /// Shorthand for a fixed zone at UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// Express `instant` in this zone.
    #[must_use]
    pub fn convert(self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        let offset = match self {
            Self::Local => *instant.with_timezone(&Local).offset(),
            Self::Fixed(offset) => offset,
        };
        instant.with_timezone(&offset)
    }
}

/// Parse a service timestamp.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DDTHH:MM:SS`
/// followed by a UTC offset or `Z`. Values without an offset are UTC.
///
/// # Errors
///
/// Returns [`CoercionError::UnrecognisedFormat`] for any other layout,
/// including a space between date and time.
pub fn parse_timestamp(
    value: &str,
    zone: DisplayZone,
) -> Result<DateTime<FixedOffset>, CoercionError> {
    parse_utc(value)
        .map(|instant| zone.convert(instant))
        .ok_or_else(|| CoercionError::UnrecognisedFormat(value.to_string()))
}

fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    let with_offset = value
        .strip_suffix('Z')
        .map_or_else(|| value.to_string(), |stripped| format!("{stripped}+00:00"));
    if let Ok(parsed) = DateTime::parse_from_str(&with_offset, DATETIME_OFFSET_FORMAT) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, DATETIME_FORMAT) {
        return Some(Utc.from_utc_datetime(&naive));
    }

    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
