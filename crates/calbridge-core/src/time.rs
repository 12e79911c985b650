//! Temporal payload construction.
//!
//! The remote API expresses every start/end as either `{date}` (all-day,
//! civil date) or `{dateTime, timeZone}` (timed). Callers hand us bare
//! strings; the presence of a `T` separator selects the shape. This module
//! builds validated [`TimePayload`] pairs and enforces the all-day
//! exclusive-end invariant.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Format used for civil dates on the wire.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format accepted for timestamps without an explicit UTC offset.
const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Errors from temporal payload construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimePayloadError {
    /// The all-day start could not be parsed as a civil date.
    #[error("invalid all-day start date: {value:?}")]
    InvalidAllDayStart { value: String },

    /// A timed event was requested without an end.
    #[error("timed events require both start and end")]
    MissingTimedEnd,

    /// A value could not be parsed as a timestamp.
    #[error("invalid timestamp: {value:?}")]
    InvalidTimestamp { value: String },
}

/// One temporal endpoint in remote wire shape.
///
/// Exactly one of `date` and `date_time` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl TimePayload {
    /// Creates an all-day endpoint from a civil date.
    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format(DATE_FORMAT).to_string()),
            date_time: None,
            time_zone: None,
        }
    }

    /// Creates a timed endpoint, passing the timestamp through verbatim.
    pub fn timed(value: impl Into<String>, time_zone: Option<&str>) -> Self {
        Self {
            date: None,
            date_time: Some(value.into()),
            time_zone: time_zone.map(String::from),
        }
    }

    /// Flattens this endpoint back to a single string.
    pub fn flatten(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

/// Returns true if the value carries a time-of-day component.
pub fn has_time(value: &str) -> bool {
    value.contains('T')
}

/// Builds one endpoint from a bare string, selecting `{dateTime}` when the
/// value carries a `T` separator and `{date}` otherwise.
pub fn time_value(value: &str, time_zone: Option<&str>) -> TimePayload {
    if has_time(value) {
        TimePayload::timed(value, time_zone)
    } else {
        TimePayload {
            date: Some(value.to_string()),
            date_time: None,
            time_zone: None,
        }
    }
}

/// Builds an all-day start/end pair.
///
/// The civil date is the substring before any `T` separator. The end is
/// exclusive and must be strictly after the start; when it is absent,
/// unparseable, or not after the start, it is forced to start + 1 day.
pub fn build_all_day(
    start: &str,
    end: Option<&str>,
) -> Result<(TimePayload, TimePayload), TimePayloadError> {
    let start_date = parse_civil_date(start).ok_or_else(|| TimePayloadError::InvalidAllDayStart {
        value: start.to_string(),
    })?;

    let end_date = match end.and_then(parse_civil_date) {
        Some(d) if d > start_date => d,
        _ => start_date + Duration::days(1),
    };

    Ok((TimePayload::all_day(start_date), TimePayload::all_day(end_date)))
}

/// Builds a timed start/end pair.
///
/// Both endpoints must be present; the optional IANA timezone is attached
/// to both. Timestamp strings pass through to the remote verbatim.
pub fn build_timed(
    start: &str,
    end: Option<&str>,
    time_zone: Option<&str>,
) -> Result<(TimePayload, TimePayload), TimePayloadError> {
    let end = end.ok_or(TimePayloadError::MissingTimedEnd)?;
    Ok((
        TimePayload::timed(start, time_zone),
        TimePayload::timed(end, time_zone),
    ))
}

fn parse_civil_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.split('T').next().unwrap_or(value).trim();
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
}

/// Parses a timestamp for internal arithmetic.
///
/// Accepts RFC 3339 (offset or `Z`) and naive `YYYY-MM-DDTHH:MM:SS`,
/// which is treated as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TimePayloadError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, NAIVE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| TimePayloadError::InvalidTimestamp {
            value: value.to_string(),
        })
}

/// Adds a duration to a timestamp string, preserving its style.
///
/// An offset-carrying input yields an offset-carrying output in the same
/// offset; a naive input yields a naive output.
pub fn add_duration(value: &str, delta: Duration) -> Result<String, TimePayloadError> {
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_rfc3339(value) {
        return Ok((dt + delta).to_rfc3339());
    }
    NaiveDateTime::parse_from_str(value, NAIVE_FORMAT)
        .map(|naive| (naive + delta).format(NAIVE_FORMAT).to_string())
        .map_err(|_| TimePayloadError::InvalidTimestamp {
            value: value.to_string(),
        })
}
