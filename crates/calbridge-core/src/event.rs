//! Calendar and event projection types.
//!
//! This module provides the types that cross the tool-surface boundary:
//! - [`CalendarInfo`]: one entry of the user's calendar listing
//! - [`EventView`]: the flattened projection of a remote event
//!
//! Remote payloads carry temporal fields as nested `{date}` or
//! `{dateTime, timeZone}` objects; an [`EventView`] flattens each to a single
//! string so callers never see the two shapes.

use serde::{Deserialize, Serialize};

/// A calendar as reported by the remote listing.
///
/// Calendars are read-only from this system's perspective: they are
/// enumerated, never created or destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarInfo {
    /// Canonical calendar identifier.
    pub id: String,
    /// Human-readable display name.
    pub summary: Option<String>,
    /// Whether this is the user's primary calendar.
    #[serde(default)]
    pub primary: bool,
    /// The caller's access role (e.g. "owner", "reader").
    pub access_role: Option<String>,
    /// IANA timezone of the calendar.
    pub time_zone: Option<String>,
}

impl CalendarInfo {
    /// Creates a calendar entry with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: None,
            primary: false,
            access_role: None,
            time_zone: None,
        }
    }

    /// Builder: set the display name.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder: mark as the primary calendar.
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }
}

/// The flattened projection of a remote event.
///
/// `start` and `end` hold either a civil date (`2024-01-01`, all-day) or an
/// ISO timestamp (`2024-01-01T09:00:00`, timed); the two are never mixed on
/// one event. The series fields (`recurrence`, `recurring_event_id`,
/// `original_start_time`) are emitted only when the remote payload carries
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    /// The calendar this event belongs to. An event identifier is
    /// meaningless without it.
    pub calendar_id: String,
    /// The event's own identifier.
    pub event_id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Flattened start: civil date or ISO timestamp.
    pub start: Option<String>,
    /// Flattened end: civil date (exclusive) or ISO timestamp.
    pub end: Option<String>,
    /// Timezone of the start, falling back to the end's.
    pub time_zone: Option<String>,
    pub location: Option<String>,
    /// Attendee email addresses, in remote order.
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Remote status: "confirmed", "cancelled" or "tentative".
    pub status: Option<String>,
    /// Recurrence rule lines (RRULE/EXDATE), present on series templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
    /// Backreference to the parent series when this is an instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
    /// The instance's canonical position in its series, before any
    /// per-instance override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_start_time: Option<String>,
}

impl EventView {
    /// Creates an event projection with the given composite key.
    pub fn new(calendar_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            event_id: event_id.into(),
            ..Default::default()
        }
    }

    /// Builder: set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder: set the flattened start value.
    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    /// Builder: set the flattened end value.
    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    /// Builder: set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Returns true if the remote marked this event cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}
