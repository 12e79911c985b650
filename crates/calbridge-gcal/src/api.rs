//! Remote calendar API abstraction.
//!
//! This module defines the [`CalendarApi`] trait, the seam between the
//! calendar operations (resolver, CRUD, series engine) and the remote
//! REST surface. Each method corresponds to exactly one remote call, so
//! the retry and refresh policies wrap at this granularity.
//!
//! The wire structs mirror the remote payload shapes. [`ApiEvent`] serves
//! as both request body and response payload; every field is optional and
//! skipped when absent, so a patch body only carries the fields it sets
//! and never clears remote state by omission.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use calbridge_core::{CalendarInfo, EventView, TimePayload};

use crate::error::GcalResult;

/// A boxed future for async trait methods.
///
/// This is used because async functions in traits are not yet stable in a
/// way that works well with dynamic dispatch. Using boxed futures allows
/// the trait to be object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Notification fan-out for event creation, forwarded as the `sendUpdates`
/// query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SendUpdates {
    /// Notify all attendees.
    All,
    /// Notify only attendees outside the organizer's domain.
    ExternalOnly,
    /// Notify nobody.
    None,
}

impl SendUpdates {
    /// The wire value for the query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::ExternalOnly => "externalOnly",
            Self::None => "none",
        }
    }
}

/// An attendee in remote wire shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiAttendee {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ApiAttendee {
    /// Creates an attendee entry from an email address.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
        }
    }
}

/// Reminder configuration in remote wire shape.
///
/// `{useDefault: false, overrides: []}` disables all reminders; omitting
/// the whole structure keeps the calendar default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiReminders {
    pub use_default: bool,
    pub overrides: Vec<ApiReminderOverride>,
}

impl ApiReminders {
    /// Builds an explicit override list from minute counts, using the
    /// popup method for each.
    pub fn overrides_from_minutes(minutes: &[u32]) -> Self {
        Self {
            use_default: false,
            overrides: minutes
                .iter()
                .map(|&m| ApiReminderOverride {
                    method: "popup".to_string(),
                    minutes: m,
                })
                .collect(),
        }
    }
}

/// One reminder override: a delivery method and a lead time in minutes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiReminderOverride {
    pub method: String,
    pub minutes: u32,
}

/// An event in remote wire shape, used for both requests and responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<TimePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<TimePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<ApiAttendee>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<ApiReminders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_start_time: Option<TimePayload>,
}

impl ApiEvent {
    /// Flattens this remote event into the canonical projection.
    ///
    /// Nested `{date}` / `{dateTime}` endpoints collapse to single
    /// strings, the timezone is taken from the start falling back to the
    /// end, and attendees reduce to their email addresses in remote order.
    pub fn into_view(self, calendar_id: &str) -> EventView {
        let time_zone = self
            .start
            .as_ref()
            .and_then(|t| t.time_zone.clone())
            .or_else(|| self.end.as_ref().and_then(|t| t.time_zone.clone()));

        EventView {
            calendar_id: calendar_id.to_string(),
            event_id: self.id.unwrap_or_default(),
            summary: self.summary,
            description: self.description,
            start: self.start.as_ref().and_then(flatten_time),
            end: self.end.as_ref().and_then(flatten_time),
            time_zone,
            location: self.location,
            attendees: self
                .attendees
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| a.email)
                .filter(|email| !email.is_empty())
                .collect(),
            status: self.status,
            recurrence: self.recurrence,
            recurring_event_id: self.recurring_event_id,
            original_start_time: self.original_start_time.as_ref().and_then(flatten_time),
        }
    }
}

fn flatten_time(payload: &TimePayload) -> Option<String> {
    payload.flatten().map(String::from)
}

/// Filter parameters for event and instance listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Lower bound (inclusive) for event start time, ISO 8601.
    pub time_min: Option<String>,
    /// Upper bound (exclusive) for event start time, ISO 8601.
    pub time_max: Option<String>,
    /// Page size cap for each remote request.
    pub max_results: Option<u32>,
    /// Free-text search over event fields.
    pub text_query: Option<String>,
}

impl EventQuery {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the lower time bound.
    pub fn with_time_min(mut self, time_min: impl Into<String>) -> Self {
        self.time_min = Some(time_min.into());
        self
    }

    /// Builder method to set the upper time bound.
    pub fn with_time_max(mut self, time_max: impl Into<String>) -> Self {
        self.time_max = Some(time_max.into());
        self
    }

    /// Builder method to set the page size cap.
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Builder method to set the free-text search term.
    pub fn with_text_query(mut self, text_query: impl Into<String>) -> Self {
        self.text_query = Some(text_query.into());
        self
    }
}

/// One page of the calendar listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalendarPage {
    pub items: Vec<CalendarInfo>,
    pub next_page_token: Option<String>,
}

/// One page of an event or instance listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventPage {
    pub items: Vec<ApiEvent>,
    pub next_page_token: Option<String>,
}

/// The remote calendar API surface.
///
/// Each method issues exactly one remote request; pagination loops and
/// multi-step operations are composed above this trait. Implementations
/// own authentication and the retry policy, so callers see each method as
/// a single classified-success-or-failure call.
///
/// Implementations should be `Send + Sync`; operations hold a `&dyn
/// CalendarApi` and may be served concurrently by the transport.
pub trait CalendarApi: Send + Sync {
    /// Fetches one page of the user's calendar listing.
    fn list_calendars_page<'a>(
        &'a self,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, GcalResult<CalendarPage>>;

    /// Probes a calendar by identifier.
    ///
    /// Succeeds only when the identifier names an accessible calendar;
    /// used by the resolver to accept direct IDs.
    fn probe_calendar<'a>(&'a self, calendar_id: &'a str)
    -> BoxFuture<'a, GcalResult<CalendarInfo>>;

    /// Fetches one page of a calendar's events, recurring events expanded
    /// and ordered by start time.
    fn list_events_page<'a>(
        &'a self,
        calendar_id: &'a str,
        query: &'a EventQuery,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, GcalResult<EventPage>>;

    /// Fetches a single event or instance.
    fn get_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>>;

    /// Creates an event and returns the remote's view of it.
    fn insert_event<'a>(
        &'a self,
        calendar_id: &'a str,
        body: &'a ApiEvent,
        send_updates: Option<SendUpdates>,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>>;

    /// Applies a partial update; only fields present in `body` change.
    fn patch_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        body: &'a ApiEvent,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>>;

    /// Replaces an event wholesale.
    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        body: &'a ApiEvent,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>>;

    /// Hard-deletes an event.
    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, GcalResult<()>>;

    /// Fetches one page of a series' expanded instances.
    fn list_instances_page<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        query: &'a EventQuery,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, GcalResult<EventPage>>;
}
