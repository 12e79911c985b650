//! Google Calendar backend: HTTP client, auth, and calendar operations.
//!
//! This crate contains everything that talks to the Google Calendar API:
//!
//! - [`CalendarApi`] - The narrow trait covering the API endpoints we use
//! - [`GoogleClient`] - The real implementation with retry and token refresh
//! - [`events`] / [`series`] / [`resolver`] - The calendar operations built
//!   on top of the trait
//! - [`GcalError`] - Error type shared by all of the above
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  events / series / resolver operations      │
//! └──────────────────────┬──────────────────────┘
//!                        │  CalendarApi
//!                        ▼
//! ┌─────────────────────────────────────────────┐
//! │  GoogleClient                               │
//! │  (backoff retry + access token refresh)     │
//! └──────────────────────┬──────────────────────┘
//!                        │
//!                        ▼
//!               Google Calendar API v3
//! ```
//!
//! Operations take `&dyn CalendarApi` so tests can substitute a fake
//! backend; only [`GoogleClient`] performs network I/O.
//!
//! # Example
//!
//! ```ignore
//! use calbridge_gcal::{GcalConfig, GoogleClient, ListEventsParams, events};
//!
//! async fn upcoming(client: &GoogleClient) -> Vec<calbridge_core::EventView> {
//!     let params = ListEventsParams {
//!         calendar: Some("team standup".to_string()),
//!         ..Default::default()
//!     };
//!     events::list_events(client, params).await.unwrap_or_default()
//! }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod oauth;
pub mod resolver;
pub mod retry;
pub mod series;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types at crate root
pub use api::{
    ApiAttendee, ApiEvent, ApiReminderOverride, ApiReminders, BoxFuture, CalendarApi,
    CalendarPage, EventPage, EventQuery, SendUpdates,
};
pub use client::GoogleClient;
pub use config::{CALENDAR_SCOPE, GcalConfig};
pub use error::{GcalError, GcalErrorCode, GcalResult};
pub use events::{
    CreateEventParams, DeleteEventParams, ListEventsParams, UpdateEventParams, create_event,
    delete_event, list_events, update_event,
};
pub use oauth::{AuthorizedTokens, OAuthClient, PkceFlow};
pub use resolver::{
    PRIMARY_CALENDAR, ResolveCalendarParams, ResolvedCalendar, list_calendars, resolve_calendar,
    resolve_calendar_id,
};
pub use series::{
    CancelInstanceParams, ListInstancesParams, SplitFollowingParams, cancel_instance,
    list_instances, split_following,
};
