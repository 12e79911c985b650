//! Event CRUD operations.
//!
//! These are the tool-facing operations over single events: listing with
//! an optional all-calendars mode, creation from normalized arguments,
//! partial update from a loosely-typed patch mapping, and deletion (hard,
//! or soft-cancelling one recurring instance). Each operation resolves
//! its calendar reference first and returns flattened [`EventView`]
//! projections.

use serde::Deserialize;
use serde_json::{Map, Value};

use calbridge_core::{
    AttendeesInput, EventView, RemindersInput, build_all_day, build_timed, normalize_attendees,
    normalize_reminder_minutes, time_value,
};

use crate::api::{ApiAttendee, ApiEvent, ApiReminders, CalendarApi, EventQuery, SendUpdates};
use crate::error::{GcalError, GcalResult};
use crate::resolver;

/// Default page size for event listings.
const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page size the remote accepts.
const MAX_PAGE_SIZE: i64 = 500;

/// Clamps a caller-supplied page size to what the remote accepts.
pub(crate) fn clamp_page_size(max_results: Option<i64>) -> u32 {
    max_results.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as u32
}

/// Arguments accepted by the event listing tool.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ListEventsParams {
    pub calendar: Option<String>,
    #[serde(alias = "time_min")]
    pub time_min: Option<String>,
    #[serde(alias = "time_max")]
    pub time_max: Option<String>,
    #[serde(alias = "max_results")]
    pub max_results: Option<i64>,
    pub query: Option<String>,
    #[serde(alias = "include_all_calendars")]
    pub include_all_calendars: bool,
}

/// Arguments accepted by the event creation tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateEventParams {
    pub calendar: String,
    pub summary: String,
    pub start: String,
    pub end: Option<String>,
    #[serde(alias = "time_zone")]
    pub time_zone: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub attendees: Option<AttendeesInput>,
    #[serde(alias = "reminderMinutes", alias = "reminder_minutes")]
    pub reminders: Option<RemindersInput>,
    pub recurrence: Option<Vec<String>>,
    #[serde(default, alias = "all_day")]
    pub all_day: bool,
    #[serde(alias = "send_updates")]
    pub send_updates: Option<SendUpdates>,
}

/// Arguments accepted by the event update tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateEventParams {
    pub calendar: String,
    #[serde(alias = "event_id")]
    pub event_id: String,
    pub patch: Map<String, Value>,
}

/// Arguments accepted by the event deletion tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteEventParams {
    pub calendar: String,
    #[serde(alias = "event_id")]
    pub event_id: String,
    #[serde(default, alias = "as_instance")]
    pub as_instance: bool,
}

/// Lists events from one calendar, or from every calendar in the user's
/// listing.
///
/// All-calendars mode is selected explicitly or by leaving the calendar
/// reference absent; it iterates the listing in order and concatenates
/// the per-calendar results without a global re-sort. Each calendar's
/// listing follows pages to exhaustion.
pub async fn list_events(
    api: &dyn CalendarApi,
    params: &ListEventsParams,
) -> GcalResult<Vec<EventView>> {
    let mut query = EventQuery::new().with_max_results(clamp_page_size(params.max_results));
    if let Some(time_min) = &params.time_min {
        query = query.with_time_min(time_min);
    }
    if let Some(time_max) = &params.time_max {
        query = query.with_time_max(time_max);
    }
    if let Some(text) = &params.query {
        query = query.with_text_query(text);
    }

    let all_calendars = params.include_all_calendars
        || params.calendar.as_deref().unwrap_or("").is_empty();

    let calendar_ids: Vec<String> = if all_calendars {
        resolver::list_calendars(api)
            .await?
            .into_iter()
            .map(|calendar| calendar.id)
            .collect()
    } else {
        vec![resolver::resolve_calendar_id(api, params.calendar.as_deref()).await?]
    };

    let mut events = Vec::new();
    for calendar_id in &calendar_ids {
        events.extend(pull_events(api, calendar_id, &query).await?);
    }

    tracing::debug!(
        calendars = calendar_ids.len(),
        events = events.len(),
        "listed events"
    );
    Ok(events)
}

async fn pull_events(
    api: &dyn CalendarApi,
    calendar_id: &str,
    query: &EventQuery,
) -> GcalResult<Vec<EventView>> {
    let mut events = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = api
            .list_events_page(calendar_id, query, page_token.as_deref())
            .await?;
        events.extend(page.items.into_iter().map(|e| e.into_view(calendar_id)));
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(events)
}

/// Creates an event from normalized tool arguments.
pub async fn create_event(
    api: &dyn CalendarApi,
    params: &CreateEventParams,
) -> GcalResult<EventView> {
    let calendar_id = resolver::resolve_calendar_id(api, Some(&params.calendar)).await?;

    let (start, end) = if params.all_day {
        build_all_day(&params.start, params.end.as_deref())?
    } else {
        build_timed(
            &params.start,
            params.end.as_deref(),
            params.time_zone.as_deref(),
        )?
    };

    let mut body = ApiEvent {
        summary: Some(params.summary.clone()),
        description: params.description.clone(),
        location: params.location.clone(),
        start: Some(start),
        end: Some(end),
        ..Default::default()
    };

    // A normalized-empty attendee list is omitted on create.
    if let Some(input) = &params.attendees {
        if let Some(emails) = normalize_attendees(input) {
            if !emails.is_empty() {
                body.attendees = Some(emails.into_iter().map(ApiAttendee::new).collect());
            }
        }
    }

    // An explicitly empty reminder list disables reminders; only an
    // absent argument keeps the calendar default.
    if let Some(input) = &params.reminders {
        let minutes = normalize_reminder_minutes(input);
        body.reminders = Some(ApiReminders::overrides_from_minutes(&minutes));
    }

    if let Some(recurrence) = &params.recurrence {
        let lines: Vec<String> = recurrence
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        if !lines.is_empty() {
            body.recurrence = Some(lines);
        }
    }

    let created = api
        .insert_event(&calendar_id, &body, params.send_updates)
        .await?;
    tracing::info!(
        calendar = %calendar_id,
        event = created.id.as_deref().unwrap_or(""),
        "event created"
    );
    Ok(created.into_view(&calendar_id))
}

/// Applies a partial update built from the caller's patch mapping.
pub async fn update_event(
    api: &dyn CalendarApi,
    params: &UpdateEventParams,
) -> GcalResult<EventView> {
    let calendar_id = resolver::resolve_calendar_id(api, Some(&params.calendar)).await?;
    let body = build_patch_body(&params.patch)?;

    let updated = api
        .patch_event(&calendar_id, &params.event_id, &body)
        .await?;
    Ok(updated.into_view(&calendar_id))
}

/// Builds the remote patch body from a patch mapping.
///
/// Only recognized keys are forwarded; everything else in the mapping is
/// ignored. Temporal values are rebuilt into endpoint payloads with the
/// patch's timezone attached, and an unrecognized attendee shape drops
/// the key rather than failing the patch.
fn build_patch_body(patch: &Map<String, Value>) -> GcalResult<ApiEvent> {
    let mut body = ApiEvent {
        summary: patch_string(patch, "summary")?,
        description: patch_string(patch, "description")?,
        location: patch_string(patch, "location")?,
        ..Default::default()
    };

    let time_zone = match patch_string(patch, "time_zone")? {
        Some(tz) => Some(tz),
        None => patch_string(patch, "timeZone")?,
    };

    if let Some(start) = patch_string(patch, "start")? {
        body.start = Some(time_value(&start, time_zone.as_deref()));
    }
    if let Some(end) = patch_string(patch, "end")? {
        body.end = Some(time_value(&end, time_zone.as_deref()));
    }

    if let Some(value) = patch.get("attendees") {
        if let Ok(input) = serde_json::from_value::<AttendeesInput>(value.clone()) {
            if let Some(emails) = normalize_attendees(&input) {
                body.attendees = Some(emails.into_iter().map(ApiAttendee::new).collect());
            }
        }
    }

    Ok(body)
}

pub(crate) fn patch_string(patch: &Map<String, Value>, key: &str) -> GcalResult<Option<String>> {
    match patch.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(GcalError::validation(format!(
            "patch field {:?} must be a string",
            key
        ))),
    }
}

/// Deletes an event, or soft-cancels a single recurring instance.
///
/// `as_instance` fetches the occurrence, marks it cancelled, and pushes a
/// full update so the rest of the series survives; otherwise the event is
/// hard-deleted.
pub async fn delete_event(api: &dyn CalendarApi, params: &DeleteEventParams) -> GcalResult<()> {
    let calendar_id = resolver::resolve_calendar_id(api, Some(&params.calendar)).await?;

    if params.as_instance {
        let mut instance = api.get_event(&calendar_id, &params.event_id).await?;
        instance.status = Some("cancelled".to_string());
        api.update_event(&calendar_id, &params.event_id, &instance)
            .await?;
    } else {
        api.delete_event(&calendar_id, &params.event_id).await?;
    }

    tracing::info!(calendar = %calendar_id, event = %params.event_id, "event deleted");
    Ok(())
}
