//! In-memory fake of the remote calendar API.
//!
//! Operation tests script this fake with calendars, events, and series
//! instances, then assert on the recorded call order and write log. Reads
//! are served from the scripted state; writes are logged, not applied, so
//! each test sees exactly the mutations its operation issued.

use std::collections::HashMap;
use std::sync::Mutex;

use calbridge_core::CalendarInfo;

use crate::api::{
    ApiEvent, BoxFuture, CalendarApi, CalendarPage, EventPage, EventQuery, SendUpdates,
};
use crate::error::{GcalError, GcalErrorCode, GcalResult};

/// One recorded write against the fake remote.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mutation {
    Insert {
        calendar_id: String,
        body: ApiEvent,
    },
    Patch {
        calendar_id: String,
        event_id: String,
        body: ApiEvent,
    },
    Update {
        calendar_id: String,
        event_id: String,
        body: ApiEvent,
    },
    Delete {
        calendar_id: String,
        event_id: String,
    },
}

#[derive(Default)]
pub(crate) struct FakeApi {
    calendars: Vec<CalendarInfo>,
    calendar_page_size: Option<usize>,
    events: HashMap<String, Vec<ApiEvent>>,
    instances: HashMap<String, Vec<ApiEvent>>,
    stored: HashMap<String, ApiEvent>,
    event_page_size: Option<usize>,
    insert_failure: Option<(GcalErrorCode, String)>,
    calls: Mutex<Vec<String>>,
    mutations: Mutex<Vec<Mutation>>,
    queries: Mutex<Vec<EventQuery>>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_calendar(mut self, calendar: CalendarInfo) -> Self {
        self.calendars.push(calendar);
        self
    }

    pub(crate) fn with_calendar_page_size(mut self, size: usize) -> Self {
        self.calendar_page_size = Some(size);
        self
    }

    pub(crate) fn with_events(mut self, calendar_id: &str, events: Vec<ApiEvent>) -> Self {
        self.events.insert(calendar_id.to_string(), events);
        self
    }

    pub(crate) fn with_instances(mut self, series_id: &str, instances: Vec<ApiEvent>) -> Self {
        self.instances.insert(series_id.to_string(), instances);
        self
    }

    /// Registers an event fetchable by its id.
    pub(crate) fn with_event(mut self, event: ApiEvent) -> Self {
        let id = event.id.clone().unwrap_or_default();
        self.stored.insert(id, event);
        self
    }

    pub(crate) fn with_event_page_size(mut self, size: usize) -> Self {
        self.event_page_size = Some(size);
        self
    }

    pub(crate) fn with_insert_failure(mut self, code: GcalErrorCode, message: &str) -> Self {
        self.insert_failure = Some((code, message.to_string()));
        self
    }

    /// Remote calls made so far, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Writes issued so far, in order.
    pub(crate) fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    /// Listing queries seen so far, in order.
    pub(crate) fn queries(&self) -> Vec<EventQuery> {
        self.queries.lock().unwrap().clone()
    }

    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn record(&self, mutation: Mutation) -> usize {
        let mut mutations = self.mutations.lock().unwrap();
        mutations.push(mutation);
        mutations.len()
    }
}

/// Slices one page out of a scripted listing. Tokens are plain start
/// offsets; no page size means everything fits on the first page.
fn page<T: Clone>(
    items: &[T],
    page_size: Option<usize>,
    token: Option<&str>,
) -> (Vec<T>, Option<String>) {
    let start = token
        .and_then(|t| t.parse::<usize>().ok())
        .unwrap_or(0)
        .min(items.len());
    let end = match page_size {
        Some(size) => (start + size).min(items.len()),
        None => items.len(),
    };
    let next = (end < items.len()).then(|| end.to_string());
    (items[start..end].to_vec(), next)
}

/// Overlay of a partial update on a stored event.
fn merge(base: ApiEvent, patch: &ApiEvent) -> ApiEvent {
    ApiEvent {
        id: patch.id.clone().or(base.id),
        summary: patch.summary.clone().or(base.summary),
        description: patch.description.clone().or(base.description),
        location: patch.location.clone().or(base.location),
        start: patch.start.clone().or(base.start),
        end: patch.end.clone().or(base.end),
        status: patch.status.clone().or(base.status),
        attendees: patch.attendees.clone().or(base.attendees),
        reminders: patch.reminders.clone().or(base.reminders),
        recurrence: patch.recurrence.clone().or(base.recurrence),
        recurring_event_id: patch.recurring_event_id.clone().or(base.recurring_event_id),
        original_start_time: patch.original_start_time.clone().or(base.original_start_time),
    }
}

impl CalendarApi for FakeApi {
    fn list_calendars_page<'a>(
        &'a self,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, GcalResult<CalendarPage>> {
        Box::pin(async move {
            self.log("list_calendars".to_string());
            let (items, next_page_token) = page(&self.calendars, self.calendar_page_size, page_token);
            Ok(CalendarPage {
                items,
                next_page_token,
            })
        })
    }

    fn probe_calendar<'a>(
        &'a self,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, GcalResult<CalendarInfo>> {
        Box::pin(async move {
            self.log(format!("probe:{calendar_id}"));
            self.calendars
                .iter()
                .find(|calendar| calendar.id == calendar_id)
                .cloned()
                .ok_or_else(|| GcalError::not_found("calendar or event not found"))
        })
    }

    fn list_events_page<'a>(
        &'a self,
        calendar_id: &'a str,
        query: &'a EventQuery,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, GcalResult<EventPage>> {
        Box::pin(async move {
            self.log(format!("list_events:{calendar_id}"));
            self.queries.lock().unwrap().push(query.clone());
            let events = self.events.get(calendar_id).map(Vec::as_slice).unwrap_or(&[]);
            let (items, next_page_token) = page(events, self.event_page_size, page_token);
            Ok(EventPage {
                items,
                next_page_token,
            })
        })
    }

    fn get_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>> {
        Box::pin(async move {
            self.log(format!("get:{event_id}"));
            self.stored
                .get(event_id)
                .cloned()
                .ok_or_else(|| GcalError::not_found("calendar or event not found"))
        })
    }

    fn insert_event<'a>(
        &'a self,
        calendar_id: &'a str,
        body: &'a ApiEvent,
        _send_updates: Option<SendUpdates>,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>> {
        Box::pin(async move {
            self.log(format!("insert:{calendar_id}"));
            if let Some((code, message)) = &self.insert_failure {
                return Err(GcalError::new(*code, message.clone()));
            }
            let count = self.record(Mutation::Insert {
                calendar_id: calendar_id.to_string(),
                body: body.clone(),
            });
            let mut created = body.clone();
            if created.id.is_none() {
                created.id = Some(format!("created-{count}"));
            }
            Ok(created)
        })
    }

    fn patch_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        body: &'a ApiEvent,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>> {
        Box::pin(async move {
            self.log(format!("patch:{event_id}"));
            self.record(Mutation::Patch {
                calendar_id: calendar_id.to_string(),
                event_id: event_id.to_string(),
                body: body.clone(),
            });
            let base = self.stored.get(event_id).cloned().unwrap_or(ApiEvent {
                id: Some(event_id.to_string()),
                ..Default::default()
            });
            Ok(merge(base, body))
        })
    }

    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        body: &'a ApiEvent,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>> {
        Box::pin(async move {
            self.log(format!("update:{event_id}"));
            self.record(Mutation::Update {
                calendar_id: calendar_id.to_string(),
                event_id: event_id.to_string(),
                body: body.clone(),
            });
            let mut updated = body.clone();
            if updated.id.is_none() {
                updated.id = Some(event_id.to_string());
            }
            Ok(updated)
        })
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, GcalResult<()>> {
        Box::pin(async move {
            self.log(format!("delete:{event_id}"));
            self.record(Mutation::Delete {
                calendar_id: calendar_id.to_string(),
                event_id: event_id.to_string(),
            });
            Ok(())
        })
    }

    fn list_instances_page<'a>(
        &'a self,
        _calendar_id: &'a str,
        event_id: &'a str,
        query: &'a EventQuery,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, GcalResult<EventPage>> {
        Box::pin(async move {
            self.log(format!("instances:{event_id}"));
            self.queries.lock().unwrap().push(query.clone());
            let instances = self.instances.get(event_id).map(Vec::as_slice).unwrap_or(&[]);
            let (items, next_page_token) = page(instances, self.event_page_size, page_token);
            Ok(EventPage {
                items,
                next_page_token,
            })
        })
    }
}
