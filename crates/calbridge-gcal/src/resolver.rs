//! Calendar reference resolution.
//!
//! User input may name a calendar by its opaque identifier or by its
//! human-readable summary. [`resolve_calendar_id`] turns either form
//! into a concrete calendar ID: direct identifiers are accepted after a
//! probe, summaries are matched case-insensitively against the user's
//! calendar listing, and anything unresolvable falls back to the primary
//! calendar rather than failing.

use serde::{Deserialize, Serialize};

use calbridge_core::CalendarInfo;

use crate::api::CalendarApi;
use crate::error::GcalResult;

/// The caller's default calendar.
pub const PRIMARY_CALENDAR: &str = "primary";

/// Arguments accepted by the calendar resolution tool.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ResolveCalendarParams {
    pub query: Option<String>,
}

/// Result payload of the calendar resolution tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCalendar {
    pub calendar_id: String,
    pub summary: Option<String>,
}

/// Fetches the user's full calendar listing, following pages to
/// exhaustion.
pub async fn list_calendars(api: &dyn CalendarApi) -> GcalResult<Vec<CalendarInfo>> {
    let mut calendars = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = api.list_calendars_page(page_token.as_deref()).await?;
        calendars.extend(page.items);
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(calendars)
}

/// Resolves a calendar reference to a concrete calendar ID.
///
/// An absent or blank query resolves to [`PRIMARY_CALENDAR`] without any
/// remote traffic. Otherwise the reference is probed as a direct
/// identifier first; failing that, the calendar listing is scanned in
/// listing order for a case-insensitive match on ID or summary. An
/// unmatched reference falls back to [`PRIMARY_CALENDAR`].
pub async fn resolve_calendar_id(
    api: &dyn CalendarApi,
    query: Option<&str>,
) -> GcalResult<String> {
    let query = match query {
        Some(q) if !q.trim().is_empty() => q,
        _ => return Ok(PRIMARY_CALENDAR.to_string()),
    };

    // A direct identifier wins without consulting the listing.
    if api.probe_calendar(query).await.is_ok() {
        return Ok(query.to_string());
    }

    let needle = query.trim().to_lowercase();
    for calendar in list_calendars(api).await? {
        if calendar.id.to_lowercase() == needle {
            return Ok(calendar.id);
        }
        let summary = calendar.summary.as_deref().unwrap_or("");
        if summary.trim().to_lowercase() == needle {
            return Ok(calendar.id);
        }
    }

    tracing::debug!(query, "no calendar matched, falling back to primary");
    Ok(PRIMARY_CALENDAR.to_string())
}

/// Resolves a calendar reference and reports the matched calendar's
/// summary alongside its ID.
pub async fn resolve_calendar(
    api: &dyn CalendarApi,
    query: Option<&str>,
) -> GcalResult<ResolvedCalendar> {
    let calendar_id = resolve_calendar_id(api, query).await?;
    let summary = list_calendars(api)
        .await?
        .into_iter()
        .find(|calendar| calendar.id == calendar_id)
        .and_then(|calendar| calendar.summary);

    Ok(ResolvedCalendar {
        calendar_id,
        summary,
    })
}
