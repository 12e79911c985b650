//! Recurring series operations.
//!
//! Instance listing, single-instance cancellation, and the series split:
//! "change this and all following instances". The split is two sequential
//! remote mutations with no transaction around them; a failure between
//! the two leaves the original series trimmed with no successor, which is
//! reported as a distinct partial-failure error rather than a generic
//! one. Everything that can fail on caller input is validated before the
//! first mutation.

use serde::Deserialize;
use serde_json::{Map, Value};

use calbridge_core::{EventView, TimePayload, add_duration, parse_timestamp, rewrite_until};

use crate::api::{ApiEvent, CalendarApi, EventQuery};
use crate::error::{GcalError, GcalResult};
use crate::events::{clamp_page_size, patch_string};
use crate::resolver;

/// Upper bound on instances examined when resolving one by its original
/// start time.
const INSTANCE_SCAN_LIMIT: usize = 250;

/// Arguments accepted by the instance listing tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListInstancesParams {
    pub calendar: String,
    #[serde(alias = "recurring_event_id")]
    pub recurring_event_id: String,
    #[serde(alias = "time_min")]
    pub time_min: Option<String>,
    #[serde(alias = "time_max")]
    pub time_max: Option<String>,
    #[serde(alias = "max_results")]
    pub max_results: Option<i64>,
}

/// Arguments accepted by the instance cancellation tool.
///
/// The instance is named either directly by `instance_id` or by the pair
/// `recurring_event_id` + `original_start_time`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CancelInstanceParams {
    pub calendar: String,
    #[serde(alias = "instance_id")]
    pub instance_id: Option<String>,
    #[serde(alias = "recurring_event_id")]
    pub recurring_event_id: Option<String>,
    #[serde(alias = "original_start_time")]
    pub original_start_time: Option<String>,
}

/// Arguments accepted by the series split tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SplitFollowingParams {
    pub calendar: String,
    #[serde(alias = "recurring_event_id")]
    pub recurring_event_id: String,
    #[serde(alias = "target_instance_start")]
    pub target_instance_start: String,
    #[serde(alias = "change_patch")]
    pub change_patch: Map<String, Value>,
    #[serde(alias = "new_recurrence")]
    pub new_recurrence: Vec<String>,
}

/// Expands a series into concrete instances within a time window.
///
/// Each instance carries its `originalStartTime`, which identifies it
/// within the series even after an individual reschedule.
pub async fn list_instances(
    api: &dyn CalendarApi,
    params: &ListInstancesParams,
) -> GcalResult<Vec<EventView>> {
    let calendar_id = resolver::resolve_calendar_id(api, Some(&params.calendar)).await?;

    let mut query = EventQuery::new().with_max_results(clamp_page_size(params.max_results));
    if let Some(time_min) = &params.time_min {
        query = query.with_time_min(time_min);
    }
    if let Some(time_max) = &params.time_max {
        query = query.with_time_max(time_max);
    }

    let mut instances = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let page = api
            .list_instances_page(
                &calendar_id,
                &params.recurring_event_id,
                &query,
                page_token.as_deref(),
            )
            .await?;
        instances.extend(page.items.into_iter().map(|e| e.into_view(&calendar_id)));
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(instances)
}

/// Cancels one instance of a recurring series, leaving the rest intact.
pub async fn cancel_instance(
    api: &dyn CalendarApi,
    params: &CancelInstanceParams,
) -> GcalResult<EventView> {
    let by_scan = params.recurring_event_id.is_some() && params.original_start_time.is_some();
    if params.instance_id.is_none() && !by_scan {
        return Err(GcalError::validation(
            "cancelling an instance requires instanceId, or recurringEventId together with originalStartTime",
        ));
    }

    let calendar_id = resolver::resolve_calendar_id(api, Some(&params.calendar)).await?;

    let instance = if let Some(instance_id) = &params.instance_id {
        let fetched = api.get_event(&calendar_id, instance_id).await?;
        if let Some(series_id) = &params.recurring_event_id {
            if fetched.recurring_event_id.as_deref() != Some(series_id.as_str()) {
                return Err(GcalError::validation(format!(
                    "instance {} does not belong to series {}",
                    instance_id, series_id
                )));
            }
        }
        fetched
    } else {
        // Both are present here; the guard above rejected everything else.
        let series_id = params.recurring_event_id.as_deref().unwrap();
        let original_start = params.original_start_time.as_deref().unwrap();
        scan_for_instance(api, &calendar_id, series_id, original_start)
            .await?
            .ok_or_else(|| {
                GcalError::validation(format!(
                    "no instance of series {} has originalStartTime {}",
                    series_id, original_start
                ))
            })?
    };

    cancel(api, &calendar_id, instance).await
}

/// Scans a series' instances, in paging order, for one whose original
/// start time matches. Gives up after [`INSTANCE_SCAN_LIMIT`] instances.
async fn scan_for_instance(
    api: &dyn CalendarApi,
    calendar_id: &str,
    series_id: &str,
    original_start: &str,
) -> GcalResult<Option<ApiEvent>> {
    let query = EventQuery::new().with_max_results(INSTANCE_SCAN_LIMIT as u32);
    let mut scanned = 0usize;
    let mut page_token: Option<String> = None;

    loop {
        let page = api
            .list_instances_page(calendar_id, series_id, &query, page_token.as_deref())
            .await?;

        for instance in page.items {
            let matches = instance
                .original_start_time
                .as_ref()
                .and_then(|t| t.flatten())
                == Some(original_start);
            if matches {
                return Ok(Some(instance));
            }
            scanned += 1;
            if scanned >= INSTANCE_SCAN_LIMIT {
                return Ok(None);
            }
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => return Ok(None),
        }
    }
}

async fn cancel(
    api: &dyn CalendarApi,
    calendar_id: &str,
    mut instance: ApiEvent,
) -> GcalResult<EventView> {
    let event_id = instance
        .id
        .clone()
        .ok_or_else(|| GcalError::invalid_response("instance carries no id"))?;

    instance.status = Some("cancelled".to_string());
    let updated = api.update_event(calendar_id, &event_id, &instance).await?;

    tracing::info!(calendar = %calendar_id, instance = %event_id, "recurring instance cancelled");
    Ok(updated.into_view(calendar_id))
}

/// Splits a recurring series at an instance: the original series is
/// trimmed to end just before the target instance, and a new standalone
/// series starts there with the caller's changes applied.
///
/// The trim and the successor creation are two remote mutations. All
/// caller input is validated before the first one; a failure after the
/// trim but before the successor exists is reported as a partial failure
/// naming the trimmed series.
pub async fn split_following(
    api: &dyn CalendarApi,
    params: &SplitFollowingParams,
) -> GcalResult<EventView> {
    let calendar_id = resolver::resolve_calendar_id(api, Some(&params.calendar)).await?;
    let series_id = &params.recurring_event_id;

    let template = api.get_event(&calendar_id, series_id).await?;

    let (start_value, time_zone) = timed_endpoint(template.start.as_ref())?;
    let (end_value, _) = timed_endpoint(template.end.as_ref())?;

    let duration = parse_timestamp(end_value)? - parse_timestamp(start_value)?;
    let split_instant = parse_timestamp(&params.target_instance_start)?;

    let recurrence = template.recurrence.as_deref().unwrap_or(&[]);
    let trimmed = rewrite_until(recurrence, split_instant)?;

    // Build the successor in full before mutating anything, so a bad
    // change patch cannot leave the original trimmed for nothing.
    let successor_end = add_duration(&params.target_instance_start, duration)?;
    let successor = ApiEvent {
        summary: patch_string(&params.change_patch, "summary")?.or_else(|| template.summary.clone()),
        description: patch_string(&params.change_patch, "description")?
            .or_else(|| template.description.clone()),
        location: patch_string(&params.change_patch, "location")?
            .or_else(|| template.location.clone()),
        start: Some(TimePayload::timed(&params.target_instance_start, time_zone)),
        end: Some(TimePayload::timed(&successor_end, time_zone)),
        recurrence: Some(params.new_recurrence.clone()),
        ..Default::default()
    };

    let trim_body = ApiEvent {
        recurrence: Some(trimmed),
        ..Default::default()
    };
    api.patch_event(&calendar_id, series_id, &trim_body).await?;
    tracing::info!(
        calendar = %calendar_id,
        series = %series_id,
        split = %params.target_instance_start,
        "series trimmed before split point"
    );

    let created = api
        .insert_event(&calendar_id, &successor, None)
        .await
        .map_err(|e| {
            let message = format!(
                "series {} was trimmed but the successor series could not be created: {}",
                series_id,
                e.message()
            );
            GcalError::partial_failure(message).with_source(e)
        })?;

    tracing::info!(
        calendar = %calendar_id,
        series = %series_id,
        successor = created.id.as_deref().unwrap_or(""),
        "series split complete"
    );
    Ok(created.into_view(&calendar_id))
}

/// Requires a timed endpoint, returning its timestamp and timezone.
fn timed_endpoint(payload: Option<&TimePayload>) -> GcalResult<(&str, Option<&str>)> {
    payload
        .and_then(|t| t.date_time.as_deref().map(|v| (v, t.time_zone.as_deref())))
        .ok_or_else(|| {
            GcalError::validation("series start and end must be timed, not all-day")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GcalErrorCode;
    use crate::testing::{FakeApi, Mutation};
    use calbridge_core::CalendarInfo;
    use serde_json::json;

    fn instance(series_id: &str, index: usize, original_start: &str) -> ApiEvent {
        ApiEvent {
            id: Some(format!("{series_id}_{index}")),
            summary: Some("Weekly sync".to_string()),
            start: Some(TimePayload::timed(original_start, None)),
            end: Some(TimePayload::timed(original_start, None)),
            recurring_event_id: Some(series_id.to_string()),
            original_start_time: Some(TimePayload::timed(original_start, None)),
            ..Default::default()
        }
    }

    fn weekly_template(series_id: &str) -> ApiEvent {
        ApiEvent {
            id: Some(series_id.to_string()),
            summary: Some("Weekly sync".to_string()),
            description: Some("Agenda in doc".to_string()),
            start: Some(TimePayload::timed(
                "2024-03-01T09:00:00",
                Some("Europe/Paris"),
            )),
            end: Some(TimePayload::timed(
                "2024-03-01T09:30:00",
                Some("Europe/Paris"),
            )),
            recurrence: Some(vec!["RRULE:FREQ=WEEKLY;COUNT=10".to_string()]),
            ..Default::default()
        }
    }

    fn split_params(change_patch: Value, new_recurrence: &[&str]) -> SplitFollowingParams {
        SplitFollowingParams {
            calendar: "primary".to_string(),
            recurring_event_id: "series1".to_string(),
            target_instance_start: "2024-03-22T10:00:00Z".to_string(),
            change_patch: change_patch.as_object().unwrap().clone(),
            new_recurrence: new_recurrence.iter().map(|s| s.to_string()).collect(),
        }
    }

    mod listing {
        use super::*;

        #[tokio::test]
        async fn instances_carry_original_start_times() {
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_instances(
                    "series1",
                    vec![
                        instance("series1", 0, "2024-03-15T09:00:00Z"),
                        instance("series1", 1, "2024-03-22T09:00:00Z"),
                    ],
                )
                .with_event_page_size(1);

            let params = ListInstancesParams {
                calendar: "primary".to_string(),
                recurring_event_id: "series1".to_string(),
                time_min: None,
                time_max: None,
                max_results: None,
            };
            let instances = list_instances(&api, &params).await.unwrap();

            assert_eq!(instances.len(), 2);
            assert_eq!(
                instances[0].original_start_time.as_deref(),
                Some("2024-03-15T09:00:00Z")
            );
            assert_eq!(instances[1].recurring_event_id.as_deref(), Some("series1"));
        }
    }

    mod cancellation {
        use super::*;

        #[tokio::test]
        async fn underspecified_request_is_rejected_without_remote_calls() {
            let api = FakeApi::new().with_calendar(CalendarInfo::new("primary"));

            for params in [
                CancelInstanceParams {
                    calendar: "primary".to_string(),
                    ..Default::default()
                },
                CancelInstanceParams {
                    calendar: "primary".to_string(),
                    recurring_event_id: Some("series1".to_string()),
                    ..Default::default()
                },
                CancelInstanceParams {
                    calendar: "primary".to_string(),
                    original_start_time: Some("2024-03-22T09:00:00Z".to_string()),
                    ..Default::default()
                },
            ] {
                let error = cancel_instance(&api, &params).await.unwrap_err();
                assert_eq!(error.code(), GcalErrorCode::Validation);
            }
            assert!(api.calls().is_empty());
        }

        #[tokio::test]
        async fn direct_instance_id_cancels_via_update() {
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_event(instance("series1", 2, "2024-03-29T09:00:00Z"));

            let params = CancelInstanceParams {
                calendar: "primary".to_string(),
                instance_id: Some("series1_2".to_string()),
                recurring_event_id: Some("series1".to_string()),
                ..Default::default()
            };
            let view = cancel_instance(&api, &params).await.unwrap();

            assert_eq!(view.event_id, "series1_2");
            assert_eq!(view.status.as_deref(), Some("cancelled"));
            match &api.mutations()[0] {
                Mutation::Update { event_id, body, .. } => {
                    assert_eq!(event_id, "series1_2");
                    assert_eq!(body.status.as_deref(), Some("cancelled"));
                }
                other => panic!("expected update, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn series_mismatch_aborts_before_any_mutation() {
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_event(instance("series1", 2, "2024-03-29T09:00:00Z"));

            let params = CancelInstanceParams {
                calendar: "primary".to_string(),
                instance_id: Some("series1_2".to_string()),
                recurring_event_id: Some("other-series".to_string()),
                ..Default::default()
            };
            let error = cancel_instance(&api, &params).await.unwrap_err();

            assert_eq!(error.code(), GcalErrorCode::Validation);
            assert!(error.message().contains("does not belong"));
            assert!(api.mutations().is_empty());
        }

        #[tokio::test]
        async fn original_start_time_scan_finds_the_instance() {
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_instances(
                    "series1",
                    vec![
                        instance("series1", 0, "2024-03-15T09:00:00Z"),
                        instance("series1", 1, "2024-03-22T09:00:00Z"),
                        instance("series1", 2, "2024-03-29T09:00:00Z"),
                    ],
                );

            let params = CancelInstanceParams {
                calendar: "primary".to_string(),
                recurring_event_id: Some("series1".to_string()),
                original_start_time: Some("2024-03-22T09:00:00Z".to_string()),
                ..Default::default()
            };
            let view = cancel_instance(&api, &params).await.unwrap();

            assert_eq!(view.event_id, "series1_1");
            assert_eq!(view.status.as_deref(), Some("cancelled"));
        }

        #[tokio::test]
        async fn scan_miss_is_a_validation_error() {
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_instances(
                    "series1",
                    vec![instance("series1", 0, "2024-03-15T09:00:00Z")],
                );

            let params = CancelInstanceParams {
                calendar: "primary".to_string(),
                recurring_event_id: Some("series1".to_string()),
                original_start_time: Some("2099-01-01T00:00:00Z".to_string()),
                ..Default::default()
            };
            let error = cancel_instance(&api, &params).await.unwrap_err();

            assert_eq!(error.code(), GcalErrorCode::Validation);
            assert!(error.message().contains("originalStartTime"));
            assert!(api.mutations().is_empty());
        }

        #[tokio::test]
        async fn scan_gives_up_past_the_instance_limit() {
            let instances: Vec<ApiEvent> = (0..INSTANCE_SCAN_LIMIT + 10)
                .map(|i| instance("series1", i, &format!("start-{i}")))
                .collect();
            let beyond_limit = format!("start-{}", INSTANCE_SCAN_LIMIT + 5);
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_instances("series1", instances);

            let params = CancelInstanceParams {
                calendar: "primary".to_string(),
                recurring_event_id: Some("series1".to_string()),
                original_start_time: Some(beyond_limit),
                ..Default::default()
            };
            let error = cancel_instance(&api, &params).await.unwrap_err();

            assert_eq!(error.code(), GcalErrorCode::Validation);
            assert!(api.mutations().is_empty());
        }
    }

    mod splitting {
        use super::*;

        #[tokio::test]
        async fn trims_the_original_then_creates_the_successor() {
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_event(weekly_template("series1"));

            let params = split_params(json!({"summary": "New title"}), &["RRULE:FREQ=DAILY"]);
            let view = split_following(&api, &params).await.unwrap();

            assert_eq!(view.summary.as_deref(), Some("New title"));
            assert_eq!(view.start.as_deref(), Some("2024-03-22T10:00:00Z"));

            let mutations = api.mutations();
            assert_eq!(mutations.len(), 2);

            match &mutations[0] {
                Mutation::Patch { event_id, body, .. } => {
                    assert_eq!(event_id, "series1");
                    // COUNT is replaced by an UNTIL one second before the split.
                    assert_eq!(
                        body.recurrence.as_deref(),
                        Some(&["RRULE:FREQ=WEEKLY;UNTIL=20240322T095959Z".to_string()][..])
                    );
                    assert_eq!(body.summary, None);
                }
                other => panic!("expected patch, got {other:?}"),
            }

            match &mutations[1] {
                Mutation::Insert { body, .. } => {
                    let start = body.start.as_ref().unwrap();
                    assert_eq!(start.date_time.as_deref(), Some("2024-03-22T10:00:00Z"));
                    assert_eq!(start.time_zone.as_deref(), Some("Europe/Paris"));
                    // Template duration (30 minutes) carried to the successor.
                    let end = body.end.as_ref().unwrap();
                    assert_eq!(end.date_time.as_deref(), Some("2024-03-22T10:30:00+00:00"));
                    assert_eq!(end.time_zone.as_deref(), Some("Europe/Paris"));
                    assert_eq!(body.summary.as_deref(), Some("New title"));
                    // Unpatched fields fall back to the template.
                    assert_eq!(body.description.as_deref(), Some("Agenda in doc"));
                    assert_eq!(
                        body.recurrence.as_deref(),
                        Some(&["RRULE:FREQ=DAILY".to_string()][..])
                    );
                }
                other => panic!("expected insert, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn all_day_series_cannot_be_split() {
            let mut template = weekly_template("series1");
            template.start = Some(TimePayload {
                date: Some("2024-03-01".to_string()),
                ..Default::default()
            });
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_event(template);

            let params = split_params(json!({}), &["RRULE:FREQ=DAILY"]);
            let error = split_following(&api, &params).await.unwrap_err();

            assert_eq!(error.code(), GcalErrorCode::Validation);
            assert!(error.message().contains("all-day"));
            assert!(api.mutations().is_empty());
        }

        #[tokio::test]
        async fn series_without_rrule_cannot_be_split() {
            let mut template = weekly_template("series1");
            template.recurrence = Some(vec!["EXDATE:20240308T090000Z".to_string()]);
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_event(template);

            let params = split_params(json!({}), &["RRULE:FREQ=DAILY"]);
            let error = split_following(&api, &params).await.unwrap_err();

            assert_eq!(error.code(), GcalErrorCode::Validation);
            assert!(api.mutations().is_empty());
        }

        #[tokio::test]
        async fn unparseable_split_point_aborts_before_any_mutation() {
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_event(weekly_template("series1"));

            let mut params = split_params(json!({}), &["RRULE:FREQ=DAILY"]);
            params.target_instance_start = "next friday".to_string();
            let error = split_following(&api, &params).await.unwrap_err();

            assert_eq!(error.code(), GcalErrorCode::Validation);
            assert!(api.mutations().is_empty());
        }

        #[tokio::test]
        async fn malformed_change_patch_aborts_before_any_mutation() {
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_event(weekly_template("series1"));

            let params = split_params(json!({"summary": 42}), &["RRULE:FREQ=DAILY"]);
            let error = split_following(&api, &params).await.unwrap_err();

            assert_eq!(error.code(), GcalErrorCode::Validation);
            assert!(api.mutations().is_empty());
        }

        #[tokio::test]
        async fn successor_failure_reports_partial_failure() {
            let api = FakeApi::new()
                .with_calendar(CalendarInfo::new("primary"))
                .with_event(weekly_template("series1"))
                .with_insert_failure(GcalErrorCode::Server, "API error (500): boom");

            let params = split_params(json!({}), &["RRULE:FREQ=DAILY"]);
            let error = split_following(&api, &params).await.unwrap_err();

            assert_eq!(error.code(), GcalErrorCode::PartialFailure);
            assert!(error.message().contains("series1"));
            assert!(error.message().contains("trimmed"));

            // The trim went through; only the successor is missing.
            let mutations = api.mutations();
            assert_eq!(mutations.len(), 1);
            assert!(matches!(&mutations[0], Mutation::Patch { event_id, .. } if event_id == "series1"));
        }
    }
}
