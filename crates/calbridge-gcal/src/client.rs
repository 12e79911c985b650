//! Google Calendar API client.
//!
//! This module provides the HTTP implementation of [`CalendarApi`],
//! handling authentication, request building, response classification,
//! and the retry policy. Each trait method issues one request per
//! attempt; transient failures are retried by [`crate::retry`] and
//! authentication failures recovered by [`crate::auth`].

use reqwest::Method;
use serde::de::DeserializeOwned;

use calbridge_core::CalendarInfo;

use crate::api::{ApiEvent, BoxFuture, CalendarApi, CalendarPage, EventPage, EventQuery, SendUpdates};
use crate::auth::TokenCache;
use crate::config::GcalConfig;
use crate::error::{GcalError, GcalResult};
use crate::retry;

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Authenticated Google Calendar client.
pub struct GoogleClient {
    http: reqwest::Client,
    tokens: TokenCache,
}

impl GoogleClient {
    /// Creates a client from validated credentials.
    pub fn new(config: GcalConfig) -> GcalResult<Self> {
        if let Err(reason) = config.validate() {
            return Err(GcalError::configuration(reason));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                let message = format!("failed to create HTTP client: {}", e);
                GcalError::configuration(message).with_source(e)
            })?;

        let tokens = TokenCache::new(http.clone(), &config);
        Ok(Self { http, tokens })
    }

    /// Mints an initial access token, validating the configured refresh
    /// token before any tool traffic is served.
    pub async fn ensure_authenticated(&self) -> GcalResult<()> {
        self.tokens.access_token().await?;
        tracing::debug!("authenticated against calendar API");
        Ok(())
    }

    /// Issues a request under the refresh and retry policies and parses
    /// the JSON response.
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&'static str, String)],
        body: Option<&ApiEvent>,
    ) -> GcalResult<T> {
        let text = self.request_text(method, url, query, body).await?;
        serde_json::from_str(&text)
            .map_err(|e| GcalError::invalid_response(format!("failed to parse response: {}", e)))
    }

    /// Issues a request under the refresh and retry policies and returns
    /// the raw response body.
    async fn request_text(
        &self,
        method: Method,
        url: &str,
        query: &[(&'static str, String)],
        body: Option<&ApiEvent>,
    ) -> GcalResult<String> {
        self.tokens
            .run(|access| {
                let method = method.clone();
                async move {
                    retry::with_backoff(|| {
                        self.attempt(&access, method.clone(), url, query, body)
                    })
                    .await
                }
            })
            .await
    }

    /// Sends a single request and classifies the outcome.
    async fn attempt(
        &self,
        access: &str,
        method: Method,
        url: &str,
        query: &[(&'static str, String)],
        body: Option<&ApiEvent>,
    ) -> GcalResult<String> {
        let mut request = self.http.request(method, url).bearer_auth(access);

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GcalError::network("request timeout")
            } else if e.is_connect() {
                GcalError::network(format!("connection failed: {}", e))
            } else {
                GcalError::network(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();

        // Handle rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(GcalError::rate_limited(format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|s| format!(", retry after {} seconds", s))
                    .unwrap_or_default()
            )));
        }

        // Handle authentication errors
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GcalError::authentication("access token expired or invalid"));
        }

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(GcalError::forbidden("access denied to calendar"));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GcalError::not_found("calendar or event not found"));
        }

        // Handle other errors
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GcalError::server(format!("API error ({}): {}", status, body)));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GcalError::bad_request(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        response
            .text()
            .await
            .map_err(|e| GcalError::network(format!("failed to read response: {}", e)))
    }
}

impl CalendarApi for GoogleClient {
    fn list_calendars_page<'a>(
        &'a self,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, GcalResult<CalendarPage>> {
        Box::pin(async move {
            let url = format!("{}/users/me/calendarList", CALENDAR_API_BASE);
            let mut query = Vec::new();
            if let Some(token) = page_token {
                query.push(("pageToken", token.to_string()));
            }
            self.request_json(Method::GET, &url, &query, None).await
        })
    }

    fn probe_calendar<'a>(
        &'a self,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, GcalResult<CalendarInfo>> {
        Box::pin(async move {
            let url = calendar_url(calendar_id);
            self.request_json(Method::GET, &url, &[], None).await
        })
    }

    fn list_events_page<'a>(
        &'a self,
        calendar_id: &'a str,
        query: &'a EventQuery,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, GcalResult<EventPage>> {
        Box::pin(async move {
            let url = events_url(calendar_id);
            let params = event_query_params(query, page_token);
            self.request_json(Method::GET, &url, &params, None).await
        })
    }

    fn get_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>> {
        Box::pin(async move {
            let url = event_url(calendar_id, event_id);
            self.request_json(Method::GET, &url, &[], None).await
        })
    }

    fn insert_event<'a>(
        &'a self,
        calendar_id: &'a str,
        body: &'a ApiEvent,
        send_updates: Option<SendUpdates>,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>> {
        Box::pin(async move {
            let url = events_url(calendar_id);
            let mut query = Vec::new();
            if let Some(send_updates) = send_updates {
                query.push(("sendUpdates", send_updates.as_str().to_string()));
            }
            self.request_json(Method::POST, &url, &query, Some(body))
                .await
        })
    }

    fn patch_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        body: &'a ApiEvent,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>> {
        Box::pin(async move {
            let url = event_url(calendar_id, event_id);
            self.request_json(Method::PATCH, &url, &[], Some(body)).await
        })
    }

    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        body: &'a ApiEvent,
    ) -> BoxFuture<'a, GcalResult<ApiEvent>> {
        Box::pin(async move {
            let url = event_url(calendar_id, event_id);
            self.request_json(Method::PUT, &url, &[], Some(body)).await
        })
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, GcalResult<()>> {
        Box::pin(async move {
            let url = event_url(calendar_id, event_id);
            self.request_text(Method::DELETE, &url, &[], None).await?;
            Ok(())
        })
    }

    fn list_instances_page<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        query: &'a EventQuery,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, GcalResult<EventPage>> {
        Box::pin(async move {
            let url = instances_url(calendar_id, event_id);
            let params = instance_query_params(query, page_token);
            self.request_json(Method::GET, &url, &params, None).await
        })
    }
}

fn calendar_url(calendar_id: &str) -> String {
    format!(
        "{}/calendars/{}",
        CALENDAR_API_BASE,
        urlencoding::encode(calendar_id)
    )
}

fn events_url(calendar_id: &str) -> String {
    format!("{}/events", calendar_url(calendar_id))
}

fn event_url(calendar_id: &str, event_id: &str) -> String {
    format!(
        "{}/events/{}",
        calendar_url(calendar_id),
        urlencoding::encode(event_id)
    )
}

fn instances_url(calendar_id: &str, event_id: &str) -> String {
    format!("{}/instances", event_url(calendar_id, event_id))
}

/// Query parameters for the events listing, recurring events expanded
/// and ordered by start time.
fn event_query_params(query: &EventQuery, page_token: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("singleEvents", "true".to_string()),
        ("orderBy", "startTime".to_string()),
    ];
    if let Some(time_min) = &query.time_min {
        params.push(("timeMin", time_min.clone()));
    }
    if let Some(time_max) = &query.time_max {
        params.push(("timeMax", time_max.clone()));
    }
    if let Some(text) = &query.text_query {
        params.push(("q", text.clone()));
    }
    if let Some(max) = query.max_results {
        params.push(("maxResults", max.to_string()));
    }
    if let Some(token) = page_token {
        params.push(("pageToken", token.to_string()));
    }
    params
}

/// Query parameters for the instances endpoint, which expands a single
/// series and supports only time bounds and paging.
fn instance_query_params(
    query: &EventQuery,
    page_token: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(time_min) = &query.time_min {
        params.push(("timeMin", time_min.clone()));
    }
    if let Some(time_max) = &query.time_max {
        params.push(("timeMax", time_max.clone()));
    }
    if let Some(max) = query.max_results {
        params.push(("maxResults", max.to_string()));
    }
    if let Some(token) = page_token {
        params.push(("pageToken", token.to_string()));
    }
    params
}
