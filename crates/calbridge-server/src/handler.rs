//! Tool-call dispatch.
//!
//! This module routes incoming tool calls to the calendar operations and
//! wraps every outcome, success or failure, in the uniform result
//! envelope. No error escapes a handler: malformed arguments, backend
//! failures and unknown tool names all come back as `{"ok": false, ...}`
//! with a wire error kind the caller can dispatch on.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use calbridge_gcal::{
    CalendarApi, CancelInstanceParams, CreateEventParams, DeleteEventParams, GcalError,
    GcalErrorCode, ListEventsParams, ListInstancesParams, ResolveCalendarParams,
    SplitFollowingParams, UpdateEventParams, events, resolver, series,
};
use calbridge_protocol::{ErrorKind, ToolCall, ToolResult};

use crate::error::ServerResult;
use crate::socket::Connection;

/// The nine registered tool names.
pub const TOOL_NAMES: [&str; 9] = [
    "listCalendars",
    "listEvents",
    "createEvent",
    "updateEvent",
    "deleteEvent",
    "resolveCalendar",
    "listRecurringInstances",
    "cancelRecurringInstance",
    "updateFollowingInstances",
];

/// Empty argument struct for tools that take none.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArguments {}

/// Dispatches tool calls to the calendar backend.
pub struct ToolHandler {
    api: Arc<dyn CalendarApi>,
}

impl ToolHandler {
    /// Creates a handler backed by the given calendar API.
    pub fn new(api: Arc<dyn CalendarApi>) -> Self {
        Self { api }
    }

    /// Handles a single tool call and returns the result envelope.
    #[tracing::instrument(skip_all, fields(tool = %call.tool, duration_ms))]
    pub async fn handle(&self, call: &ToolCall) -> ToolResult {
        use tracing::Span;

        let start = std::time::Instant::now();
        debug!("Handling tool call");

        let result = match call.tool.as_str() {
            "listCalendars" => self.list_calendars(&call.arguments).await,
            "listEvents" => self.list_events(&call.arguments).await,
            "createEvent" => self.create_event(&call.arguments).await,
            "updateEvent" => self.update_event(&call.arguments).await,
            "deleteEvent" => self.delete_event(&call.arguments).await,
            "resolveCalendar" => self.resolve_calendar(&call.arguments).await,
            "listRecurringInstances" => self.list_instances(&call.arguments).await,
            "cancelRecurringInstance" => self.cancel_instance(&call.arguments).await,
            "updateFollowingInstances" => self.split_following(&call.arguments).await,
            other => ToolResult::failure(
                ErrorKind::Validation,
                format!("unknown tool: {}", other),
            ),
        };

        let duration = start.elapsed();
        if tracing::enabled!(tracing::Level::DEBUG) {
            Span::current().record("duration_ms", duration.as_millis());
            debug!(
                ok = result.ok,
                duration_ms = duration.as_millis(),
                "Tool call handled"
            );
        }

        result
    }

    async fn list_calendars(&self, arguments: &Value) -> ToolResult {
        let _: NoArguments = match parse_arguments(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };
        match resolver::list_calendars(self.api.as_ref()).await {
            Ok(calendars) => ToolResult::success().field("calendars", calendars),
            Err(error) => failure(error),
        }
    }

    async fn list_events(&self, arguments: &Value) -> ToolResult {
        let params: ListEventsParams = match parse_arguments(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };
        match events::list_events(self.api.as_ref(), &params).await {
            Ok(events) => ToolResult::success().field("events", events),
            Err(error) => failure(error),
        }
    }

    async fn create_event(&self, arguments: &Value) -> ToolResult {
        let params: CreateEventParams = match parse_arguments(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };
        match events::create_event(self.api.as_ref(), &params).await {
            Ok(event) => ToolResult::success().field("event", event),
            Err(error) => failure(error),
        }
    }

    async fn update_event(&self, arguments: &Value) -> ToolResult {
        let params: UpdateEventParams = match parse_arguments(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };
        match events::update_event(self.api.as_ref(), &params).await {
            Ok(event) => ToolResult::success().field("event", event),
            Err(error) => failure(error),
        }
    }

    async fn delete_event(&self, arguments: &Value) -> ToolResult {
        let params: DeleteEventParams = match parse_arguments(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };
        match events::delete_event(self.api.as_ref(), &params).await {
            Ok(()) => ToolResult::success(),
            Err(error) => failure(error),
        }
    }

    async fn resolve_calendar(&self, arguments: &Value) -> ToolResult {
        let params: ResolveCalendarParams = match parse_arguments(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };
        match resolver::resolve_calendar(self.api.as_ref(), params.query.as_deref()).await {
            Ok(resolved) => ToolResult::success()
                .field("calendarId", resolved.calendar_id)
                .field("summary", resolved.summary),
            Err(error) => failure(error),
        }
    }

    async fn list_instances(&self, arguments: &Value) -> ToolResult {
        let params: ListInstancesParams = match parse_arguments(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };
        match series::list_instances(self.api.as_ref(), &params).await {
            Ok(instances) => ToolResult::success().field("instances", instances),
            Err(error) => failure(error),
        }
    }

    async fn cancel_instance(&self, arguments: &Value) -> ToolResult {
        let params: CancelInstanceParams = match parse_arguments(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };
        match series::cancel_instance(self.api.as_ref(), &params).await {
            Ok(event) => ToolResult::success().field("event", event),
            Err(error) => failure(error),
        }
    }

    async fn split_following(&self, arguments: &Value) -> ToolResult {
        let params: SplitFollowingParams = match parse_arguments(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };
        match series::split_following(self.api.as_ref(), &params).await {
            Ok(event) => ToolResult::success().field("event", event),
            Err(error) => failure(error),
        }
    }

    /// Handles a connection, processing all calls until the client disconnects.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        loop {
            match conn.read_call().await {
                Ok(Some(envelope)) => {
                    let result = self.handle(&envelope.payload).await;
                    conn.respond(&envelope.request_id, result).await?;
                }
                Ok(None) => {
                    // Client disconnected cleanly
                    debug!("Client disconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Error reading call");
                    return Err(e);
                }
            }
        }
    }
}

/// Deserializes a tool's argument struct, mapping failures to the
/// validation envelope.
fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: &Value) -> Result<T, ToolResult> {
    serde_json::from_value(arguments.clone()).map_err(|e| {
        ToolResult::failure(ErrorKind::Validation, format!("invalid arguments: {}", e))
    })
}

/// Maps a backend error code onto its wire error kind.
fn error_kind(code: GcalErrorCode) -> ErrorKind {
    match code {
        GcalErrorCode::Validation => ErrorKind::Validation,
        GcalErrorCode::RateLimited | GcalErrorCode::Server => ErrorKind::TransientRemote,
        GcalErrorCode::Authentication => ErrorKind::AuthExpired,
        GcalErrorCode::PartialFailure => ErrorKind::PartialFailure,
        GcalErrorCode::Forbidden
        | GcalErrorCode::NotFound
        | GcalErrorCode::BadRequest
        | GcalErrorCode::Network
        | GcalErrorCode::InvalidResponse => ErrorKind::RemoteApi,
        GcalErrorCode::Configuration | GcalErrorCode::Internal => ErrorKind::Internal,
    }
}

fn failure(error: GcalError) -> ToolResult {
    ToolResult::failure(error_kind(error.code()), error.message())
}

/// Creates a connection handler function for use with `SocketServer::run`.
pub fn make_connection_handler(
    api: Arc<dyn CalendarApi>,
) -> impl Fn(Connection) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
+ Send
+ Sync
+ 'static {
    move |conn| {
        let handler = ToolHandler::new(api.clone());
        Box::pin(async move {
            if let Err(e) = handler.handle_connection(conn).await {
                warn!(error = %e, "Connection handler error");
            }
        })
    }
}
