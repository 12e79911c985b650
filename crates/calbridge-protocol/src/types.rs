//! Envelope, tool-call and result types for the calbridge protocol.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::PROTOCOL_VERSION;

/// Message envelope wrapping all protocol messages.
///
/// Every message exchanged between client and server is wrapped in this
/// envelope, which provides versioning and request correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version (always "1" for v1).
    pub protocol_version: String,
    /// Unique request ID for correlation.
    pub request_id: String,
    /// The actual payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current protocol version.
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Creates a request envelope.
    pub fn request(request_id: impl Into<String>, call: T) -> Self {
        Self::new(request_id, call)
    }

    /// Creates a response envelope.
    pub fn response(request_id: impl Into<String>, result: T) -> Self {
        Self::new(request_id, result)
    }

    /// Checks if this envelope uses a compatible protocol version.
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// A tool invocation: a registered tool name plus its named arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The registered tool name (e.g. "createEvent").
    pub tool: String,
    /// Named arguments, deserialized per tool into a typed struct.
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

impl ToolCall {
    /// Creates a call with no arguments.
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arguments: empty_arguments(),
        }
    }

    /// Creates a call with the given argument object.
    pub fn with_arguments(tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool: tool.into(),
            arguments,
        }
    }
}

/// Wire error kinds for the failure envelope.
///
/// The wire strings are stable API; callers dispatch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller input failed a precondition.
    #[serde(rename = "ValidationError")]
    Validation,
    /// Transient remote failure that exhausted its retries.
    #[serde(rename = "TransientRemoteError")]
    TransientRemote,
    /// The refresh credential is expired or revoked.
    #[serde(rename = "AuthExpiredError")]
    AuthExpired,
    /// A series split mutated the original but could not create the
    /// successor.
    #[serde(rename = "PartialFailureError")]
    PartialFailure,
    /// Non-retryable remote API failure (400/403/404 class).
    #[serde(rename = "RemoteApiError")]
    RemoteApi,
    /// Unexpected internal failure.
    #[serde(rename = "InternalError")]
    Internal,
}

impl ErrorKind {
    /// Returns the wire string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::TransientRemote => "TransientRemoteError",
            Self::AuthExpired => "AuthExpiredError",
            Self::PartialFailure => "PartialFailureError",
            Self::RemoteApi => "RemoteApiError",
            Self::Internal => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The error object of a failure envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    /// The error kind, serialized as the `type` field.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Human-readable error message.
    pub message: String,
}

impl ToolError {
    /// Creates a new tool error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolError {}

/// The uniform result envelope returned by every tool.
///
/// Serializes as `{"ok": true, ...fields...}` on success and
/// `{"ok": false, "error": {"type": ..., "message": ...}}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Error details, present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    /// Operation-specific success fields, flattened into the envelope.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ToolResult {
    /// Creates an empty success result (`{"ok": true}`).
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
            fields: Map::new(),
        }
    }

    /// Creates a failure result with the given kind and message.
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(ToolError::new(kind, message)),
            fields: Map::new(),
        }
    }

    /// Builder: attach one success field.
    ///
    /// Serialization failures degrade to `Value::Null` rather than
    /// escaping the envelope.
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(key.into(), value);
        self
    }

    /// Returns the error if this is a failure result.
    pub fn as_error(&self) -> Option<&ToolError> {
        self.error.as_ref()
    }
}

impl From<ToolError> for ToolResult {
    fn from(error: ToolError) -> Self {
        Self {
            ok: false,
            error: Some(error),
            fields: Map::new(),
        }
    }
}
