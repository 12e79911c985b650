//! Tool-call framing and result envelope for calbridge.
//!
//! This crate defines the wire contract between the tool server and its
//! clients over Unix sockets.
//!
//! # Protocol Overview
//!
//! Messages are sent as length-prefixed JSON:
//! - 4 bytes: message length (u32, big-endian)
//! - N bytes: JSON payload
//!
//! Every message is wrapped in an [`Envelope`] containing:
//! - `protocol_version`: always "1" for this version
//! - `request_id`: opaque id for request/response correlation
//! - `payload`: a [`ToolCall`] (client to server) or [`ToolResult`]
//!   (server to client)
//!
//! A [`ToolResult`] is the uniform operation envelope: success carries
//! `ok: true` plus operation-specific fields, failure carries `ok: false`
//! and an `error` object with a `type` and a `message`. No tool ever
//! reports failure any other way.
//!
//! # Example
//!
//! ```rust
//! use calbridge_protocol::{Envelope, ToolCall, encode_message, decode_message};
//!
//! let call = ToolCall::new("listCalendars");
//! let request = Envelope::request("req-123", call);
//! let bytes = encode_message(&request).unwrap();
//! let decoded: Envelope<ToolCall> = decode_message(&bytes).unwrap();
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FrameReader, FrameWriter, decode_message, encode_message};
pub use types::{Envelope, ErrorKind, ToolCall, ToolError, ToolResult};

/// Protocol version constant.
pub const PROTOCOL_VERSION: &str = "1";

/// Maximum message size (1 MB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
