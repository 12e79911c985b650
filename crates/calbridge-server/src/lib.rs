//! Tool server: socket listener, dispatch, result envelopes.
//!
//! This crate provides the calbridge tool server:
//! - Unix socket IPC for client communication
//! - Tool-call dispatch onto the calendar backend
//! - The uniform `{ok, ...}` result envelope for every outcome
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use calbridge_gcal::{CalendarApi, GcalConfig, GoogleClient};
//! use calbridge_server::{ServerConfig, SocketServer, make_connection_handler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GoogleClient::new(GcalConfig::from_env()?)?;
//!     let api: Arc<dyn CalendarApi> = Arc::new(client);
//!
//!     let server = SocketServer::new(ServerConfig::default()).await?;
//!     server.run(make_connection_handler(api)).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod handler;
mod socket;

pub use config::{ServerConfig, default_socket_path};
pub use error::{ServerError, ServerResult};
pub use handler::{TOOL_NAMES, ToolHandler, make_connection_handler};
pub use socket::{Connection, SocketServer};
