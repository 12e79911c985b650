//! Command-line client and server entry point for calbridge.
//!
//! Provides:
//! - The `serve` command that runs the socket server in the foreground
//! - The `auth` command that walks through the OAuth consent flow
//! - The `call` command that sends a single tool call and prints the result

pub mod cli;
pub mod commands;
pub mod error;
pub mod socket;

// Re-export main types at crate root
pub use cli::Cli;
pub use error::{ClientError, ClientResult};
pub use socket::SocketClient;
