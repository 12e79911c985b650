//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// calbridge - calendar tools over a local socket
#[derive(Debug, Parser)]
#[command(name = "calbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Path to the server socket
    #[arg(long, env = "CALBRIDGE_SOCKET")]
    pub socket_path: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value = "60")]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the tool server in the foreground
    Serve,

    /// Obtain a Google refresh token via the OAuth browser flow
    Auth {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: String,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: String,
    },

    /// Invoke a tool on a running server
    Call {
        /// Tool name (e.g. listCalendars, createEvent)
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },
}
