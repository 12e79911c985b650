//! Serve command - runs the tool server in the foreground.

use std::sync::Arc;

use tracing::info;

use calbridge_gcal::{CalendarApi, GcalConfig, GoogleClient};
use calbridge_server::{ServerConfig, SocketServer, make_connection_handler};

use crate::cli::Cli;
use crate::error::{ClientError, ClientResult};

/// Starts the tool server in the foreground.
///
/// Blocks until a shutdown signal is received (SIGINT/SIGTERM).
pub async fn run(cli: &Cli) -> ClientResult<()> {
    let config =
        GcalConfig::from_env().map_err(|e| ClientError::Config(e.message().to_string()))?;
    let client = GoogleClient::new(config)?;

    // Surface credential problems at startup rather than on the first call.
    client.ensure_authenticated().await?;
    info!("calendar credentials verified");

    let api: Arc<dyn CalendarApi> = Arc::new(client);

    let socket_path = cli
        .socket_path
        .clone()
        .unwrap_or_else(calbridge_server::default_socket_path);

    let server = SocketServer::new(ServerConfig::new(&socket_path))
        .await
        .map_err(|e| ClientError::Config(format!("failed to start socket server: {}", e)))?;

    info!(path = %socket_path.display(), "Server listening");

    let handler = make_connection_handler(api);
    server
        .run_until_shutdown(handler, shutdown_signal())
        .await
        .map_err(|e| ClientError::Config(format!("server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}

/// Completes when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
}
