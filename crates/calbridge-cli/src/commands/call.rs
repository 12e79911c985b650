//! Call command - sends a single tool call to a running server.

use std::time::Duration;

use serde_json::Value;

use calbridge_protocol::ToolCall;

use crate::cli::Cli;
use crate::error::{ClientError, ClientResult};
use crate::socket::SocketClient;

/// Sends one tool call and prints the result envelope as pretty JSON.
///
/// Returns whether the call succeeded so the caller can set the exit code.
pub async fn run(cli: &Cli, tool: String, arguments: String) -> ClientResult<bool> {
    let arguments = parse_arguments(&arguments)?;

    let client = match &cli.socket_path {
        Some(path) => SocketClient::new(path, Duration::from_secs(cli.timeout)),
        None => SocketClient::new(
            calbridge_server::default_socket_path(),
            Duration::from_secs(cli.timeout),
        ),
    };

    if !client.socket_exists() {
        return Err(ClientError::Connection(format!(
            "no server socket at {}; is `calbridge serve` running?",
            client.socket_path().display()
        )));
    }

    let result = client.call(ToolCall::with_arguments(tool, arguments)).await?;

    let rendered = serde_json::to_string_pretty(&result)
        .map_err(|e| ClientError::Protocol(format!("failed to render result: {}", e)))?;
    println!("{}", rendered);

    Ok(result.ok)
}

fn parse_arguments(raw: &str) -> ClientResult<Value> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ClientError::Protocol(format!("invalid arguments JSON: {}", e)))?;
    if !value.is_object() {
        return Err(ClientError::Protocol(
            "arguments must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}
