//! Unix socket client for talking to the tool server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use calbridge_protocol::{Envelope, MAX_MESSAGE_SIZE, ToolCall, ToolResult};

use crate::error::{ClientError, ClientResult};

/// Client for invoking tools on the server over a Unix socket.
pub struct SocketClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl SocketClient {
    /// Creates a new socket client.
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    /// Creates a socket client with the default socket path.
    pub fn with_defaults() -> Self {
        Self::new(
            calbridge_server::default_socket_path(),
            Duration::from_secs(60),
        )
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Checks if the server socket exists.
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Sends a tool call and waits for its result envelope.
    pub async fn call(&self, call: ToolCall) -> ClientResult<ToolResult> {
        let request_id = Uuid::new_v4().to_string();
        let envelope = Envelope::request(&request_id, call);

        debug!(
            socket = %self.socket_path.display(),
            request_id = %request_id,
            "connecting to server"
        );

        // Connect with timeout
        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| {
                ClientError::Connection(format!(
                    "connection timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                ClientError::Connection(format!(
                    "failed to connect to {}: {}",
                    self.socket_path.display(),
                    e
                ))
            })?;

        let response = self.exchange(stream, &envelope).await?;

        // Validate response correlation
        if response.request_id != request_id {
            warn!(
                expected = %request_id,
                received = %response.request_id,
                "response request_id mismatch"
            );
        }

        Ok(response.payload)
    }

    /// Performs the framed request-response exchange on a connected stream.
    async fn exchange(
        &self,
        mut stream: UnixStream,
        envelope: &Envelope<ToolCall>,
    ) -> ClientResult<Envelope<ToolResult>> {
        // Serialize to JSON
        let json = serde_json::to_vec(envelope)
            .map_err(|e| ClientError::Protocol(format!("failed to serialize call: {}", e)))?;

        let len = json.len() as u32;
        if len > MAX_MESSAGE_SIZE {
            return Err(ClientError::Protocol(format!(
                "call too large: {} bytes (max: {})",
                len, MAX_MESSAGE_SIZE
            )));
        }

        // Write length-prefixed message
        tokio::time::timeout(self.timeout, async {
            stream.write_all(&len.to_be_bytes()).await?;
            stream.write_all(&json).await?;
            stream.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        .map_err(|_| ClientError::Timeout("sending call".into()))?
        .map_err(ClientError::Io)?;

        debug!("call sent, waiting for result");

        // Read length-prefixed response
        let payload = tokio::time::timeout(self.timeout, async {
            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await?;
            let resp_len = u32::from_be_bytes(len_buf) as usize;

            if resp_len as u32 > MAX_MESSAGE_SIZE {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "result too large: {} bytes (max: {})",
                        resp_len, MAX_MESSAGE_SIZE
                    ),
                ));
            }

            let mut payload = vec![0u8; resp_len];
            stream.read_exact(&mut payload).await?;

            Ok(payload)
        })
        .await
        .map_err(|_| ClientError::Timeout("reading result".into()))?
        .map_err(ClientError::Io)?;

        // Deserialize response
        let envelope: Envelope<ToolResult> = serde_json::from_slice(&payload)
            .map_err(|e| ClientError::Protocol(format!("failed to deserialize result: {}", e)))?;

        debug!(
            request_id = %envelope.request_id,
            "result received"
        );

        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_client_creation() {
        let client = SocketClient::new("/tmp/test.sock", Duration::from_secs(10));
        assert_eq!(client.socket_path(), Path::new("/tmp/test.sock"));
        assert!(!client.socket_exists());
    }

    #[test]
    fn default_client() {
        let client = SocketClient::with_defaults();
        assert!(
            client
                .socket_path()
                .to_string_lossy()
                .contains("calbridge")
        );
    }

    #[tokio::test]
    async fn call_roundtrips_against_a_live_server() {
        use calbridge_server::{ServerConfig, SocketServer};

        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = SocketServer::new(ServerConfig::new(&socket_path))
            .await
            .unwrap();

        let server_task = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let envelope = conn.read_call().await.unwrap().unwrap();
            assert_eq!(envelope.payload.tool, "listCalendars");
            conn.respond(
                &envelope.request_id,
                ToolResult::success().field("calendars", serde_json::json!([])),
            )
            .await
            .unwrap();
        });

        let client = SocketClient::new(&socket_path, Duration::from_secs(5));
        let result = client.call(ToolCall::new("listCalendars")).await.unwrap();

        assert!(result.ok);
        assert_eq!(result.fields["calendars"], serde_json::json!([]));
        server_task.await.unwrap();
    }
}
