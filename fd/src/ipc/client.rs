//! IPC client for talking to a running fleetd server

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::messages::{FleetRequest, FleetResponse};
use super::{MAX_MESSAGE_SIZE, get_socket_path};
use crate::coordinator::FailureSummary;
use crate::domain::{AgentId, AgentStatus, Assignment, SlotStatus};
use crate::filter::Criteria;

/// Default timeout for IPC operations
///
/// Generous because install and terminate wait on remote agents.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Successes and failures of an install or terminate
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    pub slots: Vec<SlotStatus>,
    pub failures: Vec<FailureSummary>,
}

/// Client for the fleetd IPC socket
#[derive(Debug, Clone)]
pub struct FleetClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for FleetClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(get_socket_path())
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    pub async fn list_slots(&self, criteria: Criteria) -> Result<Vec<SlotStatus>> {
        debug!(?criteria, "FleetClient::list_slots: called");
        match self.send_request(FleetRequest::ListSlots { criteria }).await? {
            FleetResponse::Slots { slots } => Ok(slots),
            other => Err(unexpected(other)),
        }
    }

    pub async fn install(&self, criteria: Criteria, limit: usize, assignment: Assignment) -> Result<DispatchOutcome> {
        debug!(?criteria, %limit, "FleetClient::install: called");
        let request = FleetRequest::Install {
            criteria,
            limit,
            assignment,
        };
        match self.send_request(request).await? {
            FleetResponse::Dispatched { slots, failures } => Ok(DispatchOutcome { slots, failures }),
            other => Err(unexpected(other)),
        }
    }

    pub async fn terminate(&self, criteria: Criteria) -> Result<DispatchOutcome> {
        debug!(?criteria, "FleetClient::terminate: called");
        match self.send_request(FleetRequest::Terminate { criteria }).await? {
            FleetResponse::Dispatched { slots, failures } => Ok(DispatchOutcome { slots, failures }),
            other => Err(unexpected(other)),
        }
    }

    pub async fn announce(&self, status: AgentStatus) -> Result<()> {
        debug!(agent_id = %status.agent_id, "FleetClient::announce: called");
        match self.send_request(FleetRequest::Announce { status }).await? {
            FleetResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn agent_offline(&self, agent_id: AgentId) -> Result<()> {
        debug!(%agent_id, "FleetClient::agent_offline: called");
        match self.send_request(FleetRequest::AgentOffline { agent_id }).await? {
            FleetResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn get_agent(&self, agent_id: AgentId) -> Result<AgentStatus> {
        debug!(%agent_id, "FleetClient::get_agent: called");
        match self.send_request(FleetRequest::GetAgent { agent_id }).await? {
            FleetResponse::Agent { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_agents(&self, criteria: Criteria) -> Result<Vec<AgentStatus>> {
        debug!(?criteria, "FleetClient::list_agents: called");
        match self.send_request(FleetRequest::ListAgents { criteria }).await? {
            FleetResponse::Agents { agents } => Ok(agents),
            other => Err(unexpected(other)),
        }
    }

    /// Check if the server is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("FleetClient::ping: called");
        match self.send_request(FleetRequest::Ping).await? {
            FleetResponse::Pong { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Request the server to shut down gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("FleetClient::shutdown: called");
        match self.send_request(FleetRequest::Shutdown).await? {
            FleetResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Send a request and wait for the response
    async fn send_request(&self, request: FleetRequest) -> Result<FleetResponse> {
        debug!(?self.socket_path, ?request, "FleetClient::send_request: called");

        let mut stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .with_context(|| format!("Failed to connect to {}", self.socket_path.display()))?;

        let request_json = serde_json::to_string(&request).context("Failed to serialize request")?;
        if request_json.len() > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!("Message too large: {} bytes", request_json.len()));
        }

        tokio::time::timeout(self.timeout, async {
            stream
                .write_all(request_json.as_bytes())
                .await
                .context("Failed to write message")?;
            stream.write_all(b"\n").await.context("Failed to write newline")?;
            stream.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")??;

        let mut response_line = String::new();
        tokio::time::timeout(self.timeout, async {
            let bytes_read = BufReader::new(&mut stream)
                .take(MAX_MESSAGE_SIZE as u64 + 1)
                .read_line(&mut response_line)
                .await
                .context("Failed to read response")?;

            if bytes_read > MAX_MESSAGE_SIZE {
                return Err(eyre::eyre!("Response too large: more than {} bytes", MAX_MESSAGE_SIZE));
            }
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Read timeout")??;

        let response: FleetResponse =
            serde_json::from_str(response_line.trim()).context("Failed to parse server response")?;
        debug!(?response, "FleetClient::send_request: received response");

        match response {
            FleetResponse::Error { kind, message } => Err(eyre::eyre!("{}: {}", kind, message)),
            response => Ok(response),
        }
    }
}

fn unexpected(response: FleetResponse) -> eyre::Error {
    eyre::eyre!("Unexpected response: {:?}", response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::listener::{create_listener_at, read_request, send_response};
    use tempfile::TempDir;

    #[test]
    fn test_client_default_path() {
        let client = FleetClient::default();
        assert!(client.socket_path.ends_with("fleetd.sock"));
    }

    #[test]
    fn test_client_with_timeout() {
        let client = FleetClient::new().with_timeout(Duration::from_secs(10));
        assert_eq!(client.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_socket_exists_false() {
        let temp = TempDir::new().unwrap();
        let client = FleetClient::with_socket_path(temp.path().join("nonexistent.sock"));
        assert!(!client.socket_exists());
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("test.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await.unwrap();
            assert_eq!(request, FleetRequest::Ping);
            send_response(
                &mut stream,
                &FleetResponse::Pong {
                    version: "test-version".to_string(),
                },
            )
            .await
            .unwrap();
        });

        let client = FleetClient::with_socket_path(socket_path);
        assert_eq!(client.ping().await.unwrap(), "test-version");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_response_becomes_error() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("test.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_request(&mut stream).await.unwrap();
            send_response(
                &mut stream,
                &FleetResponse::Error {
                    kind: "NotFound".to_string(),
                    message: "Not found: agent a9".to_string(),
                },
            )
            .await
            .unwrap();
        });

        let client = FleetClient::with_socket_path(socket_path);
        let err = client.get_agent(AgentId::from("a9")).await.unwrap_err();
        assert!(err.to_string().contains("NotFound"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let temp = TempDir::new().unwrap();
        let client = FleetClient::with_socket_path(temp.path().join("missing.sock"));
        assert!(client.ping().await.is_err());
    }
}
