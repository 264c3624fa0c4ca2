//! GraphQL-over-HTTP transport backed by a blocking `ureq` agent.
//!
//! `ureq` is synchronous, so every send runs on the blocking pool via
//! `spawn_blocking`. Non-2xx responses are *responses*, not transport errors:
//! the engine needs the status and body to classify them.
//!
//! ## Timeouts
//!
//! The per-request timeout passed to [`Transport::send`] always applies. The
//! agent-level defaults can be overridden with:
//! - `GQLFUZZ_HTTP_TIMEOUT_SECS` (default 30)
//! - `GQLFUZZ_HTTP_CONNECT_TIMEOUT_SECS` (default 10)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use gqlfuzz_types::env_utils::env_var_or;

use crate::{RenderedRequest, Transport, TransportError, TransportResponse};

/// HTTP transport for a single GraphQL endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    endpoint: String,
    agent: ureq::Agent,
    headers: Vec<(String, String)>,
}

impl HttpTransport {
    /// Default overall timeout in seconds (can be overridden by env).
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Default connect timeout in seconds (can be overridden by env).
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    fn default_timeouts() -> (Duration, Duration) {
        let timeout_secs = env_var_or("GQLFUZZ_HTTP_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS);
        let connect_secs = env_var_or(
            "GQLFUZZ_HTTP_CONNECT_TIMEOUT_SECS",
            Self::DEFAULT_CONNECT_TIMEOUT_SECS,
        );
        (
            Duration::from_secs(timeout_secs),
            Duration::from_secs(connect_secs),
        )
    }

    fn build_agent(timeout: Duration, connect_timeout: Duration) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .build()
    }

    /// Create a transport for `endpoint` with env-derived default timeouts.
    pub fn new(endpoint: &str) -> Self {
        let (timeout, connect_timeout) = Self::default_timeouts();
        Self::with_timeouts(endpoint, timeout, connect_timeout)
    }

    /// Create a transport with explicit agent timeouts.
    pub fn with_timeouts(endpoint: &str, timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            agent: Self::build_agent(timeout, connect_timeout),
            headers: Vec::new(),
        }
    }

    /// Add a header sent with every request (e.g. `Authorization`).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send_blocking(
        &self,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let started = Instant::now();
        let mut request = self
            .agent
            .post(&self.endpoint)
            .timeout(timeout)
            .set("Content-Type", "application/json");
        for (name, value) in &self.headers {
            request = request.set(name, value);
        }

        let response = match request.send_json(body) {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(err)) => {
                return Err(classify_transport_error(&err, timeout));
            }
        };

        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| io_error(e, timeout))?;
        Ok(TransportResponse {
            status,
            body,
            elapsed: started.elapsed(),
        })
    }
}

fn io_error(err: std::io::Error, timeout: Duration) -> TransportError {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            TransportError::Timeout(timeout)
        }
        _ => TransportError::Connection(err.to_string()),
    }
}

fn classify_transport_error(err: &ureq::Transport, timeout: Duration) -> TransportError {
    let message = err.to_string();
    if message.to_lowercase().contains("timed out") {
        return TransportError::Timeout(timeout);
    }
    match err.kind() {
        ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Io => {
            TransportError::Connection(message)
        }
        _ => TransportError::Other(message),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &RenderedRequest,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let this = self.clone();
        let body = request.body();
        tokio::task::spawn_blocking(move || this.send_blocking(body, timeout))
            .await
            .map_err(|e| TransportError::Other(format!("send task failed: {}", e)))?
    }
}
