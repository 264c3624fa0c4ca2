//! gqlfuzz Transport Layer
//!
//! The fuzzing engine only ever talks to a target through the [`Transport`]
//! trait: `send(request, timeout) -> response | transport error`. Auth, TLS
//! and connection pooling belong to the implementation.
//!
//! This crate provides:
//! - [`RenderedRequest`]: a fully materialized GraphQL request
//! - [`TransportResponse`] / [`TransportError`]: the two possible results of a send
//! - [`http`]: a blocking `ureq` client adapted to the async trait
//!
//! # Example
//!
//! ```ignore
//! use gqlfuzz_transport::{HttpTransport, RenderedRequest, Transport};
//!
//! let transport = HttpTransport::new("http://localhost:4000/graphql")
//!     .with_header("Authorization", "Bearer ...");
//! let response = transport.send(&request, Duration::from_secs(5)).await?;
//! ```

pub mod http;

pub use http::HttpTransport;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A GraphQL request ready to be put on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedRequest {
    /// Root field being exercised (e.g. `createUser`).
    pub operation_name: String,
    /// GraphQL document text.
    pub query: String,
    /// Variables object referenced by the document.
    pub variables: Value,
}

impl RenderedRequest {
    /// JSON body as sent to a GraphQL-over-HTTP endpoint.
    pub fn body(&self) -> Value {
        serde_json::json!({
            "query": self.query,
            "variables": self.variables,
        })
    }
}

/// Raw response returned by a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportResponse {
    /// HTTP status code (or an equivalent for non-HTTP transports).
    pub status: u16,
    /// Response body as text.
    pub body: String,
    /// Wall-clock time the exchange took.
    #[serde(default)]
    pub elapsed: Duration,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            elapsed: Duration::ZERO,
        }
    }

    /// Convenience constructor for JSON bodies.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Parse the body as JSON, if it is JSON.
    pub fn parse_json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// Failure to obtain any response from the target.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// The single seam between the engine and the system under test.
///
/// Implementations must be cheap to share across worker tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &RenderedRequest,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(
        &self,
        request: &RenderedRequest,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        (**self).send(request, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let req = RenderedRequest {
            operation_name: "createUser".into(),
            query: "mutation { createUser { id } }".into(),
            variables: json!({"name": "a"}),
        };
        let body = req.body();
        assert_eq!(body["query"], "mutation { createUser { id } }");
        assert_eq!(body["variables"]["name"], "a");
    }

    #[test]
    fn test_response_status_helpers() {
        assert!(TransportResponse::new(503, "").is_server_error());
        assert!(TransportResponse::new(400, "").is_client_error());
        assert!(!TransportResponse::new(200, "").is_server_error());
    }

    #[test]
    fn test_response_parse_json() {
        let resp = TransportResponse::json(200, &json!({"data": {"ok": true}}));
        assert_eq!(resp.parse_json().unwrap()["data"]["ok"], true);
        assert!(TransportResponse::new(200, "<html>").parse_json().is_none());
    }
}
