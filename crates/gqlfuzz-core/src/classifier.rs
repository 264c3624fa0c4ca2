//! Response classification.
//!
//! ## Status Meanings
//!
//! | Status | Description |
//! |--------|-------------|
//! | `SUCCESS` | 2xx, JSON body, no GraphQL errors, non-null `data.<op>` |
//! | `CLIENT_ERROR` | Validation or business error, 4xx, or null data (by policy) |
//! | `SERVER_ERROR` | 5xx, or a transport failure that exhausted its retries |
//! | `TIMEOUT` | Every attempt timed out |
//! | `SCHEMA_VIOLATION` | 2xx whose errors carry an unhandled-exception signature, or a non-JSON 2xx body |
//!
//! Only `SERVER_ERROR` and `SCHEMA_VIOLATION` are findings by default; the
//! policy can promote client errors and timeouts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use gqlfuzz_transport::TransportResponse;

use crate::utils::truncate_message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    ClientError,
    ServerError,
    Timeout,
    SchemaViolation,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::ClientError => "CLIENT_ERROR",
            Status::ServerError => "SERVER_ERROR",
            Status::Timeout => "TIMEOUT",
            Status::SchemaViolation => "SCHEMA_VIOLATION",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides which responses count as bugs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationPolicy {
    /// Case-insensitive substrings of an error message (or its
    /// `extensions.code`) that mark an unhandled server-side exception.
    pub exception_signatures: Vec<String>,
    pub client_errors_are_findings: bool,
    pub timeouts_are_findings: bool,
    /// Treat `data.<op> == null` without errors as success.
    pub null_data_is_success: bool,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            exception_signatures: [
                "cannot return null for non-nullable field",
                "internal server error",
                "internal_server_error",
                "unexpected error",
                "uncaught exception",
                "internal exception",
                "nullpointerexception",
                "traceback",
                "stack trace",
                "panicked at",
                "segmentation fault",
                "sqlstate",
                "syntax error at or near",
                "unhandled",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            client_errors_are_findings: false,
            timeouts_are_findings: false,
            null_data_is_success: false,
        }
    }
}

/// Result of classifying one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: Status,
    /// Human-readable cause (first relevant error message, truncated).
    pub reason: Option<String>,
    /// Parsed body, when it was JSON.
    pub payload: Option<Value>,
    /// `(type, field)` named by a non-null violation.
    pub non_null_violation: Option<(String, String)>,
}

impl Classification {
    fn new(status: Status, reason: Option<String>, payload: Option<Value>) -> Self {
        Self {
            status,
            reason,
            payload,
            non_null_violation: None,
        }
    }
}

impl ClassificationPolicy {
    pub fn is_finding(&self, status: Status) -> bool {
        match status {
            Status::ServerError | Status::SchemaViolation => true,
            Status::ClientError => self.client_errors_are_findings,
            Status::Timeout => self.timeouts_are_findings,
            Status::Success => false,
        }
    }

    fn signature_of(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.exception_signatures
            .iter()
            .any(|s| !s.is_empty() && lower.contains(&s.to_lowercase()))
    }

    /// Classify the response to `operation`.
    pub fn classify(&self, operation: &str, response: &TransportResponse) -> Classification {
        let payload = response.parse_json();
        let messages = payload.as_ref().map(error_messages).unwrap_or_default();
        let first = messages.first().map(|m| truncate_message(m));

        if response.is_server_error() {
            let reason = first.unwrap_or_else(|| format!("HTTP {}", response.status));
            return Classification::new(Status::ServerError, Some(reason), payload);
        }
        if !(200..300).contains(&response.status) {
            let reason = first.unwrap_or_else(|| format!("HTTP {}", response.status));
            return Classification::new(Status::ClientError, Some(reason), payload);
        }
        let Some(body) = payload else {
            return Classification::new(
                Status::SchemaViolation,
                Some(format!("non-JSON response body: {}", truncate_message(&response.body))),
                None,
            );
        };

        if !messages.is_empty() {
            let codes = error_codes(&body);
            let hit = messages
                .iter()
                .find(|m| self.signature_of(m))
                .or_else(|| codes.iter().find(|c| self.signature_of(c)));
            return match hit {
                Some(message) => Classification {
                    status: Status::SchemaViolation,
                    reason: Some(truncate_message(message)),
                    non_null_violation: messages.iter().find_map(|m| non_null_violation(m)),
                    payload: Some(body),
                },
                None => Classification::new(Status::ClientError, first, Some(body)),
            };
        }

        let data = body.get("data").and_then(|d| d.get(operation));
        if data.map_or(true, Value::is_null) && !self.null_data_is_success {
            return Classification::new(
                Status::ClientError,
                Some(format!("null data for '{}'", operation)),
                Some(body),
            );
        }
        Classification::new(Status::Success, None, Some(body))
    }
}

fn error_messages(body: &Value) -> Vec<String> {
    body.get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .map(|e| match e.get("message").and_then(Value::as_str) {
                    Some(m) => m.to_string(),
                    None => e.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn error_codes(body: &Value) -> Vec<String> {
    body.get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.pointer("/extensions/code").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse `T.f` out of a "Cannot return null for non-nullable field T.f"
/// error message.
pub fn non_null_violation(message: &str) -> Option<(String, String)> {
    const MARKER: &str = "non-nullable field";
    let lower = message.to_ascii_lowercase();
    let start = lower.find(MARKER)? + MARKER.len();
    let token = message[start..]
        .split_whitespace()
        .next()?
        .trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_');
    let (type_name, field) = token.split_once('.')?;
    if type_name.is_empty() || field.is_empty() {
        return None;
    }
    Some((type_name.to_string(), field.to_string()))
}
