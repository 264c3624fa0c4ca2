//! Scripted transports.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use gqlfuzz::{RenderedRequest, Transport, TransportError, TransportResponse};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

type Reply = Result<TransportResponse, TransportError>;
type Fallback = Box<dyn Fn(&RenderedRequest) -> Reply + Send + Sync>;

/// Replies from per-operation queues, then from a fallback.
///
/// The default fallback answers `{"data": {<operation>: null}}`.
pub struct ScriptedTransport {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Fallback,
    sent: Mutex<Vec<RenderedRequest>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::with_fallback(|request| {
            let mut data = Map::new();
            data.insert(request.operation_name.clone(), Value::Null);
            Ok(TransportResponse::json(200, &json!({ "data": data })))
        })
    }
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(
        fallback: impl Fn(&RenderedRequest) -> Reply + Send + Sync + 'static,
    ) -> Self {
        Self {
            queued: Mutex::new(HashMap::new()),
            fallback: Box::new(fallback),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Queue the next reply for `operation`.
    pub fn push(&self, operation: &str, reply: Reply) -> &Self {
        self.queued
            .lock()
            .entry(operation.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue a 200 response with `data.<operation> = value`.
    pub fn push_data(&self, operation: &str, value: Value) -> &Self {
        self.push(operation, Ok(respond_with(operation, value)))
    }

    pub fn sent(&self) -> Vec<RenderedRequest> {
        self.sent.lock().clone()
    }

    pub fn sent_for(&self, operation: &str) -> Vec<RenderedRequest> {
        self.sent
            .lock()
            .iter()
            .filter(|r| r.operation_name == operation)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RenderedRequest, _timeout: Duration) -> Reply {
        self.sent.lock().push(request.clone());
        let queued = self
            .queued
            .lock()
            .get_mut(&request.operation_name)
            .and_then(VecDeque::pop_front);
        match queued {
            Some(reply) => reply,
            None => (self.fallback)(request),
        }
    }
}

/// A 200 response carrying `data.<operation> = value`.
pub fn respond_with(operation: &str, value: Value) -> TransportResponse {
    let mut data = Map::new();
    data.insert(operation.to_string(), value);
    TransportResponse::json(200, &json!({ "data": data }))
}
