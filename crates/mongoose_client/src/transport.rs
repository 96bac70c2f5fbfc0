//! Transport layer: issues gateway requests and validates the replies.

use crate::error::{ClientError, ClientResult};
use crate::http::{HttpClient, HttpRequest};
use async_trait::async_trait;
use mongoose_protocol::{decode_body, validate, Method, Params, Response};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Something that can send a gateway request and return a validated reply.
///
/// The command façade depends only on this trait. Each call is one
/// independent request: no retry, no ordering relative to other calls.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Sends `params` to `path` and returns the validated response.
    ///
    /// A reply whose `ok` is falsy comes back as
    /// [`ClientError::RemoteFailure`]; anything that prevents a decoded reply
    /// comes back as [`ClientError::TransportFailure`].
    async fn request(&self, method: Method, path: &str, params: Params) -> ClientResult<Response>;
}

/// Runs the response validator over a decoded payload.
pub fn check_response(payload: Option<Value>) -> ClientResult<Response> {
    let validation = validate(payload.as_ref());
    if !validation.ok {
        return Err(ClientError::RemoteFailure {
            message: validation.message,
        });
    }
    // validate() only succeeds on a present payload
    Ok(Response::new(payload.unwrap_or(Value::Null)))
}

/// HTTP-based transport.
///
/// Uses JSON for response bodies and form/query encoding for parameters.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the gateway (e.g., "http://localhost:27080").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the message of the last failed request, cleared on success.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn record(&self, result: ClientResult<Response>) -> ClientResult<Response> {
        match &result {
            Ok(_) => *self.last_error.write() = None,
            Err(e) => *self.last_error.write() = Some(e.to_string()),
        }
        result
    }
}

#[async_trait]
impl<C: HttpClient> Requester for HttpTransport<C> {
    async fn request(&self, method: Method, path: &str, params: Params) -> ClientResult<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, params = params.len(), "sending gateway request");

        let response = match self.client.send(HttpRequest { method, url, params }).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%method, path, error = %e, "gateway request failed");
                return self.record(Err(ClientError::transport(e)));
            }
        };

        if !response.is_success() {
            warn!(%method, path, status = response.status, "gateway returned error status");
            let message = if response.body.is_empty() {
                format!("HTTP {}", response.status)
            } else {
                response.body
            };
            return self.record(Err(ClientError::http_status(response.status, message)));
        }

        let payload = match decode_body(&response.body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%method, path, error = %e, "couldn't decode gateway response");
                return self.record(Err(e.into()));
            }
        };

        let result = check_response(Some(payload));
        if let Err(e) = &result {
            warn!(%method, path, error = %e, "gateway reported failure");
        }
        self.record(result)
    }
}

/// A request captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Parameters in the order they were sent.
    pub params: Params,
}

impl RecordedRequest {
    /// Returns the value of a parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parses a parameter as JSON.
    pub fn json_param(&self, key: &str) -> Option<Value> {
        self.param(key).and_then(|v| serde_json::from_str(v).ok())
    }
}

#[derive(Debug)]
enum MockReply {
    Payload(Option<Value>),
    TransportFailure(String),
}

/// A mock transport for testing.
///
/// Records every request and answers from a queue of canned replies,
/// falling back to `{"ok": 1}` when the queue is empty. Replies go through
/// the same validator as [`HttpTransport`].
#[derive(Debug, Default)]
pub struct MockTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    replies: Mutex<VecDeque<MockReply>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a decoded payload as the next reply.
    pub fn push_response(&self, payload: Value) {
        self.replies.lock().push_back(MockReply::Payload(Some(payload)));
    }

    /// Queues a reply with no payload at all.
    pub fn push_empty_response(&self) {
        self.replies.lock().push_back(MockReply::Payload(None));
    }

    /// Queues a transport failure as the next reply.
    pub fn push_transport_failure(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .push_back(MockReply::TransportFailure(message.into()));
    }

    /// Returns all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns the most recent request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    /// Returns the number of requests issued.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Requester for MockTransport {
    async fn request(&self, method: Method, path: &str, params: Params) -> ClientResult<Response> {
        self.requests.lock().push(RecordedRequest {
            method,
            path: path.to_string(),
            params,
        });

        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockReply::Payload(Some(serde_json::json!({"ok": 1}))));

        match reply {
            MockReply::Payload(payload) => check_response(payload),
            MockReply::TransportFailure(message) => Err(ClientError::transport(message)),
        }
    }
}
