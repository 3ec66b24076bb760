//! Transport layer abstraction for replaying mutations.

use crate::error::{OfflineError, OfflineResult};
use crate::model::{HttpMethod, PendingMutation};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::watch;

/// One queued mutation as it goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// API endpoint, e.g. `/api/log`.
    pub endpoint: String,
    /// JSON body.
    pub payload: serde_json::Value,
}

impl MutationRequest {
    /// Creates a request.
    pub fn new(method: HttpMethod, endpoint: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            payload,
        }
    }
}

impl From<&PendingMutation> for MutationRequest {
    fn from(mutation: &PendingMutation) -> Self {
        Self {
            method: mutation.method,
            endpoint: mutation.endpoint.clone(),
            payload: mutation.payload.clone(),
        }
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl TransportResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-2xx response into [`OfflineError::HttpStatus`].
    pub fn into_result(self) -> OfflineResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(OfflineError::HttpStatus {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// A sync transport handles network communication with the HeartGuard API.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status; callers decide what counts as success. `Err` is
/// reserved for requests that never got a response. Unreachable networks
/// must map to [`OfflineError::NetworkUnavailable`] so a sync pass can
/// stop early.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Sends one mutation.
    async fn send(&self, request: &MutationRequest) -> OfflineResult<TransportResponse>;

    /// Fetches `url` with GET, for the asset cache.
    async fn fetch(&self, url: &str) -> OfflineResult<TransportResponse>;
}

/// A scripted reply for [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Respond with this status and body.
    Status(u16, String),
    /// Fail as if the network were unreachable.
    NetworkDown,
    /// Fail with a retryable transport error.
    Error(String),
}

/// A mock transport for testing.
///
/// Replies are scripted per endpoint and consumed in order; endpoints
/// without a script answer 200. Calls can be held at a gate to
/// observe in-flight behaviour.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    assets: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<MutationRequest>>,
    gate: watch::Sender<bool>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Creates a connected mock that answers 200 to everything.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            connected: AtomicBool::new(true),
            replies: Mutex::new(HashMap::new()),
            assets: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queues a reply for the next send to `endpoint`.
    pub fn push_reply(&self, endpoint: impl Into<String>, reply: MockReply) {
        self.replies
            .lock()
            .entry(endpoint.into())
            .or_default()
            .push_back(reply);
    }

    /// Sets the body returned by `fetch(url)`. Unknown URLs get 404.
    pub fn set_asset(&self, url: impl Into<String>, body: impl Into<String>) {
        self.assets.lock().insert(url.into(), body.into());
    }

    /// Sets the connected state. A disconnected mock fails every call with
    /// `NetworkUnavailable`.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Holds every later call until [`MockTransport::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Releases held calls.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Returns every request passed to `send`, in call order.
    pub fn calls(&self) -> Vec<MutationRequest> {
        self.calls.lock().clone()
    }

    /// Returns the number of sends currently in progress.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns the largest number of sends ever in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn wait_at_gate(&self) {
        let mut gate = self.gate.subscribe();
        // The sender lives in self, so the channel cannot close here.
        let _ = gate.wait_for(|open| *open).await;
    }

    fn check_connected(&self) -> OfflineResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OfflineError::NetworkUnavailable("mock transport disconnected".into()))
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn send(&self, request: &MutationRequest) -> OfflineResult<TransportResponse> {
        self.calls.lock().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.wait_at_gate().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check_connected()?;

        let scripted = self
            .replies
            .lock()
            .get_mut(&request.endpoint)
            .and_then(|replies| replies.pop_front());

        match scripted {
            Some(MockReply::Status(status, body)) => Ok(TransportResponse::new(status, body)),
            Some(MockReply::NetworkDown) => Err(OfflineError::NetworkUnavailable(format!(
                "scripted outage at {}",
                request.endpoint
            ))),
            Some(MockReply::Error(message)) => Err(OfflineError::transport_retryable(message)),
            None => Ok(TransportResponse::new(200, "{}")),
        }
    }

    async fn fetch(&self, url: &str) -> OfflineResult<TransportResponse> {
        self.check_connected()?;
        match self.assets.lock().get(url) {
            Some(body) => Ok(TransportResponse::new(200, body.clone())),
            None => Ok(TransportResponse::new(404, "")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(endpoint: &str) -> MutationRequest {
        MutationRequest::new(HttpMethod::Post, endpoint, json!({}))
    }

    #[test]
    fn response_success_range() {
        assert!(TransportResponse::new(200, "").is_success());
        assert!(TransportResponse::new(204, "").is_success());
        assert!(!TransportResponse::new(199, "").is_success());
        assert!(!TransportResponse::new(301, "").is_success());
        assert!(matches!(
            TransportResponse::new(500, "boom").into_result(),
            Err(OfflineError::HttpStatus { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn mock_scripted_replies_then_default() {
        let transport = MockTransport::new();
        transport.push_reply("/api/log", MockReply::Status(500, "err".into()));

        let first = transport.send(&request("/api/log")).await.unwrap();
        assert_eq!(first.status, 500);
        let second = transport.send(&request("/api/log")).await.unwrap();
        assert_eq!(second.status, 200);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn mock_not_connected_error() {
        let transport = MockTransport::new();
        transport.set_connected(false);

        let result = transport.send(&request("/api/log")).await;
        assert!(matches!(result, Err(OfflineError::NetworkUnavailable(_))));
        assert!(transport.fetch("/api/meals").await.is_err());
    }

    #[tokio::test]
    async fn mock_fetch_assets() {
        let transport = MockTransport::new();
        transport.set_asset("/api/meals", "[]");

        assert_eq!(transport.fetch("/api/meals").await.unwrap().body, "[]");
        assert_eq!(transport.fetch("/api/other").await.unwrap().status, 404);
    }

    #[tokio::test]
    async fn mock_gate_holds_calls() {
        let transport = std::sync::Arc::new(MockTransport::new());
        transport.hold();

        let sender = std::sync::Arc::clone(&transport);
        let handle = tokio::spawn(async move { sender.send(&request("/api/log")).await });

        while transport.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!handle.is_finished());

        transport.release();
        assert!(handle.await.unwrap().unwrap().is_success());
        assert_eq!(transport.in_flight(), 0);
        assert_eq!(transport.max_in_flight(), 1);
    }
}
