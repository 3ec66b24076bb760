//! HTTP transport implementation.
//!
//! This module provides an HTTP-based transport for the sync engine.
//! The actual HTTP client is abstracted via a trait so the library does
//! not pick one (the CLI plugs in reqwest; tests plug in a loopback).

use crate::config::OfflineConfig;
use crate::error::{OfflineError, OfflineResult};
use crate::transport::{MutationRequest, SyncTransport, TransportResponse};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// A request handed to an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method name, e.g. `POST`.
    pub method: String,
    /// Absolute URL.
    pub url: String,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
    /// Deadline for the whole request.
    pub timeout: Duration,
}

/// Why an [`HttpClient`] produced no response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpClientError {
    /// Could not connect at all (DNS failure, refused, no route).
    Unreachable(String),
    /// Connected, but the exchange failed (timeout, reset, bad body).
    Failed(String),
    /// The request could not be built (bad URL or method). Retrying the
    /// same request cannot succeed.
    Invalid(String),
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Executes a request and returns status and body.
    async fn execute(&self, request: HttpRequest) -> Result<TransportResponse, HttpClientError>;

    /// Checks if the client is usable. An unhealthy client is treated as
    /// an unreachable network.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// HTTP-based sync transport.
///
/// Sends each mutation's payload as a JSON body to
/// `{base_url}{endpoint}` with the queued method.
pub struct HttpTransport<C: HttpClient> {
    config: OfflineConfig,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(config: OfflineConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn execute(&self, request: HttpRequest) -> OfflineResult<TransportResponse> {
        if !self.client.is_healthy() {
            return Err(OfflineError::NetworkUnavailable("HTTP client unhealthy".into()));
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        self.client.execute(request).await.map_err(|e| match e {
            HttpClientError::Unreachable(message) => OfflineError::NetworkUnavailable(message),
            HttpClientError::Failed(message) => OfflineError::transport_retryable(message),
            HttpClientError::Invalid(message) => OfflineError::transport_fatal(message),
        })
    }
}

#[async_trait]
impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    async fn send(&self, request: &MutationRequest) -> OfflineResult<TransportResponse> {
        let body = serde_json::to_vec(&request.payload)?;
        self.execute(HttpRequest {
            method: request.method.as_str().to_string(),
            url: self.config.resolve(&request.endpoint),
            body: Some(body),
            timeout: self.config.request_timeout,
        })
        .await
    }

    async fn fetch(&self, url: &str) -> OfflineResult<TransportResponse> {
        self.execute(HttpRequest {
            method: "GET".to_string(),
            url: self.config.resolve(url),
            body: None,
            timeout: self.config.request_timeout,
        })
        .await
    }
}

/// Trait for in-process servers that can answer loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request for `path` and returns status and body.
    fn handle(&self, method: &str, path: &str, body: Option<&[u8]>) -> (u16, String);
}

/// An HTTP client that routes requests directly to an in-process server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn execute(&self, request: HttpRequest) -> Result<TransportResponse, HttpClientError> {
        let path = request
            .url
            .find("/api/")
            .map(|i| &request.url[i..])
            .unwrap_or(&request.url);

        let (status, body) = self.server.handle(&request.method, path, request.body.as_deref());
        Ok(TransportResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HttpMethod;
    use parking_lot::RwLock;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestClient {
        response: RwLock<Result<TransportResponse, HttpClientError>>,
        seen: RwLock<Vec<HttpRequest>>,
        healthy: AtomicBool,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(Ok(TransportResponse::new(201, "{}"))),
                seen: RwLock::new(Vec::new()),
                healthy: AtomicBool::new(true),
            }
        }

        fn set_response(&self, response: Result<TransportResponse, HttpClientError>) {
            *self.response.write() = response;
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn execute(
            &self,
            request: HttpRequest,
        ) -> Result<TransportResponse, HttpClientError> {
            self.seen.write().push(request);
            self.response.read().clone()
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn transport() -> HttpTransport<TestClient> {
        HttpTransport::new(OfflineConfig::new("https://hg.example.com"), TestClient::new())
    }

    #[tokio::test]
    async fn send_uses_queued_method_and_body() {
        let transport = transport();
        let request = MutationRequest::new(HttpMethod::Put, "/api/log/1", json!({"a": 2}));

        let response = transport.send(&request).await.unwrap();
        assert_eq!(response.status, 201);

        let seen = transport.client.seen.read().clone();
        assert_eq!(seen[0].method, "PUT");
        assert_eq!(seen[0].url, "https://hg.example.com/api/log/1");
        assert_eq!(seen[0].body.as_deref(), Some(br#"{"a":2}"#.as_slice()));
    }

    #[tokio::test]
    async fn fetch_is_get_without_body() {
        let transport = transport();
        transport.fetch("/api/meals").await.unwrap();

        let seen = transport.client.seen.read().clone();
        assert_eq!(seen[0].method, "GET");
        assert!(seen[0].body.is_none());
    }

    #[tokio::test]
    async fn error_statuses_are_responses() {
        let transport = transport();
        transport
            .client
            .set_response(Ok(TransportResponse::new(422, "invalid")));

        let request = MutationRequest::new(HttpMethod::Post, "/api/log", json!({}));
        let response = transport.send(&request).await.unwrap();
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn unreachable_maps_to_network_unavailable() {
        let transport = transport();
        transport
            .client
            .set_response(Err(HttpClientError::Unreachable("connection refused".into())));

        let request = MutationRequest::new(HttpMethod::Post, "/api/log", json!({}));
        let result = transport.send(&request).await;
        assert!(matches!(result, Err(OfflineError::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn failed_exchange_is_item_error() {
        let transport = transport();
        transport
            .client
            .set_response(Err(HttpClientError::Failed("timed out".into())));

        let request = MutationRequest::new(HttpMethod::Post, "/api/log", json!({}));
        let err = transport.send(&request).await.unwrap_err();
        assert!(!err.is_network_unavailable());
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn invalid_request_is_not_retryable() {
        let transport = transport();
        transport
            .client
            .set_response(Err(HttpClientError::Invalid("relative URL without a base".into())));

        let request = MutationRequest::new(HttpMethod::Post, "/api/log", json!({}));
        let err = transport.send(&request).await.unwrap_err();
        assert!(matches!(err, OfflineError::Transport { retryable: false, .. }));
        assert!(!err.is_network_unavailable());
    }

    #[tokio::test]
    async fn unhealthy_client_is_network_unavailable() {
        let transport = transport();
        transport.client.healthy.store(false, Ordering::SeqCst);

        let result = transport.fetch("/api/meals").await;
        assert!(matches!(result, Err(OfflineError::NetworkUnavailable(_))));
        assert!(transport.client.seen.read().is_empty());
    }

    struct EchoServer;

    impl LoopbackServer for EchoServer {
        fn handle(&self, method: &str, path: &str, _body: Option<&[u8]>) -> (u16, String) {
            (200, format!("{method} {path}"))
        }
    }

    #[tokio::test]
    async fn loopback_strips_host() {
        let transport = HttpTransport::new(
            OfflineConfig::new("https://hg.example.com"),
            LoopbackClient::new(EchoServer),
        );
        let response = transport.fetch("/api/meals").await.unwrap();
        assert_eq!(response.body, "GET /api/meals");
        assert_eq!(transport.base_url(), "https://hg.example.com");
    }
}
