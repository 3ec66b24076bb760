//! reqwest-backed HTTP client.

use async_trait::async_trait;
use heartguard_offline::{HttpClient, HttpClientError, HttpRequest, TransportResponse};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;

/// [`HttpClient`] over a shared `reqwest::Client`.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client with default settings.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("heartguard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<TransportResponse, HttpClientError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| HttpClientError::Invalid(e.to_string()))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        Ok(TransportResponse::new(status, body))
    }
}

/// Connection failures mean the network is down. A request that could not
/// be built never reached the server and never will.
fn classify(error: reqwest::Error) -> HttpClientError {
    if error.is_connect() {
        HttpClientError::Unreachable(error.to_string())
    } else if error.is_builder() {
        HttpClientError::Invalid(error.to_string())
    } else {
        HttpClientError::Failed(error.to_string())
    }
}
