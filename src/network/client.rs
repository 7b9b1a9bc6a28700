//! HTTP client for sending intercepted requests to the real network

use std::time::Duration;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Bytes;
use hyper::{Method, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::request::{Request, Response};
use crate::{Result, RewindError};

use super::CONNECT_TIMEOUT_MS;

/// Pooled HTTP client for real network calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client
    #[must_use]
    pub fn new(max_response_size: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(CONNECT_TIMEOUT_MS)));

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build(connector);

        Self {
            client,
            max_response_size,
        }
    }

    /// Send a request to its URI and collect the response
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be built or sent, or the response
    /// body exceeds the size limit
    pub async fn send(&self, request: &Request) -> Result<Response> {
        let uri = request
            .uri()
            .parse::<Uri>()
            .map_err(|e| RewindError::Upstream(format!("Invalid URI '{}': {e}", request.uri())))?;

        let method = request.method().parse::<Method>().map_err(|e| {
            RewindError::Upstream(format!("Invalid HTTP method '{}': {e}", request.method()))
        })?;

        debug!("Sending {} {}", method, uri);

        let mut request_builder = hyper::Request::builder().method(method).uri(uri);
        for (name, value) in request.headers() {
            request_builder = request_builder.header(name, value);
        }

        let http_request = request_builder
            .body(Full::new(request.body().clone()))
            .map_err(|e| RewindError::Upstream(format!("Failed to build request: {e}")))?;

        let response = self.client.request(http_request).await.map_err(|e| {
            warn!("Request failed: {e}");
            RewindError::Upstream(format!("Request failed: {e}"))
        })?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<invalid>").to_string(),
                )
            })
            .collect();

        let body = Limited::new(response.into_body(), self.max_response_size)
            .collect()
            .await
            .map_err(|e| {
                RewindError::Upstream(format!("Failed to read response body: {e}"))
            })?
            .to_bytes();

        debug!("Received {} ({} bytes) for {}", status, body.len(), request);

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(crate::config::LimitsConfig::default().max_response_size)
    }
}
