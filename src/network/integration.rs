//! The proxy as an interception integration
//!
//! Ignored requests are forwarded without being kept. Recordable requests
//! are forwarded and the response is handed to the interaction store.
//! Stubbed and unhandled requests use the shared defaults.

use tracing::debug;

use crate::handler::{DispositionHandler, HandlingCycle};
use crate::request::Response;
use crate::Result;

use super::HttpClient;

/// Name the proxy registers under
pub const PROXY_INTEGRATION: &str = "proxy";

/// Disposition handler forwarding live traffic upstream
#[derive(Clone, Default)]
pub struct ProxyIntegration {
    client: HttpClient,
}

impl ProxyIntegration {
    /// Create an integration sending live traffic through `client`
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl DispositionHandler for ProxyIntegration {
    async fn on_ignored(&self, cycle: &HandlingCycle<'_>) -> Result<Option<Response>> {
        debug!("Passing through {} via {}", cycle.request(), cycle.integration());
        let response = self.client.send(cycle.request()).await?;
        Ok(Some(response))
    }

    async fn on_recordable(&self, cycle: &HandlingCycle<'_>) -> Result<Option<Response>> {
        let response = self.client.send(cycle.request()).await?;
        cycle.record(&response)?;
        debug!("Recorded {} -> {}", cycle.request(), response.status);
        Ok(Some(response))
    }
}
