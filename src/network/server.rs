//! Proxy server: one listener per configured endpoint

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{Config, EndpointConfig, LimitsConfig};
use crate::handler::RequestHandler;
use crate::policy::{Policy, PolicyContext};
use crate::request::Response;
use crate::{Result, RewindError};

use super::connection_pool::ConnectionPool;
use super::http::{
    error_response, read_body, text_response, to_http_response, to_request, validate_request,
};
use super::{HttpClient, ProxyIntegration, PROXY_INTEGRATION, SHUTDOWN_TIMEOUT_MS};

/// Serves requests arriving on one endpoint through the request handler
pub struct EndpointService {
    endpoint: EndpointConfig,
    limits: LimitsConfig,
    handler: Arc<RequestHandler<ProxyIntegration>>,
}

impl EndpointService {
    /// Create a service for `endpoint`
    pub fn new(
        endpoint: EndpointConfig,
        limits: LimitsConfig,
        handler: Arc<RequestHandler<ProxyIntegration>>,
    ) -> Self {
        Self {
            endpoint,
            limits,
            handler,
        }
    }

    /// Serve one request, mapping failures to error responses
    pub async fn serve<B>(&self, request: hyper::Request<B>) -> hyper::Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        match self.try_serve(request).await {
            Ok(Some(response)) => to_http_response(response),
            Ok(None) => text_response(StatusCode::BAD_GATEWAY, "No response produced"),
            Err(e) => {
                warn!("Request failed on port {}: {}", self.endpoint.source_port, e);
                error_response(&e)
            }
        }
    }

    async fn try_serve<B>(&self, request: hyper::Request<B>) -> Result<Option<Response>>
    where
        B: Body,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        validate_request(&request, &self.limits)?;

        let (parts, body) = request.into_parts();
        let body = read_body(body, self.limits.max_request_size).await?;
        let request = to_request(&parts, body, &self.endpoint);

        debug!("Intercepted {}", request);
        self.handler.handle(&request).await
    }
}

/// Main network handler that manages all endpoints
pub struct NetworkHandler {
    config: Arc<Config>,
    handler: Arc<RequestHandler<ProxyIntegration>>,
    connection_pool: ConnectionPool,
    shutdown_tx: broadcast::Sender<()>,
}

impl NetworkHandler {
    /// Create a network handler intercepting through `context`
    #[must_use]
    pub fn new(config: Config, context: Arc<PolicyContext>) -> Self {
        let max_connections = config.limits.max_connections;
        let (shutdown_tx, _) = broadcast::channel(1);

        let integration = ProxyIntegration::new(HttpClient::new(config.limits.max_response_size));
        let handler = RequestHandler::new(
            PROXY_INTEGRATION,
            context as Arc<dyn Policy>,
            integration,
        );

        Self {
            config: Arc::new(config),
            handler: Arc::new(handler),
            connection_pool: ConnectionPool::new(max_connections),
            shutdown_tx,
        }
    }

    /// Sender that stops [`NetworkHandler::run`] when signalled
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until ctrl-c or a shutdown signal
    ///
    /// # Errors
    ///
    /// Returns error if any endpoint fails to start
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tasks = JoinSet::new();

        for endpoint in &self.config.endpoints {
            let service = Arc::new(EndpointService::new(
                endpoint.clone(),
                self.config.limits.clone(),
                Arc::clone(&self.handler),
            ));
            let pool = self.connection_pool.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();

            tasks.spawn(run_endpoint(service, pool, shutdown_rx));
        }

        let shutdown_signal = async {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received SIGINT, shutting down");
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                }
            }
        };

        tokio::select! {
            () = shutdown_signal => {
                info!("Initiating graceful shutdown");
            }
            Some(result) = tasks.join_next() => {
                match result {
                    Ok(Err(e)) => {
                        error!("Endpoint failed: {}", e);
                        self.shutdown_tx.send(()).ok();
                        return Err(e);
                    }
                    Err(e) => {
                        error!("Endpoint task failed: {}", e);
                        self.shutdown_tx.send(()).ok();
                        return Err(RewindError::Other(format!("Endpoint task failed: {e}")));
                    }
                    Ok(Ok(())) => {}
                }
            }
        }

        self.shutdown_tx.send(()).ok();

        let shutdown_timeout = Duration::from_millis(SHUTDOWN_TIMEOUT_MS);
        tokio::time::timeout(shutdown_timeout, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!("Task cleanup error: {}", e);
                }
            }
        })
        .await
        .ok();

        info!("Shutdown complete");
        Ok(())
    }
}

async fn run_endpoint(
    service: Arc<EndpointService>,
    pool: ConnectionPool,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let endpoint = &service.endpoint;
    let addr = SocketAddr::from(([0, 0, 0, 0], endpoint.source_port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        "Listening on {} (proxy to {}:{})",
        listener.local_addr()?,
        endpoint.target_host,
        endpoint.target_port
    );

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        let Some(guard) = pool.try_acquire() else {
                            warn!("Connection limit reached, rejecting {}", peer_addr);
                            drop(stream);
                            continue;
                        };

                        let service = Arc::clone(&service);
                        tokio::spawn(async move {
                            let _guard = guard;
                            let io = TokioIo::new(stream);
                            let svc = service_fn(move |request| {
                                let service = Arc::clone(&service);
                                async move { Ok::<_, Infallible>(service.serve(request).await) }
                            });

                            if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                                debug!("Connection from {} closed: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Endpoint {} shutting down", addr);
                break;
            }
        }
    }

    Ok(())
}
