//! Network layer for Rewind
//!
//! Runs the intercepting proxy: listeners with bounded concurrency in front of
//! a [`RequestHandler`](crate::handler::RequestHandler) whose integration
//! forwards live traffic upstream.

mod client;
mod connection_pool;
mod http;
mod integration;
mod server;

pub use client::HttpClient;
pub use connection_pool::{ConnectionGuard, ConnectionPool};
pub use http::{error_response, read_body, to_http_response, to_request, validate_request};
pub use integration::{ProxyIntegration, PROXY_INTEGRATION};
pub use server::{EndpointService, NetworkHandler};

/// Maximum number of concurrent connections
pub const MAX_CONNECTIONS: usize = 4096;

/// Connection setup timeout
pub const CONNECT_TIMEOUT_MS: u64 = 1000;

/// Graceful shutdown timeout
pub const SHUTDOWN_TIMEOUT_MS: u64 = 5000;
