//! Conversions between hyper messages and intercepted requests/responses

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::StatusCode;
use tracing::warn;

use crate::config::{EndpointConfig, LimitsConfig};
use crate::request::{Request, Response};
use crate::{Result, RewindError};

/// Headers describing the client connection, not the request itself
const HOP_BY_HOP: [&str; 5] = [
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "proxy-connection",
];

/// Reject requests over the configured limits before reading the body
///
/// # Errors
///
/// Returns error if declared content length or header count exceed limits
pub fn validate_request<B>(request: &hyper::Request<B>, limits: &LimitsConfig) -> Result<()> {
    if let Some(length) = request
        .headers()
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
    {
        if length > limits.max_request_size {
            return Err(RewindError::DataTooLarge {
                size: length,
                limit: limits.max_request_size,
            });
        }
    }

    let header_count = request.headers().len();
    if header_count > limits.max_headers {
        return Err(RewindError::Other(format!(
            "Too many headers: {header_count} > {}",
            limits.max_headers
        )));
    }

    Ok(())
}

/// Read a body, failing once it grows past `max_size`
///
/// # Errors
///
/// Returns error if body is too large or read fails
pub async fn read_body<B>(body: B, max_size: usize) -> Result<Bytes>
where
    B: hyper::body::Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let collected = Limited::new(body, max_size).collect().await.map_err(|e| {
        if e.is::<http_body_util::LengthLimitError>() {
            RewindError::DataTooLarge {
                size: max_size + 1,
                limit: max_size,
            }
        } else {
            RewindError::Other(format!("Failed to read body: {e}"))
        }
    })?;

    Ok(collected.to_bytes())
}

/// Build the intercepted request for a message received on an endpoint
pub fn to_request(
    parts: &hyper::http::request::Parts,
    body: Bytes,
    endpoint: &EndpointConfig,
) -> Request {
    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());

    let mut request = Request::new(parts.method.as_str(), endpoint.target_uri(path_and_query));
    for (name, value) in &parts.headers {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        match value.to_str() {
            Ok(value) => request = request.with_header(name.as_str(), value),
            Err(_) => warn!("Dropping non-UTF-8 header {}", name),
        }
    }

    request.with_body(body)
}

/// Convert a produced response into a hyper response
pub fn to_http_response(response: Response) -> hyper::Response<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut http_response = hyper::Response::new(Full::new(response.body));
    *http_response.status_mut() = status;

    let headers = http_response.headers_mut();
    for (name, value) in response.headers {
        if HOP_BY_HOP.contains(&name.to_lowercase().as_str()) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!("Dropping invalid response header {}", name),
        }
    }

    http_response
}

/// Create a plain-text response
pub fn text_response(status: StatusCode, body: &str) -> hyper::Response<Full<Bytes>> {
    let mut response = hyper::Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
}

/// Create an error response
pub fn error_response(error: &RewindError) -> hyper::Response<Full<Bytes>> {
    let status = match error {
        RewindError::UnhandledRequest(_) => StatusCode::NOT_FOUND,
        RewindError::DataTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        RewindError::Upstream(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    text_response(status, &format!("Error: {error}"))
}
