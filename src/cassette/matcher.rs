//! Request fingerprints for interaction matching

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::request::Request;

/// A request component that takes part in matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOn {
    /// HTTP method
    Method,
    /// Full URI, compared verbatim
    Uri,
    /// Host, case-insensitive
    Host,
    /// Normalized path
    Path,
    /// Query parameters, order-independent
    Query,
    /// Headers, order- and name-case-independent
    Headers,
    /// Raw body bytes
    Body,
}

/// Default matching components: method and URI
pub const DEFAULT_MATCH_ON: [MatchOn; 2] = [MatchOn::Method, MatchOn::Uri];

/// Compute a SHA-256 fingerprint over the selected request components
///
/// Two requests match when their fingerprints under the same `match_on` set
/// are equal. The order and duplicates of `match_on` do not matter.
#[must_use]
pub fn fingerprint_request(request: &Request, match_on: &[MatchOn]) -> [u8; 32] {
    let mut components = match_on.to_vec();
    components.sort_unstable();
    components.dedup();

    let mut hasher = Sha256::new();
    let parts = UriParts::parse(request.uri());

    for component in components {
        hasher.update([component as u8]);

        match component {
            MatchOn::Method => update_str(&mut hasher, &request.method().to_uppercase()),
            MatchOn::Uri => update_str(&mut hasher, request.uri().trim()),
            MatchOn::Host => update_str(&mut hasher, parts.host.as_deref().unwrap_or("")),
            MatchOn::Path => update_str(&mut hasher, &normalize_path(&parts.path)),
            MatchOn::Query => {
                let query = sorted_query(&parts.query);
                hasher.update((query.len() as u32).to_le_bytes());
                for (key, value) in &query {
                    update_str(&mut hasher, key);
                    update_str(&mut hasher, value);
                }
            }
            MatchOn::Headers => {
                let mut headers: Vec<(String, &str)> = request
                    .headers()
                    .iter()
                    .map(|(name, value)| (name.to_lowercase(), value.trim()))
                    .collect();
                headers.sort();
                hasher.update((headers.len() as u32).to_le_bytes());
                for (name, value) in &headers {
                    update_str(&mut hasher, name);
                    update_str(&mut hasher, value);
                }
            }
            MatchOn::Body => {
                hasher.update((request.body().len() as u32).to_le_bytes());
                hasher.update(request.body());
            }
        }
    }

    hasher.finalize().into()
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u32).to_le_bytes());
    hasher.update(value.as_bytes());
}

struct UriParts {
    host: Option<String>,
    path: String,
    query: String,
}

impl UriParts {
    fn parse(uri: &str) -> Self {
        if let Ok(parsed) = uri.trim().parse::<hyper::Uri>() {
            return Self {
                host: parsed.host().map(str::to_lowercase),
                path: parsed.path().to_string(),
                query: parsed.query().unwrap_or("").to_string(),
            };
        }

        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        Self {
            host: None,
            path: path.to_string(),
            query: query.to_string(),
        }
    }
}

/// Decode and sort query parameters
fn sorted_query(query: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key).into_owned(), decode(value).into_owned())
        })
        .collect();
    pairs.sort();
    pairs
}

fn decode(component: &str) -> Cow<'_, str> {
    let plus_decoded = component.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(_) => Cow::Borrowed(component),
    }
}

/// Normalize a URL path
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();

    if trimmed.is_empty() || !trimmed.starts_with('/') {
        format!("/{trimmed}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_request() -> Request {
        Request::new("GET", "http://api.example.com/users?page=2&sort=name")
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let request = test_request();
        assert_eq!(
            fingerprint_request(&request, &DEFAULT_MATCH_ON),
            fingerprint_request(&request, &DEFAULT_MATCH_ON),
            "Fingerprint must be deterministic"
        );
    }

    #[test]
    fn test_method_matters_when_selected() {
        let get = test_request();
        let post = Request::new("POST", get.uri());

        assert_ne!(
            fingerprint_request(&get, &DEFAULT_MATCH_ON),
            fingerprint_request(&post, &DEFAULT_MATCH_ON)
        );
        assert_eq!(
            fingerprint_request(&get, &[MatchOn::Uri]),
            fingerprint_request(&post, &[MatchOn::Uri])
        );
    }

    #[test]
    fn test_match_on_order_irrelevant() {
        let request = test_request();
        assert_eq!(
            fingerprint_request(&request, &[MatchOn::Uri, MatchOn::Method]),
            fingerprint_request(&request, &[MatchOn::Method, MatchOn::Uri, MatchOn::Method])
        );
    }

    #[test]
    fn test_query_order_independence() {
        let a = Request::new("GET", "http://example.com/search?b=2&a=1");
        let b = Request::new("GET", "http://example.com/search?a=1&b=2");

        let match_on = [MatchOn::Method, MatchOn::Path, MatchOn::Query];
        assert_eq!(
            fingerprint_request(&a, &match_on),
            fingerprint_request(&b, &match_on),
            "Query parameter order should not affect fingerprint"
        );
        assert_ne!(
            fingerprint_request(&a, &DEFAULT_MATCH_ON),
            fingerprint_request(&b, &DEFAULT_MATCH_ON),
            "Uri matching is verbatim"
        );
    }

    #[test]
    fn test_query_decoding() {
        let a = Request::new("GET", "http://example.com/?q=hello%20world");
        let b = Request::new("GET", "http://example.com/?q=hello+world");

        assert_eq!(
            fingerprint_request(&a, &[MatchOn::Query]),
            fingerprint_request(&b, &[MatchOn::Query])
        );
    }

    #[test]
    fn test_host_case_insensitive() {
        let a = Request::new("GET", "http://API.example.com/x");
        let b = Request::new("GET", "http://api.example.com/y");

        assert_eq!(
            fingerprint_request(&a, &[MatchOn::Host]),
            fingerprint_request(&b, &[MatchOn::Host])
        );
        assert_ne!(
            fingerprint_request(&a, &[MatchOn::Host, MatchOn::Path]),
            fingerprint_request(&b, &[MatchOn::Host, MatchOn::Path])
        );
    }

    #[test]
    fn test_header_order_and_case_independence() {
        let a = Request::new("GET", "http://example.com/")
            .with_header("Content-Type", "application/json")
            .with_header("Accept", "application/json");
        let b = Request::new("GET", "http://example.com/")
            .with_header("accept", "application/json ")
            .with_header("content-type", "application/json");

        assert_eq!(
            fingerprint_request(&a, &[MatchOn::Headers]),
            fingerprint_request(&b, &[MatchOn::Headers])
        );
    }

    #[test]
    fn test_body_matching() {
        let a = Request::new("POST", "http://example.com/").with_body("one");
        let b = Request::new("POST", "http://example.com/").with_body("two");

        assert_eq!(
            fingerprint_request(&a, &DEFAULT_MATCH_ON),
            fingerprint_request(&b, &DEFAULT_MATCH_ON)
        );
        assert_ne!(
            fingerprint_request(&a, &[MatchOn::Body]),
            fingerprint_request(&b, &[MatchOn::Body])
        );
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(normalize_path("/api/test"), "/api/test");
        assert_eq!(normalize_path("api/test"), "/api/test");
        assert_eq!(normalize_path("  /api/test  "), "/api/test");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_relative_uri_parts() {
        let parts = UriParts::parse("/only/path?x=1");
        assert_eq!(parts.host, None);
        assert_eq!(parts.path, "/only/path");
        assert_eq!(parts.query, "x=1");
    }
}
