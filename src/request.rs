//! Request and response values passed through the dispatch core

use std::fmt;

use bytes::Bytes;

/// An intercepted outbound HTTP request
///
/// Immutable once built. Adapters own it and lend it to the core for the
/// duration of one handling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    uri: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Request {
    /// Create a request with no headers and an empty body
    ///
    /// The method is normalized to uppercase.
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            uri: uri.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// HTTP method (uppercase)
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Absolute request URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Request headers in the order they were added
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Request body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Host component of the URI, lowercased
    pub fn host(&self) -> Option<String> {
        self.uri
            .parse::<hyper::Uri>()
            .ok()
            .and_then(|uri| uri.host().map(|h| h.trim_matches(['[', ']']).to_lowercase()))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}

/// Response produced by a handling cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
}

impl Response {
    /// Create a response with no headers
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// How a request is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Passed through untouched; the integration is disabled or the request
    /// matches an ignore rule
    Ignored,
    /// Served from a stored interaction
    Stubbed,
    /// Sent to the real network so it can be recorded
    Recordable,
    /// No stored interaction and live traffic is not permitted
    Unhandled,
}

impl Disposition {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Stubbed => "stubbed",
            Self::Recordable => "recordable",
            Self::Unhandled => "unhandled",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request paired with the disposition computed for it at one instant
///
/// Two of these may exist for the same request within a cycle and they may
/// disagree when hooks or dispatch change policy state in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedRequest<'a> {
    request: &'a Request,
    disposition: Disposition,
}

impl<'a> TypedRequest<'a> {
    /// Pair a request with a disposition
    pub fn new(request: &'a Request, disposition: Disposition) -> Self {
        Self {
            request,
            disposition,
        }
    }

    /// The underlying request
    pub fn request(&self) -> &'a Request {
        self.request
    }

    /// Disposition at the time this value was built
    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    /// True if ignored
    pub fn is_ignored(&self) -> bool {
        self.disposition == Disposition::Ignored
    }

    /// True if stubbed
    pub fn is_stubbed(&self) -> bool {
        self.disposition == Disposition::Stubbed
    }

    /// True if recordable
    pub fn is_recordable(&self) -> bool {
        self.disposition == Disposition::Recordable
    }

    /// True if unhandled
    pub fn is_unhandled(&self) -> bool {
        self.disposition == Disposition::Unhandled
    }

    /// True if the request reaches the real network (ignored or recordable)
    pub fn is_real(&self) -> bool {
        matches!(
            self.disposition,
            Disposition::Ignored | Disposition::Recordable
        )
    }
}
