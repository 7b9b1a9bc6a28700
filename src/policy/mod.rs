//! Policy collaborators consulted by the dispatch core
//!
//! The core only ever talks to [`Policy`]. [`PolicyContext`] is the concrete,
//! shareable policy state: integration registry, ignore rules, hook registry,
//! cassette stack and the live traffic switches.

mod context;
mod hooks;
mod ignorer;
mod library_hooks;

#[cfg(test)]
pub(crate) mod mock;

pub use context::PolicyContext;
pub use hooks::{Hook, HookRegistry};
pub use ignorer::{RequestIgnorer, LOCALHOST_ALIASES};
pub use library_hooks::{ExclusiveGuard, LibraryHooks};

use std::fmt;

use crate::request::{Request, Response, TypedRequest};
use crate::Result;

/// Queries and notifications the dispatch core depends on
///
/// Implementations must tolerate concurrent calls. Query methods are expected
/// to be free of observable side effects.
pub trait Policy: Send + Sync {
    /// Whether the named integration is disabled
    fn is_disabled(&self, integration: &str) -> bool;

    /// Whether an ignore rule covers this request
    fn should_ignore(&self, request: &Request) -> bool;

    /// Whether a stored interaction matches this request
    fn has_matching_interaction(&self, request: &Request) -> bool;

    /// Stored response for this request
    ///
    /// Only meaningful when [`Policy::has_matching_interaction`] is true.
    fn response_for(&self, request: &Request) -> Option<Response>;

    /// Whether real network traffic is currently permitted
    fn is_live_traffic_allowed(&self) -> bool;

    /// Fire every hook registered under the event's name, in order
    ///
    /// # Errors
    ///
    /// Returns the first hook failure; later hooks do not run
    fn invoke_hook(&self, event: &HookEvent<'_>) -> Result<()>;

    /// Store a live interaction, if the current policy is recording
    ///
    /// # Errors
    ///
    /// Returns error if the store rejects the interaction
    fn record_interaction(&self, request: &Request, response: &Response) -> Result<()>;
}

/// Key under which hooks are registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    /// Fired before a request is dispatched
    BeforeHttpRequest,
    /// Fired after a disposition handler produced its response
    AfterHttpRequest,
}

impl HookName {
    /// Hook name as used in logs and errors
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeHttpRequest => "before_http_request",
            Self::AfterHttpRequest => "after_http_request",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments of a hook invocation
#[derive(Debug, Clone, Copy)]
pub enum HookEvent<'a> {
    /// Request about to be dispatched
    BeforeHttpRequest(&'a TypedRequest<'a>),
    /// Request handled, with the response the handler produced
    AfterHttpRequest(&'a TypedRequest<'a>, Option<&'a Response>),
}

impl<'a> HookEvent<'a> {
    /// Registry key for this event
    pub fn name(&self) -> HookName {
        match self {
            Self::BeforeHttpRequest(_) => HookName::BeforeHttpRequest,
            Self::AfterHttpRequest(..) => HookName::AfterHttpRequest,
        }
    }

    /// The typed request carried by the event
    pub fn typed_request(&self) -> &'a TypedRequest<'a> {
        match self {
            Self::BeforeHttpRequest(typed) | Self::AfterHttpRequest(typed, _) => typed,
        }
    }

    /// Response, for after-request events
    pub fn response(&self) -> Option<&'a Response> {
        match self {
            Self::BeforeHttpRequest(_) => None,
            Self::AfterHttpRequest(_, response) => *response,
        }
    }
}
