//! Request classification
//!
//! Providers are consulted in strict priority order and evaluation stops at
//! the first match. Disabled or ignored requests never reach the interaction
//! store or the live traffic check, and a stored interaction always wins over
//! live recording.

use tracing::trace;

use crate::policy::Policy;
use crate::request::{Disposition, Request};

/// Classify a request against the current policy
///
/// 1. [`Disposition::Ignored`] if the integration is disabled or an ignore
///    rule covers the request
/// 2. [`Disposition::Stubbed`] if a stored interaction matches
/// 3. [`Disposition::Recordable`] if live traffic is permitted
/// 4. [`Disposition::Unhandled`] otherwise
pub fn classify(policy: &dyn Policy, integration: &str, request: &Request) -> Disposition {
    let disposition = if policy.is_disabled(integration) || policy.should_ignore(request) {
        Disposition::Ignored
    } else if policy.has_matching_interaction(request) {
        Disposition::Stubbed
    } else if policy.is_live_traffic_allowed() {
        Disposition::Recordable
    } else {
        Disposition::Unhandled
    };

    trace!("Classified {} for {} as {}", request, integration, disposition);
    disposition
}
