//! Request handling cycle
//!
//! [`RequestHandler::handle`] runs one intercepted request through:
//!
//! 1. `before_http_request` hooks, with the disposition at that instant
//! 2. a snapshot of the disposition, frozen for the after hooks
//! 3. dispatch to the [`DispositionHandler`] method for the disposition at
//!    dispatch time
//! 4. `after_http_request` hooks, with the frozen snapshot and the response
//!
//! Before hooks may change policy (insert a cassette, allow live traffic), and
//! so may dispatch (a stub is consumed, a recording is stored). Dispatch uses
//! the disposition at dispatch time; after hooks always get the snapshot.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::classify::classify;
use crate::policy::{HookEvent, Policy};
use crate::request::{Disposition, Request, Response, TypedRequest};
use crate::{Result, RewindError};

/// Per-integration behavior for each disposition
///
/// Every method has a default. Integrations override `on_ignored` and
/// `on_recordable` to reach the real network.
pub trait DispositionHandler: Send + Sync {
    /// The request bypasses interception. Produces no response by default.
    fn on_ignored(
        &self,
        _cycle: &HandlingCycle<'_>,
    ) -> impl Future<Output = Result<Option<Response>>> + Send {
        async { Ok(None) }
    }

    /// A stored interaction matches. Returns its response by default, or
    /// `None` if the store no longer has one.
    fn on_stubbed(
        &self,
        cycle: &HandlingCycle<'_>,
    ) -> impl Future<Output = Result<Option<Response>>> + Send {
        async move { Ok(cycle.stubbed_response()) }
    }

    /// Live traffic is permitted. Produces no response by default.
    fn on_recordable(
        &self,
        _cycle: &HandlingCycle<'_>,
    ) -> impl Future<Output = Result<Option<Response>>> + Send {
        async { Ok(None) }
    }

    /// Nothing covers the request. Fails with
    /// [`RewindError::UnhandledRequest`].
    fn on_unhandled(
        &self,
        cycle: &HandlingCycle<'_>,
    ) -> impl Future<Output = Result<Option<Response>>> + Send {
        async move {
            Err(RewindError::UnhandledRequest(Box::new(
                cycle.request().clone(),
            )))
        }
    }
}

/// Ambient state of one handling cycle, lent to disposition handlers
pub struct HandlingCycle<'a> {
    request: &'a Request,
    policy: &'a dyn Policy,
    integration: &'a str,
    stubbed_response: OnceLock<Option<Response>>,
}

impl<'a> HandlingCycle<'a> {
    fn new(request: &'a Request, policy: &'a dyn Policy, integration: &'a str) -> Self {
        Self {
            request,
            policy,
            integration,
            stubbed_response: OnceLock::new(),
        }
    }

    /// The intercepted request
    pub fn request(&self) -> &'a Request {
        self.request
    }

    /// Name of the integration handling the request
    pub fn integration(&self) -> &'a str {
        self.integration
    }

    /// Stored response for the request, `None` if the store has nothing
    ///
    /// The store is asked at most once per cycle; later calls reuse the first
    /// answer.
    pub fn stubbed_response(&self) -> Option<Response> {
        self.stubbed_response
            .get_or_init(|| self.policy.response_for(self.request))
            .clone()
    }

    /// Hand a live response to the interaction store for recording
    ///
    /// # Errors
    ///
    /// Returns error if the store rejects it
    pub fn record(&self, response: &Response) -> Result<()> {
        self.policy.record_interaction(self.request, response)
    }
}

/// Orchestrates handling of intercepted requests for one integration
pub struct RequestHandler<H> {
    integration: String,
    policy: Arc<dyn Policy>,
    handler: H,
}

impl<H: DispositionHandler> RequestHandler<H> {
    /// Create a handler for the named integration
    pub fn new(integration: impl Into<String>, policy: Arc<dyn Policy>, handler: H) -> Self {
        Self {
            integration: integration.into(),
            policy,
            handler,
        }
    }

    /// Integration name
    pub fn integration(&self) -> &str {
        &self.integration
    }

    /// The integration's disposition handler
    pub fn disposition_handler(&self) -> &H {
        &self.handler
    }

    /// Whether the integration is currently disabled
    pub fn is_disabled(&self) -> bool {
        self.policy.is_disabled(&self.integration)
    }

    /// Classify a request against the current policy
    pub fn classify(&self, request: &Request) -> Disposition {
        classify(self.policy.as_ref(), &self.integration, request)
    }

    fn typed_request<'r>(&self, request: &'r Request) -> TypedRequest<'r> {
        TypedRequest::new(request, self.classify(request))
    }

    /// Handle one intercepted request
    ///
    /// Returns the response produced by the disposition handler, or `None`
    /// when it produced nothing.
    ///
    /// # Errors
    ///
    /// Propagates hook failures and disposition handler failures unchanged;
    /// unhandled requests fail with [`RewindError::UnhandledRequest`]
    pub async fn handle(&self, request: &Request) -> Result<Option<Response>> {
        self.invoke_before_request_hook(request)?;

        // Hooks above may have changed policy; the after hooks get this
        // snapshot, whatever dispatch does to policy below.
        let after_hook_typed_request = self.typed_request(request);

        let cycle = HandlingCycle::new(request, self.policy.as_ref(), &self.integration);
        let disposition = self.classify(request);
        debug!(
            "Dispatching {} via {} as {}",
            request, self.integration, disposition
        );

        let response = match disposition {
            Disposition::Ignored => self.handler.on_ignored(&cycle).await?,
            Disposition::Stubbed => self.handler.on_stubbed(&cycle).await?,
            Disposition::Recordable => self.handler.on_recordable(&cycle).await?,
            Disposition::Unhandled => self.handler.on_unhandled(&cycle).await?,
        };

        self.invoke_after_request_hook(&after_hook_typed_request, response.as_ref())?;

        Ok(response)
    }

    fn invoke_before_request_hook(&self, request: &Request) -> Result<()> {
        if self.is_disabled() {
            return Ok(());
        }

        let typed_request = self.typed_request(request);
        self.policy
            .invoke_hook(&HookEvent::BeforeHttpRequest(&typed_request))
    }

    fn invoke_after_request_hook(
        &self,
        typed_request: &TypedRequest<'_>,
        response: Option<&Response>,
    ) -> Result<()> {
        if self.is_disabled() {
            return Ok(());
        }

        self.policy
            .invoke_hook(&HookEvent::AfterHttpRequest(typed_request, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::mock::{HookCall, MockPolicy};
    use crate::policy::HookName;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    /// Uses every default
    struct Defaults;

    impl DispositionHandler for Defaults {}

    /// Stands in for a real integration
    #[derive(Default)]
    struct LiveIntegration {
        calls: Mutex<Vec<Disposition>>,
    }

    impl DispositionHandler for LiveIntegration {
        async fn on_ignored(&self, cycle: &HandlingCycle<'_>) -> Result<Option<Response>> {
            self.calls.lock().unwrap().push(Disposition::Ignored);
            Ok(Some(Response::new(200, format!("passthrough {}", cycle.request()))))
        }

        async fn on_recordable(&self, cycle: &HandlingCycle<'_>) -> Result<Option<Response>> {
            self.calls.lock().unwrap().push(Disposition::Recordable);
            let response = Response::new(201, "live");
            cycle.record(&response)?;
            Ok(Some(response))
        }
    }

    /// Reads the stub twice within one cycle
    struct DoubleRead;

    impl DispositionHandler for DoubleRead {
        async fn on_stubbed(&self, cycle: &HandlingCycle<'_>) -> Result<Option<Response>> {
            let first = cycle.stubbed_response();
            let second = cycle.stubbed_response();
            assert_eq!(first, second);
            Ok(second)
        }
    }

    /// Mutates policy while dispatching
    struct Mutating(Arc<MockPolicy>);

    impl DispositionHandler for Mutating {
        async fn on_recordable(&self, _cycle: &HandlingCycle<'_>) -> Result<Option<Response>> {
            self.0.live.store(false, Ordering::SeqCst);
            *self.0.stub.lock().unwrap() = Some(Response::new(200, "late stub"));
            Ok(Some(Response::new(200, "live")))
        }
    }

    fn request() -> Request {
        Request::new("GET", "http://example.com/users")
    }

    fn handler<H: DispositionHandler>(policy: &Arc<MockPolicy>, h: H) -> RequestHandler<H> {
        RequestHandler::new("proxy", Arc::clone(policy) as Arc<dyn Policy>, h)
    }

    fn call(name: HookName, disposition: Disposition, response: Option<Response>) -> HookCall {
        HookCall {
            name,
            disposition,
            response,
        }
    }

    #[tokio::test]
    async fn test_unhandled_raises_without_after_hook() {
        let policy = Arc::new(MockPolicy::new());
        let handler = handler(&policy, Defaults);
        let request = request();

        let result = handler.handle(&request).await;

        let error = result.unwrap_err();
        assert_eq!(error.unhandled_request(), Some(&request));
        assert_eq!(
            policy.hook_calls(),
            vec![call(HookName::BeforeHttpRequest, Disposition::Unhandled, None)]
        );
    }

    #[tokio::test]
    async fn test_stubbed_returns_stored_response() {
        let stored = Response::new(200, "stored");
        let policy = Arc::new(MockPolicy::new().with_stub(stored.clone()));
        let handler = handler(&policy, Defaults);

        let response = handler.handle(&request()).await.unwrap();

        assert_eq!(response, Some(stored.clone()));
        assert_eq!(
            policy.hook_calls(),
            vec![
                call(HookName::BeforeHttpRequest, Disposition::Stubbed, None),
                call(HookName::AfterHttpRequest, Disposition::Stubbed, Some(stored)),
            ]
        );
    }

    #[tokio::test]
    async fn test_stubbed_response_fetched_once_per_cycle() {
        let policy = Arc::new(MockPolicy::new().with_stub(Response::new(200, "stored")));
        let handler = handler(&policy, DoubleRead);

        handler.handle(&request()).await.unwrap();

        assert_eq!(policy.response_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ignored_uses_default_empty_result() {
        let policy = Arc::new(MockPolicy::new().with_stub(Response::new(200, "")));
        policy.ignore.store(true, Ordering::SeqCst);
        let handler = handler(&policy, Defaults);

        let response = handler.handle(&request()).await.unwrap();

        assert!(response.is_none());
        assert_eq!(policy.store_calls(), 0);
        assert_eq!(
            policy.hook_calls(),
            vec![
                call(HookName::BeforeHttpRequest, Disposition::Ignored, None),
                call(HookName::AfterHttpRequest, Disposition::Ignored, None),
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_fires_no_hooks() {
        let policy = Arc::new(MockPolicy::new().with_stub(Response::new(200, "")).with_live());
        policy.disabled.store(true, Ordering::SeqCst);
        let handler = handler(&policy, LiveIntegration::default());

        let response = handler.handle(&request()).await.unwrap();

        assert_eq!(response.unwrap().status, 200);
        assert!(policy.hook_calls().is_empty());
        assert_eq!(policy.ignore_calls.load(Ordering::SeqCst), 0);
        assert_eq!(policy.store_calls(), 0);
        assert_eq!(policy.live_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *handler.disposition_handler().calls.lock().unwrap(),
            vec![Disposition::Ignored]
        );
    }

    #[tokio::test]
    async fn test_recordable_dispatch_records() {
        let policy = Arc::new(MockPolicy::new().with_live());
        let handler = handler(&policy, LiveIntegration::default());
        let request = request();

        let response = handler.handle(&request).await.unwrap().unwrap();

        assert_eq!(response.status, 201);
        let recorded = policy.recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, request);
    }

    #[tokio::test]
    async fn test_dispatch_uses_post_hook_classification() {
        let policy = Arc::new(MockPolicy::new());
        policy.on_before_hook(|policy| policy.live.store(true, Ordering::SeqCst));
        let handler = handler(&policy, LiveIntegration::default());

        let response = handler.handle(&request()).await.unwrap();

        assert_eq!(response.unwrap().status, 201);
        assert_eq!(
            *handler.disposition_handler().calls.lock().unwrap(),
            vec![Disposition::Recordable]
        );
        let calls = policy.hook_calls();
        assert_eq!(calls[0].disposition, Disposition::Unhandled);
        assert_eq!(calls[1].disposition, Disposition::Recordable);
    }

    #[tokio::test]
    async fn test_after_hook_snapshot_ignores_dispatch_mutation() {
        let policy = Arc::new(MockPolicy::new().with_live());
        let handler = handler(&policy, Mutating(Arc::clone(&policy)));

        handler.handle(&request()).await.unwrap();

        assert_eq!(handler.classify(&request()), Disposition::Stubbed);
        let calls = policy.hook_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].name, HookName::AfterHttpRequest);
        assert_eq!(calls[1].disposition, Disposition::Recordable);
    }

    #[tokio::test]
    async fn test_before_hook_failure_aborts_dispatch() {
        let policy = Arc::new(MockPolicy::new().with_live());
        policy.fail_on(HookName::BeforeHttpRequest);
        let handler = handler(&policy, LiveIntegration::default());

        let result = handler.handle(&request()).await;

        assert!(matches!(result, Err(RewindError::Hook { .. })));
        assert!(handler.disposition_handler().calls.lock().unwrap().is_empty());
        assert_eq!(policy.hook_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_after_hook_failure_discards_response() {
        let policy = Arc::new(MockPolicy::new().with_live());
        policy.fail_on(HookName::AfterHttpRequest);
        let handler = handler(&policy, LiveIntegration::default());

        let result = handler.handle(&request()).await;

        assert!(matches!(result, Err(RewindError::Hook { .. })));
        assert_eq!(policy.recorded.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stub_vanishing_at_dispatch() {
        let policy = Arc::new(MockPolicy::new().with_stub(Response::new(200, "")));
        policy.withhold_response.store(true, Ordering::SeqCst);
        let handler = handler(&policy, Defaults);

        let response = handler.handle(&request()).await.unwrap();

        assert!(response.is_none());
        assert_eq!(
            policy.hook_calls(),
            vec![
                call(HookName::BeforeHttpRequest, Disposition::Stubbed, None),
                call(HookName::AfterHttpRequest, Disposition::Stubbed, None),
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_by_before_hook_skips_after_hook() {
        let policy = Arc::new(MockPolicy::new().with_live());
        policy.on_before_hook(|policy| policy.disabled.store(true, Ordering::SeqCst));
        let handler = handler(&policy, LiveIntegration::default());

        let response = handler.handle(&request()).await.unwrap();

        assert_eq!(response.unwrap().status, 200);
        assert_eq!(
            *handler.disposition_handler().calls.lock().unwrap(),
            vec![Disposition::Ignored]
        );
        assert_eq!(
            policy.hook_calls(),
            vec![call(HookName::BeforeHttpRequest, Disposition::Recordable, None)]
        );
    }

    #[tokio::test]
    async fn test_concurrent_cycles() {
        let policy = Arc::new(MockPolicy::new().with_live());
        let handler = Arc::new(handler(&policy, LiveIntegration::default()));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let request = Request::new("GET", format!("http://example.com/{i}"));
                    handler.handle(&request).await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().unwrap().status, 201);
        }
        assert_eq!(policy.recorded.lock().unwrap().len(), 8);
    }
}
