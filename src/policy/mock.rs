//! Counting policy double for unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::request::{Disposition, Request, Response};
use crate::{Result, RewindError};

use super::{HookEvent, HookName, Policy};

type Action = Box<dyn Fn(&MockPolicy) + Send + Sync>;

/// A hook invocation as observed by [`MockPolicy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HookCall {
    pub name: HookName,
    pub disposition: Disposition,
    pub response: Option<Response>,
}

#[derive(Default)]
pub(crate) struct MockPolicy {
    pub disabled: AtomicBool,
    pub ignore: AtomicBool,
    pub stub: Mutex<Option<Response>>,
    pub live: AtomicBool,
    pub withhold_response: AtomicBool,

    pub disabled_calls: AtomicUsize,
    pub ignore_calls: AtomicUsize,
    pub match_calls: AtomicUsize,
    pub response_calls: AtomicUsize,
    pub live_calls: AtomicUsize,

    pub hook_calls: Mutex<Vec<HookCall>>,
    pub recorded: Mutex<Vec<(Request, Response)>>,
    pub fail_hook: Mutex<Option<HookName>>,
    pub before_action: Mutex<Option<Action>>,
}

impl MockPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stub(self, response: Response) -> Self {
        *self.stub.lock().unwrap() = Some(response);
        self
    }

    pub fn with_live(self) -> Self {
        self.live.store(true, Ordering::SeqCst);
        self
    }

    pub fn on_before_hook<F>(&self, action: F)
    where
        F: Fn(&MockPolicy) + Send + Sync + 'static,
    {
        *self.before_action.lock().unwrap() = Some(Box::new(action));
    }

    pub fn fail_on(&self, name: HookName) {
        *self.fail_hook.lock().unwrap() = Some(name);
    }

    pub fn hook_calls(&self) -> Vec<HookCall> {
        self.hook_calls.lock().unwrap().clone()
    }

    pub fn store_calls(&self) -> usize {
        self.match_calls.load(Ordering::SeqCst) + self.response_calls.load(Ordering::SeqCst)
    }
}

impl Policy for MockPolicy {
    fn is_disabled(&self, _integration: &str) -> bool {
        self.disabled_calls.fetch_add(1, Ordering::SeqCst);
        self.disabled.load(Ordering::SeqCst)
    }

    fn should_ignore(&self, _request: &Request) -> bool {
        self.ignore_calls.fetch_add(1, Ordering::SeqCst);
        self.ignore.load(Ordering::SeqCst)
    }

    fn has_matching_interaction(&self, _request: &Request) -> bool {
        self.match_calls.fetch_add(1, Ordering::SeqCst);
        self.stub.lock().unwrap().is_some()
    }

    fn response_for(&self, _request: &Request) -> Option<Response> {
        self.response_calls.fetch_add(1, Ordering::SeqCst);
        if self.withhold_response.load(Ordering::SeqCst) {
            return None;
        }
        self.stub.lock().unwrap().clone()
    }

    fn is_live_traffic_allowed(&self) -> bool {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        self.live.load(Ordering::SeqCst)
    }

    fn invoke_hook(&self, event: &HookEvent<'_>) -> Result<()> {
        self.hook_calls.lock().unwrap().push(HookCall {
            name: event.name(),
            disposition: event.typed_request().disposition(),
            response: event.response().cloned(),
        });

        if *self.fail_hook.lock().unwrap() == Some(event.name()) {
            return Err(RewindError::hook(event.name().as_str(), "forced failure"));
        }

        if event.name() == HookName::BeforeHttpRequest {
            if let Some(action) = self.before_action.lock().unwrap().as_ref() {
                action(self);
            }
        }

        Ok(())
    }

    fn record_interaction(&self, request: &Request, response: &Response) -> Result<()> {
        self.recorded
            .lock()
            .unwrap()
            .push((request.clone(), response.clone()));
        Ok(())
    }
}
