//! Ordered hook registry

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::request::{Response, TypedRequest};
use crate::Result;

use super::{HookEvent, HookName, PolicyContext};

/// A registered hook callback
///
/// Hooks receive the policy context so they can change policy, for example by
/// inserting a cassette before a request is dispatched.
pub type Hook = Arc<dyn Fn(&HookEvent<'_>, &PolicyContext) -> Result<()> + Send + Sync>;

type HookFilter = Arc<dyn Fn(&TypedRequest<'_>) -> bool + Send + Sync>;

#[derive(Clone)]
struct RegisteredHook {
    callback: Hook,
    filter: Option<HookFilter>,
}

/// Hook callbacks keyed by hook name, fired in registration order
#[derive(Default)]
pub struct HookRegistry {
    hooks: DashMap<HookName, Vec<RegisteredHook>>,
}

impl HookRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook under `name`
    pub fn register<F>(&self, name: HookName, hook: F)
    where
        F: Fn(&HookEvent<'_>, &PolicyContext) -> Result<()> + Send + Sync + 'static,
    {
        self.push(
            name,
            RegisteredHook {
                callback: Arc::new(hook),
                filter: None,
            },
        );
    }

    /// Register a hook that only fires for requests accepted by `filter`
    pub fn register_filtered<P, F>(&self, name: HookName, filter: P, hook: F)
    where
        P: Fn(&TypedRequest<'_>) -> bool + Send + Sync + 'static,
        F: Fn(&HookEvent<'_>, &PolicyContext) -> Result<()> + Send + Sync + 'static,
    {
        self.push(
            name,
            RegisteredHook {
                callback: Arc::new(hook),
                filter: Some(Arc::new(filter)),
            },
        );
    }

    /// Register a `before_http_request` hook
    pub fn before_http_request<F>(&self, hook: F)
    where
        F: Fn(&TypedRequest<'_>, &PolicyContext) -> Result<()> + Send + Sync + 'static,
    {
        self.register(HookName::BeforeHttpRequest, move |event, context| {
            hook(event.typed_request(), context)
        });
    }

    /// Register an `after_http_request` hook
    pub fn after_http_request<F>(&self, hook: F)
    where
        F: Fn(&TypedRequest<'_>, Option<&Response>, &PolicyContext) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.register(HookName::AfterHttpRequest, move |event, context| {
            hook(event.typed_request(), event.response(), context)
        });
    }

    fn push(&self, name: HookName, hook: RegisteredHook) {
        self.hooks.entry(name).or_default().push(hook);
    }

    /// Fire all hooks registered for the event, stopping at the first failure
    ///
    /// The hook list is copied before any hook runs, so hooks may register
    /// further hooks; those fire from the next invocation on.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a hook
    pub fn invoke(&self, event: &HookEvent<'_>, context: &PolicyContext) -> Result<()> {
        let name = event.name();
        let hooks = self
            .hooks
            .get(&name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        for hook in &hooks {
            if let Some(filter) = &hook.filter {
                if !filter(event.typed_request()) {
                    continue;
                }
            }
            (hook.callback)(event, context)?;
        }

        trace!("Invoked {} hook(s) for {}", hooks.len(), name);
        Ok(())
    }

    /// Number of hooks registered under `name`
    #[must_use]
    pub fn len(&self, name: HookName) -> usize {
        self.hooks.get(&name).map_or(0, |entry| entry.len())
    }

    /// True if no hook is registered at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.iter().all(|entry| entry.is_empty())
    }

    /// Remove every hook
    pub fn clear(&self) {
        self.hooks.clear();
    }
}
