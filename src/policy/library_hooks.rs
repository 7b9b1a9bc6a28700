//! Registry of enabled and disabled integrations

use std::sync::{PoisonError, RwLock};

use dashmap::DashSet;
use tracing::debug;

/// Tracks which integrations may intercept requests
///
/// An integration is disabled when it was disabled explicitly, or when another
/// integration is exclusively enabled.
#[derive(Default)]
pub struct LibraryHooks {
    disabled: DashSet<String>,
    exclusive: RwLock<Option<String>>,
}

impl LibraryHooks {
    /// Create a registry with every integration enabled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the named integration is disabled
    #[must_use]
    pub fn is_disabled(&self, integration: &str) -> bool {
        if self.disabled.contains(integration) {
            return true;
        }

        let exclusive = self.exclusive.read().unwrap_or_else(PoisonError::into_inner);
        exclusive
            .as_deref()
            .is_some_and(|enabled| enabled != integration)
    }

    /// Disable an integration
    pub fn disable(&self, integration: impl Into<String>) {
        let integration = integration.into();
        debug!("Disabling integration: {}", integration);
        self.disabled.insert(integration);
    }

    /// Re-enable an explicitly disabled integration
    pub fn enable(&self, integration: &str) {
        debug!("Enabling integration: {}", integration);
        self.disabled.remove(integration);
    }

    /// Disable every integration except `integration` until the guard drops
    ///
    /// Guards nest; dropping one restores whatever was exclusive before it.
    #[must_use = "the integration is only exclusive while the guard is alive"]
    pub fn exclusively_enabled(&self, integration: impl Into<String>) -> ExclusiveGuard<'_> {
        let integration = integration.into();
        debug!("Exclusively enabling integration: {}", integration);

        let mut exclusive = self.exclusive.write().unwrap_or_else(PoisonError::into_inner);
        let previous = exclusive.replace(integration);

        ExclusiveGuard {
            hooks: self,
            previous,
        }
    }
}

/// Restores the previous exclusive integration when dropped
pub struct ExclusiveGuard<'a> {
    hooks: &'a LibraryHooks,
    previous: Option<String>,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        let mut exclusive = self
            .hooks
            .exclusive
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *exclusive = self.previous.take();
    }
}
