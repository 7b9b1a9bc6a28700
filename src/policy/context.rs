//! Shared, mutable policy state

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info};

use crate::cassette::{Cassette, CassetteStack};
use crate::config::Config;
use crate::request::{Request, Response};
use crate::{Result, RewindError};

use super::{HookEvent, HookRegistry, LibraryHooks, Policy, RequestIgnorer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Switch {
    On,
    Off { ignore_cassettes: bool },
}

/// Process-wide interception policy, passed around as an explicit value
///
/// Every part uses interior mutability, so an `Arc<PolicyContext>` can be
/// shared by integrations, tests and hooks.
pub struct PolicyContext {
    library_hooks: LibraryHooks,
    ignorer: RequestIgnorer,
    hooks: HookRegistry,
    cassettes: CassetteStack,
    allow_when_no_cassette: AtomicBool,
    switch: RwLock<Switch>,
}

impl PolicyContext {
    /// Create a context that is turned on, has no cassette and forbids live
    /// traffic
    #[must_use]
    pub fn new() -> Self {
        Self {
            library_hooks: LibraryHooks::new(),
            ignorer: RequestIgnorer::new(),
            hooks: HookRegistry::new(),
            cassettes: CassetteStack::new(),
            allow_when_no_cassette: AtomicBool::new(false),
            switch: RwLock::new(Switch::On),
        }
    }

    /// Build a context from configuration
    ///
    /// The configured cassette is not inserted; see
    /// [`crate::config::CassetteConfig::build`].
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let context = Self::new();

        context.set_allow_http_connections_when_no_cassette(
            config.allow_http_connections_when_no_cassette,
        );
        context.ignorer.set_ignore_localhost(config.ignore_localhost);
        context.ignorer.ignore_hosts(&config.ignore_hosts);
        for integration in &config.disabled_integrations {
            context.library_hooks.disable(integration.as_str());
        }

        context
    }

    /// Integration registry
    pub fn library_hooks(&self) -> &LibraryHooks {
        &self.library_hooks
    }

    /// Ignore rules
    pub fn ignorer(&self) -> &RequestIgnorer {
        &self.ignorer
    }

    /// Hook registry
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Cassette stack
    pub fn cassettes(&self) -> &CassetteStack {
        &self.cassettes
    }

    /// Allow or forbid live traffic while no cassette is inserted
    pub fn set_allow_http_connections_when_no_cassette(&self, allow: bool) {
        self.allow_when_no_cassette.store(allow, Ordering::SeqCst);
    }

    /// Insert a cassette
    ///
    /// Returns `false` when interception is turned off with
    /// `ignore_cassettes`, in which case the cassette is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RewindError::TurnedOff`] if interception is turned off, or
    /// [`RewindError::CassetteInUse`] if a cassette with the same name is
    /// already inserted
    pub fn insert_cassette(&self, cassette: Cassette) -> Result<bool> {
        match self.switch() {
            Switch::On => {
                self.cassettes.insert(cassette)?;
                Ok(true)
            }
            Switch::Off {
                ignore_cassettes: true,
            } => {
                debug!("Turned off; ignoring cassette '{}'", cassette.name());
                Ok(false)
            }
            Switch::Off {
                ignore_cassettes: false,
            } => Err(RewindError::TurnedOff),
        }
    }

    /// Eject the innermost cassette
    pub fn eject_cassette(&self) -> Option<Cassette> {
        self.cassettes.eject()
    }

    /// Name of the innermost cassette
    #[must_use]
    pub fn current_cassette_name(&self) -> Option<String> {
        self.cassettes.current_name()
    }

    /// Turn interception off: every request is let through to the network
    ///
    /// # Errors
    ///
    /// Returns [`RewindError::CassetteInUse`] if a cassette is inserted
    pub fn turn_off(&self, ignore_cassettes: bool) -> Result<()> {
        if let Some(name) = self.cassettes.current_name() {
            return Err(RewindError::CassetteInUse(name));
        }

        info!("Interception turned off (ignore_cassettes: {})", ignore_cassettes);
        *self.switch.write().unwrap_or_else(PoisonError::into_inner) =
            Switch::Off { ignore_cassettes };
        Ok(())
    }

    /// Turn interception back on
    pub fn turn_on(&self) {
        info!("Interception turned on");
        *self.switch.write().unwrap_or_else(PoisonError::into_inner) = Switch::On;
    }

    /// Whether interception is on
    #[must_use]
    pub fn is_turned_on(&self) -> bool {
        self.switch() == Switch::On
    }

    fn switch(&self) -> Switch {
        *self.switch.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PolicyContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for PolicyContext {
    fn is_disabled(&self, integration: &str) -> bool {
        self.library_hooks.is_disabled(integration)
    }

    fn should_ignore(&self, request: &Request) -> bool {
        self.ignorer.should_ignore(request)
    }

    fn has_matching_interaction(&self, request: &Request) -> bool {
        self.cassettes.has_interaction_matching(request)
    }

    fn response_for(&self, request: &Request) -> Option<Response> {
        self.cassettes.response_for(request)
    }

    fn is_live_traffic_allowed(&self) -> bool {
        if let Some(recording) = self.cassettes.current_recording() {
            return recording;
        }

        self.allow_when_no_cassette.load(Ordering::SeqCst) || !self.is_turned_on()
    }

    fn invoke_hook(&self, event: &HookEvent<'_>) -> Result<()> {
        self.hooks.invoke(event, self)
    }

    fn record_interaction(&self, request: &Request, response: &Response) -> Result<()> {
        if !self.cassettes.record(request, response) {
            debug!("No recording cassette; {} not recorded", request);
        }
        Ok(())
    }
}
