//! Rules for requests that bypass interception entirely

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashSet;
use tracing::trace;

use crate::request::Request;

/// Hosts treated as the local machine
pub const LOCALHOST_ALIASES: [&str; 4] = ["localhost", "127.0.0.1", "0.0.0.0", "::1"];

type IgnoreRule = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Decides whether a request should be ignored
#[derive(Default)]
pub struct RequestIgnorer {
    hosts: DashSet<String>,
    localhost: AtomicBool,
    rules: RwLock<Vec<IgnoreRule>>,
}

impl RequestIgnorer {
    /// Create an ignorer that ignores nothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore requests to these hosts (case-insensitive)
    pub fn ignore_hosts<I, S>(&self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for host in hosts {
            self.hosts.insert(host.as_ref().to_lowercase());
        }
    }

    /// Stop ignoring these hosts
    pub fn unignore_hosts<I, S>(&self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for host in hosts {
            self.hosts.remove(&host.as_ref().to_lowercase());
        }
    }

    /// Toggle ignoring of requests to the local machine
    pub fn set_ignore_localhost(&self, ignore: bool) {
        self.localhost.store(ignore, Ordering::Relaxed);
    }

    /// Whether localhost requests are ignored
    #[must_use]
    pub fn ignores_localhost(&self) -> bool {
        self.localhost.load(Ordering::Relaxed)
    }

    /// Add a custom ignore predicate
    pub fn ignore_request<F>(&self, rule: F)
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(rule));
    }

    /// Whether the request matches any ignore rule
    #[must_use]
    pub fn should_ignore(&self, request: &Request) -> bool {
        if let Some(host) = request.host() {
            if self.hosts.contains(&host) {
                trace!("Ignoring request to ignored host {}", host);
                return true;
            }
            if self.ignores_localhost() && LOCALHOST_ALIASES.contains(&host.as_str()) {
                trace!("Ignoring localhost request to {}", host);
                return true;
            }
        }

        let rules = self
            .rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        rules.iter().any(|rule| rule(request))
    }
}
