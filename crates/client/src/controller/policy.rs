//! Request routing policy.
//!
//! [`decide`] is pure: it looks only at the request and the configured
//! bypass list, so routing can be tested without a network or a store.

use crate::fetch::{Request, host_matches, is_fetchable};

/// How the controller treats a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Not intercepted; the host performs the request itself.
    PassThrough,
    /// Always forwarded to the network, never stored.
    BypassCache,
    /// Network first, stored on success, cache/offline fallback on failure.
    NetworkFirst,
}

/// Hosts whose content is always fetched fresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    bypass_hosts: Vec<String>,
}

impl RoutePolicy {
    /// Build a policy from host patterns. Blank entries are dropped and
    /// patterns are stored lowercase.
    pub fn new<I, S>(bypass_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bypass_hosts = bypass_hosts
            .into_iter()
            .map(|h| h.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { bypass_hosts }
    }

    pub fn bypass_hosts(&self) -> &[String] {
        &self.bypass_hosts
    }

    /// Whether `host` is on the bypass list (exactly or as a subdomain).
    pub fn is_bypassed(&self, host: &str) -> bool {
        self.bypass_hosts.iter().any(|pattern| host_matches(host, pattern))
    }
}

/// Decide how to route a request.
pub fn decide(request: &Request, policy: &RoutePolicy) -> Action {
    if !request.is_get() {
        return Action::PassThrough;
    }

    if !is_fetchable(&request.url) {
        return Action::PassThrough;
    }

    match request.url.host_str() {
        Some(host) if policy.is_bypassed(host) => Action::BypassCache,
        _ => Action::NetworkFirst,
    }
}
