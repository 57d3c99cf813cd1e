//! API definitions.
//!
//! An API is the routable unit of the proxy: a bind path, the ordered upstream
//! hosts that receive every request, the caller rules that pick the master, and
//! the per-call timeout.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::caller::{CallerItem, CallerRegistry};
use crate::api::host::{Host, Hosts};
use crate::api::store::ApiStore;
use crate::error::{RegistryError, ValidationError};

/// Timeout used when a definition does not set one.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_enable() -> bool {
    true
}

/// A named, path-bound fanout rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Api {
    pub name: String,

    /// URL prefix; empty means `/<name>/`.
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub hosts: Hosts,

    #[serde(default)]
    pub caller: CallerRegistry,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_enable")]
    pub enable: bool,

    #[serde(default)]
    pub note: String,
}

impl Api {
    /// Empty, enabled definition bound to `/<name>/`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: default_path(&name),
            name,
            hosts: Hosts::new(),
            caller: CallerRegistry::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            enable: true,
            note: String::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The prefix this API is routed under.
    pub fn bind_path(&self) -> String {
        if self.path.is_empty() {
            default_path(&self.name)
        } else {
            self.path.clone()
        }
    }

    /// Pick the master host for `caller`.
    ///
    /// Walks the caller's preference list first, skipping names that are
    /// unknown or ignored; otherwise the first host in definition order, even
    /// when that host is ignored. Returns `None` only for an API without hosts.
    pub fn select_master(&self, caller: &CallerItem) -> Option<&str> {
        caller
            .pref
            .iter()
            .filter(|name| !caller.is_ignored(name))
            .find_map(|name| self.hosts.get(name))
            .or_else(|| self.hosts.iter().next())
            .map(|h| h.name.as_str())
    }

    /// Insert a host or replace the one with the same name.
    pub fn add_host(&mut self, host: Host) {
        self.hosts.upsert(host);
    }

    /// Rename a host and rewrite caller rules that reference it.
    pub fn rename_host(&mut self, old: &str, new: &str) {
        if old.is_empty() || old == new {
            return;
        }
        if self.hosts.rename(old, new) {
            self.caller.rename_host(old, new);
        }
    }

    /// Drop every host not listed in `keep`, scrubbing caller rules as well.
    pub fn retain_hosts(&mut self, keep: &[String]) {
        for dropped in self.hosts.retain_named(keep) {
            self.caller.forget_host(&dropped);
        }
    }

    /// Replace caller rules; rejected as a whole on any conflict.
    pub fn replace_callers(&mut self, items: Vec<CallerItem>) -> Result<(), ValidationError> {
        self.caller.replace(items)
    }

    /// Check every invariant an administrative save must uphold.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        let path = self.bind_path();
        if !path.starts_with('/') {
            return Err(ValidationError::InvalidPath(path));
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        if self.hosts.is_empty() {
            return Err(ValidationError::NoHosts);
        }
        if let Some(dup) = self.hosts.find_duplicate() {
            return Err(ValidationError::DuplicateHost(dup.to_string()));
        }
        for host in &self.hosts {
            host.validate()?;
        }
        self.caller.validate()
    }

    /// Validate and persist through `store`. The registry is not touched; a
    /// subsequent `load` makes the change live.
    pub fn save(&self, store: &dyn ApiStore) -> Result<(), RegistryError> {
        self.validate()?;
        store.write_definition(self)?;
        Ok(())
    }
}

pub(crate) fn default_path(name: &str) -> String {
    format!("/{}/", name)
}

pub(crate) fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(())
}
