//! Upstream hosts of an API.
//!
//! # Responsibilities
//! - Represent a single upstream target (name, base URL, note)
//! - Keep the ordered, name-keyed host set of one API
//! - Build the upstream URL for a proxied request
//!
//! # Design Decisions
//! - Order is significant: the first host is the default master
//! - `enable` is informational; the fanout engine never filters on it

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ValidationError;

fn default_enable() -> bool {
    true
}

/// A single upstream target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Identifier, unique within the owning API.
    pub name: String,

    /// Absolute base URL, e.g. `http://10.0.0.1:8080/api/`.
    pub url: String,

    #[serde(default = "default_enable")]
    pub enable: bool,

    #[serde(default)]
    pub note: String,
}

impl Host {
    pub fn new(name: impl Into<String>, url: impl Into<String>, enable: bool) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enable,
            note: String::new(),
        }
    }

    /// Build the upstream URL for a request path relative to the API's bind prefix.
    ///
    /// A trailing `/` on the base URL absorbs the leading `/` of the relative path.
    pub fn upstream_url(&self, rel_path: &str, query: Option<&str>) -> String {
        let mut url = self.url.clone();
        if url.ends_with('/') {
            url.push_str(rel_path.trim_start_matches('/'));
        } else {
            url.push_str(rel_path);
        }
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    /// Check that the base URL is an absolute `http` URL.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyHostName);
        }
        let invalid = |reason: String| ValidationError::InvalidHostUrl {
            name: self.name.clone(),
            url: self.url.clone(),
            reason,
        };
        let parsed = Url::parse(&self.url).map_err(|e| invalid(e.to_string()))?;
        if parsed.scheme() != "http" {
            return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
        }
        if parsed.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        Ok(())
    }
}

/// Ordered set of hosts keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hosts(Vec<Host>);

impl Hosts {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&Host> {
        self.0.iter().find(|h| h.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Host> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|h| h.name.clone()).collect()
    }

    /// Insert a host, replacing the one with the same name in place.
    pub fn upsert(&mut self, host: Host) {
        match self.0.iter_mut().find(|h| h.name == host.name) {
            Some(existing) => *existing = host,
            None => self.0.push(host),
        }
    }

    /// Rename `old` to `new`. Returns false when `old` does not exist.
    ///
    /// If a host named `new` already exists it is replaced by the renamed one.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if !self.contains(old) {
            return false;
        }
        if old != new {
            self.0.retain(|h| h.name != new);
            if let Some(host) = self.0.iter_mut().find(|h| h.name == old) {
                host.name = new.to_string();
            }
        }
        true
    }

    /// Keep only the named hosts. Returns the names that were dropped.
    pub fn retain_named(&mut self, keep: &[String]) -> Vec<String> {
        let mut dropped = Vec::new();
        self.0.retain(|h| {
            let kept = keep.iter().any(|k| k == &h.name);
            if !kept {
                dropped.push(h.name.clone());
            }
            kept
        });
        dropped
    }

    /// First host name that appears more than once.
    pub fn find_duplicate(&self) -> Option<&str> {
        self.0
            .iter()
            .enumerate()
            .find(|(i, h)| self.0[..*i].iter().any(|prev| prev.name == h.name))
            .map(|(_, h)| h.name.as_str())
    }
}

impl From<Vec<Host>> for Hosts {
    fn from(hosts: Vec<Host>) -> Self {
        Self(hosts)
    }
}

impl<'a> IntoIterator for &'a Hosts {
    type Item = &'a Host;
    type IntoIter = std::slice::Iter<'a, Host>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
