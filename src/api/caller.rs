//! Per-caller steering rules.
//!
//! A caller is identified only by its source IP. Each caller may list the hosts
//! it prefers as master (in order) and the hosts that must never receive its
//! traffic.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

fn default_enable() -> bool {
    true
}

/// Steering rule for one source IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerItem {
    /// Exact source address, not a CIDR.
    pub ip: String,

    /// Host names, most preferred first.
    #[serde(default)]
    pub pref: Vec<String>,

    /// Host names excluded from fanout for this caller.
    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default = "default_enable")]
    pub enable: bool,

    #[serde(default)]
    pub note: String,
}

impl Default for CallerItem {
    fn default() -> Self {
        Self {
            ip: String::new(),
            pref: Vec::new(),
            ignore: Vec::new(),
            enable: true,
            note: String::new(),
        }
    }
}

impl CallerItem {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    pub fn with_pref<I, S>(mut self, pref: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pref = pref.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ignore<I, S>(mut self, ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = ignore.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_ignored(&self, host: &str) -> bool {
        self.ignore.iter().any(|h| h == host)
    }

    /// `pref` and `ignore` must not share a host.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ip.trim().is_empty() {
            return Err(ValidationError::EmptyCallerIp);
        }
        if let Some(host) = self.ignore.iter().find(|h| self.pref.contains(h)) {
            return Err(ValidationError::PrefIgnoreConflict {
                ip: self.ip.clone(),
                host: host.clone(),
            });
        }
        Ok(())
    }

    fn rename_host(&mut self, old: &str, new: &str) {
        for name in self.pref.iter_mut().chain(self.ignore.iter_mut()) {
            if name == old {
                *name = new.to_string();
            }
        }
        dedup_in_order(&mut self.pref);
        dedup_in_order(&mut self.ignore);
    }

    fn forget_host(&mut self, host: &str) {
        self.pref.retain(|h| h != host);
        self.ignore.retain(|h| h != host);
    }
}

fn dedup_in_order(names: &mut Vec<String>) {
    let mut seen: Vec<String> = Vec::with_capacity(names.len());
    names.retain(|n| {
        if seen.contains(n) {
            false
        } else {
            seen.push(n.clone());
            true
        }
    });
}

/// All caller rules of one API, keyed by IP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerRegistry {
    items: Vec<CallerItem>,
}

impl CallerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry, rejecting the whole set if any item is invalid.
    pub fn from_items(items: Vec<CallerItem>) -> Result<Self, ValidationError> {
        validate_items(&items)?;
        Ok(Self { items })
    }

    pub fn get(&self, ip: &str) -> Option<&CallerItem> {
        self.items.iter().find(|c| c.ip == ip)
    }

    /// Rule for `ip`, or the default rule (no preference, nothing ignored).
    pub fn resolve(&self, ip: &str) -> CallerItem {
        match self.get(ip) {
            Some(item) => item.clone(),
            None => CallerItem::new(ip),
        }
    }

    /// Replace every rule. Nothing is applied unless all items are valid.
    pub fn replace(&mut self, items: Vec<CallerItem>) -> Result<(), ValidationError> {
        validate_items(&items)?;
        self.items = items;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_items(&self.items)
    }

    pub fn items(&self) -> &[CallerItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn rename_host(&mut self, old: &str, new: &str) {
        for item in &mut self.items {
            item.rename_host(old, new);
        }
    }

    pub(crate) fn forget_host(&mut self, host: &str) {
        for item in &mut self.items {
            item.forget_host(host);
        }
    }
}

fn validate_items(items: &[CallerItem]) -> Result<(), ValidationError> {
    for (i, item) in items.iter().enumerate() {
        item.validate()?;
        if items[..i].iter().any(|prev| prev.ip == item.ip) {
            return Err(ValidationError::DuplicateCaller(item.ip.clone()));
        }
    }
    Ok(())
}
