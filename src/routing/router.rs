//! Route table.
//!
//! # Responsibilities
//! - Store bound prefixes and their handlers
//! - Resolve a request path to the handler of the longest matching prefix
//! - Produce modified copies on bind/unbind
//!
//! # Design Decisions
//! - A table value is never mutated while shared; the registry clones it,
//!   edits the clone and publishes it atomically
//! - Entries kept sorted by prefix length (longest first), so the first
//!   match is the most specific one
//! - Explicit `None` on miss rather than a silent default

use crate::routing::matcher::PathPrefixMatcher;

/// One bound prefix.
#[derive(Debug, Clone)]
pub struct Route<H> {
    matcher: PathPrefixMatcher,
    api_name: String,
    handler: H,
}

impl<H> Route<H> {
    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// Name of the API that owns this route.
    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Prefix → handler table with longest-prefix resolution.
#[derive(Debug, Clone)]
pub struct RoutingTable<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for RoutingTable<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H: Clone> RoutingTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `prefix`, replacing any entry with the same prefix.
    pub fn bind(&mut self, prefix: impl Into<String>, api_name: impl Into<String>, handler: H) {
        let matcher = PathPrefixMatcher::new(prefix);
        self.routes.retain(|r| r.matcher != matcher);
        self.routes.push(Route {
            matcher,
            api_name: api_name.into(),
            handler,
        });
        // Stable sort keeps resolution deterministic.
        self.routes
            .sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()).then(a.prefix().cmp(b.prefix())));
    }

    /// Remove the entry for `prefix`. Returns whether one existed.
    pub fn unbind(&mut self, prefix: &str) -> bool {
        let before = self.routes.len();
        self.routes.retain(|r| r.prefix() != prefix);
        before != self.routes.len()
    }

    /// Remove every entry owned by `api_name`.
    pub fn unbind_api(&mut self, api_name: &str) -> usize {
        let before = self.routes.len();
        self.routes.retain(|r| r.api_name != api_name);
        before - self.routes.len()
    }

    /// The route with the longest prefix of `path`.
    pub fn resolve(&self, path: &str) -> Option<&Route<H>> {
        self.routes.iter().find(|r| r.matcher.score(path).is_some())
    }

    /// Prefix bound by `api_name`, if any.
    pub fn prefix_of(&self, api_name: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|r| r.api_name == api_name)
            .map(|r| r.prefix())
    }

    /// Owner of `prefix`, if bound.
    pub fn owner_of(&self, prefix: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|r| r.prefix() == prefix)
            .map(|r| r.api_name())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(table: &RoutingTable<&'static str>, path: &str) -> Option<&'static str> {
        table.resolve(path).map(|r| *r.handler())
    }

    #[test]
    fn longest_prefix_wins() {
        let mut table = RoutingTable::new();
        table.bind("/a", "a", "short");
        table.bind("/a/b", "ab", "long");

        assert_eq!(resolved(&table, "/a/b/c"), Some("long"));
        assert_eq!(resolved(&table, "/a/x"), Some("short"));
        assert_eq!(resolved(&table, "/z"), None);
    }

    #[test]
    fn bind_order_does_not_matter() {
        let mut table = RoutingTable::new();
        table.bind("/a/b", "ab", "long");
        table.bind("/a", "a", "short");
        table.bind("/", "root", "root");

        assert_eq!(resolved(&table, "/a/b/c"), Some("long"));
        assert_eq!(resolved(&table, "/a/c"), Some("short"));
        assert_eq!(resolved(&table, "/other"), Some("root"));
    }

    #[test]
    fn rebind_replaces_entry() {
        let mut table = RoutingTable::new();
        table.bind("/user/", "user", "v1");
        table.bind("/user/", "user", "v2");

        assert_eq!(table.len(), 1);
        assert_eq!(resolved(&table, "/user/get"), Some("v2"));
    }

    #[test]
    fn unbind_by_prefix_and_owner() {
        let mut table = RoutingTable::new();
        table.bind("/user/", "user", "u");
        table.bind("/order/", "order", "o");

        assert!(table.unbind("/user/"));
        assert!(!table.unbind("/user/"));
        assert_eq!(resolved(&table, "/user/get"), None);

        assert_eq!(table.prefix_of("order"), Some("/order/"));
        assert_eq!(table.owner_of("/order/"), Some("order"));
        assert_eq!(table.unbind_api("order"), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn clone_is_independent() {
        let mut table = RoutingTable::new();
        table.bind("/a", "a", "a");
        let mut next = table.clone();
        next.unbind("/a");

        assert_eq!(resolved(&table, "/a"), Some("a"));
        assert_eq!(resolved(&next, "/a"), None);
    }
}
