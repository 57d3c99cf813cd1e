//! Path prefix matching.
//!
//! # Design Decisions
//! - Plain byte-prefix comparison, case-sensitive
//! - The match score is the prefix length, so the most specific prefix wins
//! - No regex to guarantee O(n) matching

/// Matches request paths that start with a fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Length of the matched prefix, or `None` when `path` does not match.
    pub fn score(&self, path: &str) -> Option<usize> {
        path.starts_with(&self.prefix).then_some(self.prefix.len())
    }

    /// The part of `path` after the prefix.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.prefix.as_str())
    }
}
