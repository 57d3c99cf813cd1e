//! Error types shared across the proxy.
//!
//! # Taxonomy
//! - `StoreError`: a persisted API definition could not be read or written
//! - `ValidationError`: an administrative edit was rejected before it touched state
//! - `UpstreamError`: one upstream call failed; never fatal for the other hosts
//! - `RegistryError`: what a mutating registry operation reports to its caller

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failure reading or writing a persisted API definition.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("api definition [{0}] not found")]
    NotFound(String),

    #[error("api definition [{name}] is not valid json: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("api definition [{name}] io error: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// An administrative change that violates a definition invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("api name must not be empty")]
    EmptyName,

    #[error("api name [{0}] may only contain letters, digits, '-' and '_'")]
    InvalidName(String),

    #[error("api path [{0}] must start with '/'")]
    InvalidPath(String),

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("api has no hosts")]
    NoHosts,

    #[error("host name must not be empty")]
    EmptyHostName,

    #[error("host [{0}] is defined more than once")]
    DuplicateHost(String),

    #[error("host [{name}] has invalid url [{url}]: {reason}")]
    InvalidHostUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("caller ip must not be empty")]
    EmptyCallerIp,

    #[error("caller [{0}] is defined more than once")]
    DuplicateCaller(String),

    #[error("caller [{ip}] both prefers and ignores host [{host}]")]
    PrefIgnoreConflict { ip: String, host: String },

    #[error("api [{0}] already exists")]
    ApiExists(String),

    #[error("path [{path}] is already bound by api [{owner}]")]
    PathInUse { path: String, owner: String },
}

/// Failure of a single upstream call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream url [{url}]: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("reading upstream body: {0}")]
    Body(#[from] axum::Error),

    #[error("upstream task aborted: {0}")]
    Aborted(String),
}

/// Coarse classification of an [`UpstreamError`], used for diagnostics and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    InvalidUrl,
    Transport,
    Timeout,
    Body,
    Aborted,
}

impl UpstreamErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamErrorKind::InvalidUrl => "invalid_url",
            UpstreamErrorKind::Transport => "transport",
            UpstreamErrorKind::Timeout => "timeout",
            UpstreamErrorKind::Body => "body",
            UpstreamErrorKind::Aborted => "aborted",
        }
    }
}

impl UpstreamError {
    pub fn kind(&self) -> UpstreamErrorKind {
        match self {
            UpstreamError::InvalidUrl { .. } => UpstreamErrorKind::InvalidUrl,
            UpstreamError::Transport(_) => UpstreamErrorKind::Transport,
            UpstreamError::Timeout(_) => UpstreamErrorKind::Timeout,
            UpstreamError::Body(_) => UpstreamErrorKind::Body,
            UpstreamError::Aborted(_) => UpstreamErrorKind::Aborted,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == UpstreamErrorKind::Timeout
    }
}

/// Error returned by mutating registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_ip_and_host() {
        let err = ValidationError::PrefIgnoreConflict {
            ip: "10.0.0.1".into(),
            host: "h1".into(),
        };
        assert_eq!(err.to_string(), "caller [10.0.0.1] both prefers and ignores host [h1]");
    }

    #[test]
    fn timeout_kind() {
        let err = UpstreamError::Timeout(Duration::from_millis(50));
        assert!(err.is_timeout());
        assert_eq!(err.kind().as_str(), "timeout");
    }
}
