//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect servers fighting over the same port
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::ProxyConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// One semantic problem in the process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("no enabled [[server]] configured")]
    NoServers,

    #[error("server port must not be 0")]
    ZeroPort,

    #[error("port {0} is configured more than once")]
    DuplicatePort(u16),

    #[error("server {port}: invalid bind_host {host:?}")]
    InvalidBindHost { port: u16, host: String },

    #[error("upstream.connect_timeout_ms must be greater than 0")]
    ZeroConnectTimeout,

    #[error("upstream.max_body_bytes must be greater than 0")]
    ZeroBodyLimit,

    #[error("unknown log level {0:?}")]
    InvalidLogLevel(String),

    #[error("invalid metrics_address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration, collecting every issue.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.enabled_servers().next().is_none() {
        issues.push(ConfigIssue::NoServers);
    }

    let mut ports = HashSet::new();
    for server in &config.servers {
        if server.port == 0 {
            issues.push(ConfigIssue::ZeroPort);
        } else if !ports.insert(server.port) {
            issues.push(ConfigIssue::DuplicatePort(server.port));
        }
        if server.bind_host.parse::<IpAddr>().is_err() {
            issues.push(ConfigIssue::InvalidBindHost {
                port: server.port,
                host: server.bind_host.clone(),
            });
        }
    }

    if config.upstream.connect_timeout_ms == 0 {
        issues.push(ConfigIssue::ZeroConnectTimeout);
    }
    if config.upstream.max_body_bytes == 0 {
        issues.push(ConfigIssue::ZeroBodyLimit);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        issues.push(ConfigIssue::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        issues.push(ConfigIssue::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
