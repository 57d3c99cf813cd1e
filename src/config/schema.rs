//! Configuration schema definitions.
//!
//! This module defines the process-level configuration: which servers to run,
//! how upstream connections behave, and the admin/observability surfaces.
//! Per-API definitions are not part of it; they live as JSON files in each
//! server's definition directory.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root configuration for the fanout proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening servers, one registry each.
    #[serde(rename = "server")]
    pub servers: Vec<ServerConfig>,

    /// Upstream connection settings shared by all servers.
    pub upstream: UpstreamConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Definition hot reload.
    pub reload: ReloadConfig,
}

impl ProxyConfig {
    /// Directory holding the API definitions of `server`.
    ///
    /// An explicit `conf_dir` wins; otherwise `api_<port>` next to the config file.
    pub fn api_dir(config_path: &Path, server: &ServerConfig) -> PathBuf {
        match &server.conf_dir {
            Some(dir) => PathBuf::from(dir),
            None => config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(format!("api_{}", server.port)),
        }
    }

    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|s| s.enable)
    }
}

/// One listening server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// Disabled servers are skipped at startup.
    pub enable: bool,

    pub name: String,
    pub note: String,

    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_host: String,

    /// Override for the definition directory.
    pub conf_dir: Option<String>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            enable: true,
            name: String::new(),
            note: String::new(),
            bind_host: "0.0.0.0".to_string(),
            conf_dir: None,
        }
    }
}

/// Upstream client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Idle pooled connections are closed after this many seconds.
    pub idle_secs: u64,

    /// Largest inbound body that is buffered for fanout.
    pub max_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            idle_secs: 90,
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API on routing misses.
    pub enabled: bool,

    /// Bearer key required by the admin API. Empty means open.
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl ObservabilityConfig {
    pub fn metrics_socket(&self) -> Option<SocketAddr> {
        self.metrics_address.parse().ok()
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Definition directory watching.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub watch: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self { watch: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [[server]]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.servers.len(), 1);
        let server = &config.servers[0];
        assert!(server.enable);
        assert_eq!(server.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.upstream.connect_timeout_ms, 2_000);
        assert!(config.admin.enabled);
        assert!(config.admin.api_key.is_empty());
        assert!(config.reload.watch);
    }

    #[test]
    fn api_dir_defaults_next_to_config() {
        let server = ServerConfig {
            port: 8081,
            ..Default::default()
        };
        let dir = ProxyConfig::api_dir(Path::new("/etc/fanout/server.toml"), &server);
        assert_eq!(dir, PathBuf::from("/etc/fanout/api_8081"));

        let server = ServerConfig {
            conf_dir: Some("/srv/apis".into()),
            ..server
        };
        let dir = ProxyConfig::api_dir(Path::new("/etc/fanout/server.toml"), &server);
        assert_eq!(dir, PathBuf::from("/srv/apis"));
    }

    #[test]
    fn disabled_servers_are_filtered() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [[server]]
            port = 9000

            [[server]]
            port = 9001
            enable = false
            "#,
        )
        .unwrap();

        let ports: Vec<u16> = config.enabled_servers().map(|s| s.port).collect();
        assert_eq!(ports, vec![9000]);
    }
}
