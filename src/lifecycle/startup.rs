//! Startup orchestration.
//!
//! # Responsibilities
//! - Prepare each enabled server's definition directory
//! - Load stored definitions before traffic is accepted
//! - Start definition watchers
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Servers initialize in config order, not concurrently
//! - Listeners start last (traffic only when definitions are loaded)

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::api::JsonFileStore;
use crate::config::{DefinitionWatcher, ProxyConfig};
use crate::http::ApiServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::registry::ApiRegistry;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot prepare definition directory {path:?}: {source}")]
    DefinitionDir { path: PathBuf, source: io::Error },

    #[error("cannot bind {address}: {source}")]
    Bind { address: String, source: io::Error },
}

/// Handles to everything `start_servers` launched.
pub struct Running {
    tasks: JoinSet<io::Result<()>>,
    registries: Vec<Arc<ApiRegistry>>,
    addresses: Vec<SocketAddr>,
    _watchers: Vec<RecommendedWatcher>,
}

impl Running {
    pub fn registries(&self) -> &[Arc<ApiRegistry>] {
        &self.registries
    }

    /// Bound addresses, in config order.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    /// Wait for every server to stop.
    pub async fn wait(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Server exited with error"),
                Err(e) => tracing::error!(error = %e, "Server task failed"),
            }
        }
    }
}

/// Start every enabled server of `config`. `config_path` locates the default
/// definition directories.
pub async fn start_servers(
    config: &ProxyConfig,
    config_path: &Path,
    shutdown: &Shutdown,
) -> Result<Running, StartupError> {
    let mut running = Running {
        tasks: JoinSet::new(),
        registries: Vec::new(),
        addresses: Vec::new(),
        _watchers: Vec::new(),
    };

    for server_config in config.enabled_servers() {
        let dir = ProxyConfig::api_dir(config_path, server_config);
        std::fs::create_dir_all(&dir).map_err(|source| StartupError::DefinitionDir {
            path: dir.clone(),
            source,
        })?;

        let store = Arc::new(JsonFileStore::new(&dir));
        let server = ApiServer::new(server_config.clone(), config, store);
        let registry = server.registry().clone();
        registry.load_all();

        if config.reload.watch {
            match DefinitionWatcher::new(&dir, registry.clone()).run(shutdown.subscribe()) {
                Ok(watcher) => running._watchers.push(watcher),
                Err(e) => tracing::warn!(path = ?dir, error = %e, "Hot reload unavailable"),
            }
        }

        let address = server_config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind {
                address: address.clone(),
                source,
            })?;
        let local = listener.local_addr().map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

        tracing::info!(
            server = %server_config.name,
            address = %local,
            definitions = ?dir,
            "Server ready"
        );

        running.tasks.spawn(server.run(listener, shutdown.subscribe()));
        running.registries.push(registry);
        running.addresses.push(local);
    }

    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Api, ApiStore, Host};
    use crate::config::ServerConfig;

    fn config(dir: &Path) -> ProxyConfig {
        ProxyConfig {
            servers: vec![ServerConfig {
                port: 1,
                bind_host: "127.0.0.1".into(),
                conf_dir: Some(dir.join("defs").display().to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn loads_definitions_before_serving() {
        let dir = tempfile::tempdir().unwrap();
        let defs = dir.path().join("defs");
        let store = JsonFileStore::new(&defs);
        let mut api = Api::new("user");
        api.add_host(Host::new("h1", "http://127.0.0.1:9/", true));
        store.write_definition(&api).unwrap();

        // Port 0 binds anywhere.
        let mut config = config(dir.path());
        config.servers[0].port = 0;
        config.reload.watch = false;

        let shutdown = Shutdown::new();
        let running = start_servers(&config, &dir.path().join("server.toml"), &shutdown)
            .await
            .unwrap();

        assert_eq!(running.addresses().len(), 1);
        assert!(running.registries()[0].resolve("/user/x").is_some());

        shutdown.trigger();
        running.wait().await;
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = config(dir.path());
        config.servers[0].port = taken.local_addr().unwrap().port();
        config.reload.watch = false;

        let err = start_servers(&config, &dir.path().join("server.toml"), &Shutdown::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::Bind { .. }));
    }
}
