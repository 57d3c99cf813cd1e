//! Definition directory watcher for hot reload.
//!
//! A file `<dir>/<name>.json` that is created or modified reloads API `name`;
//! one that disappears unloads it. Writes made through the admin API are
//! picked up too, which is harmless since a load is idempotent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::api::store::definition_name;
use crate::error::StoreError;
use crate::registry::ApiRegistry;

/// What a filesystem event means for one API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionEvent {
    Changed(String),
    Removed(String),
}

impl DefinitionEvent {
    pub fn name(&self) -> &str {
        match self {
            Self::Changed(name) | Self::Removed(name) => name,
        }
    }
}

/// Map a raw notify event to definition events. Non-definition files and
/// access events yield nothing.
pub fn classify(event: &Event) -> Vec<DefinitionEvent> {
    let removed = match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => false,
        EventKind::Remove(_) => true,
        _ => return Vec::new(),
    };

    let mut out: Vec<DefinitionEvent> = Vec::new();
    for name in event.paths.iter().filter_map(|p| definition_name(p)) {
        let ev = if removed {
            DefinitionEvent::Removed(name)
        } else {
            DefinitionEvent::Changed(name)
        };
        if !out.contains(&ev) {
            out.push(ev);
        }
    }
    out
}

/// Apply one definition event to the registry.
pub fn apply(registry: &ApiRegistry, event: &DefinitionEvent) {
    match event {
        DefinitionEvent::Changed(name) => match registry.load(name) {
            Ok(_) => tracing::info!(api = %name, "Definition change applied"),
            // Renamed away or deleted between the event and the read.
            Err(StoreError::NotFound(_)) => {
                registry.unload(name);
            }
            Err(e) => {
                tracing::warn!(api = %name, error = %e, "Keeping current definition");
            }
        },
        DefinitionEvent::Removed(name) => {
            if registry.unload(name) {
                tracing::info!(api = %name, "Definition removed, api unloaded");
            }
        }
    }
}

/// Watches one server's definition directory.
pub struct DefinitionWatcher {
    dir: PathBuf,
    registry: Arc<ApiRegistry>,
}

impl DefinitionWatcher {
    pub fn new(dir: &Path, registry: Arc<ApiRegistry>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            registry,
        }
    }

    /// Start watching. Events are applied on a tokio task until `shutdown`
    /// fires; the returned watcher must be kept alive for as long.
    pub fn run(
        self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<RecommendedWatcher, notify::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel::<DefinitionEvent>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for ev in classify(&event) {
                        let _ = tx.send(ev);
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        let registry = self.registry;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    ev = rx.recv() => match ev {
                        Some(ev) => {
                            tracing::debug!(api = %ev.name(), event = ?ev, "Definition event");
                            let registry = Arc::clone(&registry);
                            if let Err(e) = tokio::task::spawn_blocking(move || apply(&registry, &ev)).await {
                                tracing::error!(error = %e, "Definition event task failed");
                            }
                        }
                        None => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
            tracing::debug!("Definition watcher stopped");
        });

        tracing::info!(path = ?self.dir, "Definition watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Api, Host, JsonFileStore};
    use crate::config::UpstreamConfig;
    use crate::fanout::UpstreamClient;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn classifies_definition_files_only() {
        let ev = event(
            EventKind::Create(CreateKind::File),
            &["/d/user.json", "/d/.user.json.tmp", "/d/readme.txt"],
        );
        assert_eq!(classify(&ev), vec![DefinitionEvent::Changed("user".into())]);

        let ev = event(EventKind::Modify(ModifyKind::Any), &["/d/a.json", "/d/a.json"]);
        assert_eq!(classify(&ev), vec![DefinitionEvent::Changed("a".into())]);

        let ev = event(EventKind::Remove(RemoveKind::File), &["/d/order.json"]);
        assert_eq!(classify(&ev), vec![DefinitionEvent::Removed("order".into())]);

        let ev = event(EventKind::Access(AccessKind::Any), &["/d/order.json"]);
        assert!(classify(&ev).is_empty());
    }

    #[test]
    fn apply_loads_and_unloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()));
        let registry = ApiRegistry::new(
            store.clone(),
            UpstreamClient::new(&UpstreamConfig::default()),
        );

        let mut api = Api::new("user");
        api.add_host(Host::new("h1", "http://127.0.0.1:9001/", true));
        registry.save(&api).unwrap();

        apply(&registry, &DefinitionEvent::Changed("user".into()));
        assert!(registry.resolve("/user/x").is_some());

        // A broken edit keeps the running definition.
        std::fs::write(dir.path().join("user.json"), "{").unwrap();
        apply(&registry, &DefinitionEvent::Changed("user".into()));
        assert!(registry.resolve("/user/x").is_some());

        std::fs::remove_file(dir.path().join("user.json")).unwrap();
        apply(&registry, &DefinitionEvent::Changed("user".into()));
        assert!(registry.get_by_name("user").is_none());

        registry.save(&api).unwrap();
        apply(&registry, &DefinitionEvent::Changed("user".into()));
        apply(&registry, &DefinitionEvent::Removed("user".into()));
        assert!(registry.resolve("/user/x").is_none());
    }
}
