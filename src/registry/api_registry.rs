//! The live set of APIs of one server.
//!
//! # Responsibilities
//! - Load definitions from the store and bind their routes
//! - Reload, disable and delete APIs while requests are in flight
//! - Serve lock-free lookups to the request path
//!
//! # Design Decisions
//! - The API map and the routing table live in one immutable `Snapshot`
//!   published through `ArcSwap`; readers never see one without the other
//! - Writers are serialized by a mutex held across
//!   "read definition → update map → rebind route"; no network I/O under it
//! - Every (re)bind builds a new `FanoutHandler` from the just-loaded API

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;

use crate::api::{Api, ApiStore};
use crate::error::{RegistryError, StoreError};
use crate::fanout::{FanoutHandler, UpstreamClient};
use crate::routing::RoutingTable;

/// Handler stored in the routing table.
pub type Handler = Arc<FanoutHandler>;

/// Immutable view of the registry at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    apis: HashMap<String, Arc<Api>>,
    routes: RoutingTable<Handler>,
}

impl Snapshot {
    pub fn api(&self, name: &str) -> Option<&Arc<Api>> {
        self.apis.get(name)
    }

    pub fn apis(&self) -> impl Iterator<Item = &Arc<Api>> {
        self.apis.values()
    }

    pub fn routes(&self) -> &RoutingTable<Handler> {
        &self.routes
    }

    pub fn resolve(&self, path: &str) -> Option<&Handler> {
        self.routes.resolve(path).map(|r| r.handler())
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

/// Owned store of live APIs and their routes.
#[derive(Debug)]
pub struct ApiRegistry {
    store: Arc<dyn ApiStore>,
    client: UpstreamClient,
    write_lock: Mutex<()>,
    current: ArcSwap<Snapshot>,
}

impl ApiRegistry {
    pub fn new(store: Arc<dyn ApiStore>, client: UpstreamClient) -> Self {
        Self {
            store,
            client,
            write_lock: Mutex::new(()),
            current: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ApiStore> {
        &self.store
    }

    /// Current snapshot; stays valid (and unchanged) for as long as it is held.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Handler bound to the longest prefix of `path`.
    pub fn resolve(&self, path: &str) -> Option<Handler> {
        self.current.load().resolve(path).cloned()
    }

    /// All loaded APIs, sorted by name.
    pub fn list_apis(&self) -> Vec<Arc<Api>> {
        let mut apis: Vec<Arc<Api>> = self.current.load().apis().cloned().collect();
        apis.sort_by(|a, b| a.name.cmp(&b.name));
        apis
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Api>> {
        self.current.load().api(name).cloned()
    }

    /// Unregistered skeleton for administrative editing.
    pub fn new_api(&self, name: &str) -> Api {
        Api::new(name)
    }

    /// Validate and persist `api`. Takes effect after [`ApiRegistry::load`].
    pub fn save(&self, api: &Api) -> Result<(), RegistryError> {
        api.save(self.store.as_ref())
    }

    /// Load every stored definition. Failures are logged and skipped.
    /// Returns the number of APIs loaded.
    pub fn load_all(&self) -> usize {
        let names = match self.store.list_names() {
            Ok(names) => names,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list api definitions");
                return 0;
            }
        };

        let mut loaded = 0;
        for name in names {
            match self.load(&name) {
                Ok(_) => loaded += 1,
                Err(e) => tracing::warn!(api = %name, error = %e, "Skipping api definition"),
            }
        }
        tracing::info!(loaded, "Api definitions loaded");
        loaded
    }

    /// Bring memory in line with the store: load every stored definition and
    /// unload APIs whose definition is gone. Returns the number loaded.
    pub fn reload_all(&self) -> usize {
        let stored = match self.store.list_names() {
            Ok(names) => names,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list api definitions, keeping current state");
                return 0;
            }
        };

        let stale: Vec<String> = self
            .current
            .load()
            .apis
            .keys()
            .filter(|name| !stored.contains(*name))
            .cloned()
            .collect();
        for name in &stale {
            if self.unload(name) {
                tracing::info!(api = %name, "Definition gone, api unloaded");
            }
        }

        self.load_all()
    }

    /// (Re)load one API from the store and rebind its route.
    ///
    /// On a store error nothing changes and the error is returned.
    pub fn load(&self, name: &str) -> Result<Arc<Api>, StoreError> {
        let _guard = self.lock();

        let api = match self.store.read_definition(name) {
            Ok(api) => Arc::new(api),
            Err(e) => {
                tracing::error!(api = %name, error = %e, "Load api failed");
                return Err(e);
            }
        };

        let mut next = Snapshot::clone(&self.current.load());
        next.apis.insert(name.to_string(), Arc::clone(&api));
        let unbound = next.routes.unbind_api(name);

        if api.enable {
            let path = api.bind_path();
            if let Some(owner) = next.routes.owner_of(&path).filter(|owner| *owner != name) {
                tracing::warn!(api = %name, path = %path, previous = %owner, "Path taken over from another api");
            }
            let handler = Arc::new(FanoutHandler::new(Arc::clone(&api), self.client.clone()));
            next.routes.bind(path.clone(), name, handler);
            tracing::info!(api = %name, path = %path, hosts = api.hosts.len(), "Api loaded and bound");
        } else if unbound > 0 {
            tracing::info!(api = %name, "Api disabled, route removed");
        } else {
            tracing::info!(api = %name, "Api is not enabled, skip binding");
        }

        self.current.store(Arc::new(next));
        Ok(api)
    }

    /// Remove an API: its persisted definition, its route and its entry.
    ///
    /// Deleting an unknown name is a no-op. Returns whether anything was removed.
    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let _guard = self.lock();

        let current = self.current.load_full();
        if current.api(name).is_none() {
            tracing::debug!(api = %name, "Delete of unknown api ignored");
            return Ok(false);
        }

        self.store.remove_definition(name)?;
        self.publish_without(&current, name);
        tracing::info!(api = %name, "Api deleted");
        Ok(true)
    }

    /// Drop an API from memory only, leaving the store alone. Used when its
    /// definition file disappeared.
    pub fn unload(&self, name: &str) -> bool {
        let _guard = self.lock();

        let current = self.current.load_full();
        if current.api(name).is_none() {
            return false;
        }
        self.publish_without(&current, name);
        tracing::info!(api = %name, "Api unloaded");
        true
    }

    fn publish_without(&self, current: &Snapshot, name: &str) {
        let mut next = current.clone();
        next.apis.remove(name);
        next.routes.unbind_api(name);
        self.current.store(Arc::new(next));
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`; a poisoned lock carries no broken state.
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CallerItem, Host, JsonFileStore};
    use crate::config::UpstreamConfig;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn api(name: &str, path: &str) -> Api {
        let mut api = Api::new(name);
        api.path = path.to_string();
        api.add_host(Host::new("h1", "http://127.0.0.1:9001/", true));
        api.add_host(Host::new("h2", "http://127.0.0.1:9002/", true));
        api
    }

    fn registry() -> (tempfile::TempDir, Arc<ApiRegistry>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()));
        let client = UpstreamClient::new(&UpstreamConfig::default());
        (dir, Arc::new(ApiRegistry::new(store, client)))
    }

    #[test]
    fn load_binds_enabled_api() {
        let (_dir, registry) = registry();
        registry.save(&api("user", "/user/")).unwrap();

        registry.load("user").unwrap();

        let handler = registry.resolve("/user/get").unwrap();
        assert_eq!(handler.api().name, "user");
        assert!(registry.get_by_name("user").is_some());
    }

    #[test]
    fn load_failure_leaves_state() {
        let (dir, registry) = registry();
        registry.save(&api("user", "/user/")).unwrap();
        registry.load("user").unwrap();

        std::fs::write(dir.path().join("user.json"), "{broken").unwrap();
        assert!(matches!(registry.load("user"), Err(StoreError::Parse { .. })));
        assert!(matches!(registry.load("ghost"), Err(StoreError::NotFound(_))));

        assert!(registry.resolve("/user/get").is_some());
        assert!(registry.get_by_name("ghost").is_none());
    }

    #[test]
    fn load_all_skips_broken_definitions() {
        let (dir, registry) = registry();
        registry.save(&api("user", "/user/")).unwrap();
        registry.save(&api("order", "/order/")).unwrap();
        std::fs::write(dir.path().join("broken.json"), "not json").unwrap();

        assert_eq!(registry.load_all(), 2);
        assert_eq!(
            registry.list_apis().iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            vec!["order", "user"]
        );
    }

    #[test]
    fn reload_all_unloads_vanished_definitions() {
        let (dir, registry) = registry();
        registry.save(&api("user", "/user/")).unwrap();
        registry.save(&api("order", "/order/")).unwrap();
        registry.load_all();

        std::fs::remove_file(dir.path().join("order.json")).unwrap();
        assert_eq!(registry.reload_all(), 1);

        assert!(registry.get_by_name("order").is_none());
        assert!(registry.resolve("/order/x").is_none());
        assert!(registry.resolve("/user/x").is_some());
    }

    #[test]
    fn disable_and_reload_unbinds() {
        let (_dir, registry) = registry();
        let mut def = api("user", "/user/");
        registry.save(&def).unwrap();
        registry.load("user").unwrap();
        assert!(registry.resolve("/user/x").is_some());

        def.enable = false;
        registry.save(&def).unwrap();
        registry.load("user").unwrap();

        assert!(registry.resolve("/user/x").is_none());
        assert!(registry.get_by_name("user").is_some_and(|a| !a.enable));
    }

    #[test]
    fn reload_with_new_path_drops_old_route() {
        let (_dir, registry) = registry();
        let mut def = api("user", "/user/");
        registry.save(&def).unwrap();
        registry.load("user").unwrap();

        def.path = "/v2/user/".into();
        registry.save(&def).unwrap();
        registry.load("user").unwrap();

        assert!(registry.resolve("/user/x").is_none());
        assert!(registry.resolve("/v2/user/x").is_some());
        assert_eq!(registry.snapshot().routes().len(), 1);
    }

    #[test]
    fn reload_builds_fresh_handler() {
        let (_dir, registry) = registry();
        let mut def = api("user", "/user/");
        registry.save(&def).unwrap();
        registry.load("user").unwrap();
        let before = registry.resolve("/user/x").unwrap();

        def.replace_callers(vec![CallerItem::new("1.1.1.1").with_pref(["h2"])])
            .unwrap();
        registry.save(&def).unwrap();
        registry.load("user").unwrap();
        let after = registry.resolve("/user/x").unwrap();

        // The in-flight snapshot is untouched.
        assert!(before.api().caller.is_empty());
        assert_eq!(after.api().caller.resolve("1.1.1.1").pref, vec!["h2"]);
    }

    #[test]
    fn delete_is_idempotent() {
        let (dir, registry) = registry();
        registry.save(&api("user", "/user/")).unwrap();
        registry.load("user").unwrap();

        assert!(registry.delete("user").unwrap());
        assert!(!registry.delete("user").unwrap());
        assert!(!registry.delete("never-existed").unwrap());

        assert!(registry.resolve("/user/x").is_none());
        assert!(registry.get_by_name("user").is_none());
        assert!(!dir.path().join("user.json").exists());
    }

    #[test]
    fn unload_keeps_file() {
        let (dir, registry) = registry();
        registry.save(&api("user", "/user/")).unwrap();
        registry.load("user").unwrap();

        assert!(registry.unload("user"));
        assert!(registry.resolve("/user/x").is_none());
        assert!(dir.path().join("user.json").exists());
    }

    #[test]
    fn save_rejects_invalid_without_writing() {
        let (dir, registry) = registry();
        let mut def = api("user", "/user/");
        def.replace_callers(vec![CallerItem::new("1.1.1.1").with_pref(["h1"])])
            .unwrap();
        registry.save(&def).unwrap();

        let mut bad = def.clone();
        bad.hosts = Default::default();
        assert!(matches!(registry.save(&bad), Err(RegistryError::Validation(_))));

        let stored = registry.store().read_definition("user").unwrap();
        assert_eq!(stored, def);
        assert!(dir.path().join("user.json").exists());
    }

    #[test]
    fn concurrent_readers_never_see_half_state() {
        let (_dir, registry) = registry();
        let mut def = api("user", "/user/");
        registry.save(&def).unwrap();
        registry.load("user").unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let snap = registry.snapshot();
                        if let Some(route) = snap.routes().resolve("/user/x") {
                            let entry = snap.api(route.api_name());
                            assert!(entry.is_some_and(|a| a.enable), "route without entry");
                        }
                        if snap.api("user").is_some_and(|a| a.enable) {
                            assert!(snap.resolve("/user/x").is_some(), "entry without route");
                        }
                    }
                })
            })
            .collect();

        for i in 0..200 {
            def.enable = i % 2 == 0;
            registry.save(&def).unwrap();
            registry.load("user").unwrap();
            if i % 50 == 0 {
                registry.delete("user").unwrap();
                registry.save(&def).unwrap();
                registry.load("user").unwrap();
            }
        }

        stop.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
