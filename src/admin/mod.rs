//! Administrative JSON API.
//!
//! Served on every routing miss of a proxy server, so its paths live under a
//! `/_` namespace that bound APIs are unlikely to claim.
//!
//! ```text
//! GET    /_status            version, api and route counts
//! GET    /_apis              summaries
//! GET    /_api?name=         full definition
//! POST   /_api               base save (create, edit, rename)
//! POST   /_api/caller        replace caller rules
//! POST   /_api/reload?name=  reload from the store
//! DELETE /_api?name=         delete
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::config::AdminConfig;
use crate::registry::ApiRegistry;

use self::auth::require_api_key;
use self::handlers::*;

pub fn setup_admin_router(registry: Arc<ApiRegistry>, config: &AdminConfig) -> Router {
    if !config.enabled {
        return Router::new().fallback(not_found);
    }

    let key: Arc<str> = Arc::from(config.api_key.as_str());
    Router::new()
        .route("/_status", get(get_status))
        .route("/_apis", get(list_apis))
        .route("/_api", get(get_api).post(save_api).delete(delete_api))
        .route("/_api/caller", post(save_caller))
        .route("/_api/reload", post(reload_api))
        .route_layer(middleware::from_fn_with_state(key, require_api_key))
        .fallback(not_found)
        .with_state(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::JsonFileStore;
    use crate::config::UpstreamConfig;
    use crate::fanout::UpstreamClient;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router(api_key: &str, enabled: bool) -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()));
        let registry = Arc::new(ApiRegistry::new(
            store,
            UpstreamClient::new(&UpstreamConfig::default()),
        ));
        let config = AdminConfig {
            enabled,
            api_key: api_key.to_string(),
        };
        (dir, setup_admin_router(registry, &config))
    }

    async fn status_of(router: Router, request: Request<Body>) -> StatusCode {
        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn open_when_key_is_empty() {
        let (_dir, router) = router("", true);
        let req = Request::get("/_status").body(Body::empty()).unwrap();
        assert_eq!(status_of(router, req).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn key_is_enforced() {
        let (_dir, router) = router("s3cret", true);

        let req = Request::get("/_apis").body(Body::empty()).unwrap();
        assert_eq!(status_of(router.clone(), req).await, StatusCode::UNAUTHORIZED);

        let req = Request::get("/_apis")
            .header("authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(router.clone(), req).await, StatusCode::UNAUTHORIZED);

        let req = Request::get("/_apis")
            .header("authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(router, req).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_paths_are_json_404() {
        let (_dir, router) = router("s3cret", true);
        let req = Request::get("/nothing/here").body(Body::empty()).unwrap();
        assert_eq!(status_of(router, req).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn disabled_admin_serves_nothing() {
        let (_dir, router) = router("", false);
        let req = Request::get("/_status").body(Body::empty()).unwrap();
        assert_eq!(status_of(router, req).await, StatusCode::NOT_FOUND);
    }
}
