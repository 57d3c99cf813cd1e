//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router for one configured port
//! - Wire up middleware (request ID, tracing, `Server` header)
//! - Dispatch requests by path prefix to the bound fanout handler
//! - Fall through to the admin API on a routing miss
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::api::ApiStore;
use crate::config::{ProxyConfig, ServerConfig};
use crate::fanout::UpstreamClient;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::SERVER_NAME;
use crate::registry::ApiRegistry;

/// Application state injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ApiRegistry>,
    pub admin: Router,
}

/// One listening proxy server and its API registry.
pub struct ApiServer {
    config: ServerConfig,
    registry: Arc<ApiRegistry>,
    router: Router,
}

impl ApiServer {
    /// Create a server whose definitions live in `store`. Nothing is loaded yet.
    pub fn new(config: ServerConfig, proxy: &ProxyConfig, store: Arc<dyn ApiStore>) -> Self {
        let client = UpstreamClient::new(&proxy.upstream);
        let registry = Arc::new(ApiRegistry::new(store, client));

        let admin = setup_admin_router(registry.clone(), &proxy.admin);
        let router = Self::build_router(AppState {
            registry: registry.clone(),
            admin,
        });

        Self {
            config,
            registry,
            router,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(SetResponseHeaderLayer::overriding(
                header::SERVER,
                HeaderValue::from_static(SERVER_NAME),
            ))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    pub fn registry(&self) -> &Arc<ApiRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The complete service, for embedding or tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            server = %self.config.name,
            apis = self.registry.snapshot().len(),
            "API server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(address = %addr, "API server stopped");
        Ok(())
    }
}

/// Route by path prefix; unmatched requests go to the admin API.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    match state.registry.resolve(request.uri().path()) {
        Some(handler) => handler.serve(request, addr).await,
        None => {
            tracing::trace!(path = %request.uri().path(), "No route matched, falling through to admin");
            state
                .admin
                .oneshot(request)
                .await
                .unwrap_or_else(|never| match never {})
        }
    }
}
