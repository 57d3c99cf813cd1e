//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::{stream, StreamExt};
use tokio::net::TcpListener;

use fanout_proxy::api::{Api, ApiStore, Host, JsonFileStore};
use fanout_proxy::config::{ProxyConfig, ServerConfig};
use fanout_proxy::{ApiRegistry, ApiServer, Shutdown};

/// One request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What a mock backend answers.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(&'static str, String)>,
    pub delay: Duration,
    /// Streamed after the body once the given pause has passed.
    pub tail: Option<(Duration, String)>,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            headers: Vec::new(),
            delay: Duration::ZERO,
            tail: None,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn tail(mut self, pause: Duration, more: &str) -> Self {
        self.tail = Some((pause, more.to_string()));
        self
    }
}

#[derive(Clone)]
struct BackendState {
    reply: Reply,
    hits: Arc<Mutex<Vec<Recorded>>>,
}

/// Mock upstream that records every request and answers with a fixed reply.
#[derive(Clone)]
pub struct MockBackend {
    addr: SocketAddr,
    hits: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    pub async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new().fallback(record).with_state(BackendState {
            reply,
            hits: hits.clone(),
        });
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, hits }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL with a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn hits(&self) -> Vec<Recorded> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hit_count(&self) -> usize {
        self.hits.lock().unwrap().len()
    }
}

async fn record(State(state): State<BackendState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    state.hits.lock().unwrap().push(Recorded {
        method: parts.method,
        path_and_query: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default(),
        headers: parts.headers,
        body,
    });

    if !state.reply.delay.is_zero() {
        tokio::time::sleep(state.reply.delay).await;
    }

    let mut response = Response::builder()
        .status(StatusCode::from_u16(state.reply.status).unwrap());
    for (name, value) in &state.reply.headers {
        response = response.header(*name, value);
    }
    let head = Bytes::from(state.reply.body.clone());
    let body = match state.reply.tail.clone() {
        None => Body::from(head),
        Some((pause, more)) => {
            let first = stream::iter([Ok::<_, Infallible>(head)]);
            let rest = stream::once(async move {
                tokio::time::sleep(pause).await;
                Ok(Bytes::from(more))
            });
            Body::from_stream(first.chain(rest))
        }
    };
    response.body(body).unwrap().into_response()
}

/// URL of a port nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}

/// A proxy server on an ephemeral port with its own definition directory.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub registry: Arc<ApiRegistry>,
    pub store: Arc<JsonFileStore>,
    shutdown: Shutdown,
    _dir: tempfile::TempDir,
}

impl TestProxy {
    pub async fn start() -> Self {
        Self::start_with(ProxyConfig::default()).await
    }

    pub async fn start_with(config: ProxyConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()));
        let server_config = ServerConfig {
            port: 0,
            bind_host: "127.0.0.1".into(),
            name: "test".into(),
            ..Default::default()
        };
        let server = ApiServer::new(server_config, &config, store.clone());
        let registry = server.registry().clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        tokio::spawn(server.run(listener, shutdown.subscribe()));

        Self {
            addr,
            registry,
            store,
            shutdown,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Save and load `api`.
    pub fn install(&self, api: &Api) {
        self.registry.save(api).unwrap();
        self.registry.load(&api.name).unwrap();
    }

    /// Write `api` without validation and load it.
    pub fn install_unchecked(&self, api: &Api) {
        self.store.write_definition(api).unwrap();
        self.registry.load(&api.name).unwrap();
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Client that never goes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// API bound at `/<name>/` over `hosts` given as (name, url).
pub fn api(name: &str, hosts: &[(&str, String)]) -> Api {
    let mut api = Api::new(name);
    for (host, url) in hosts {
        api.add_host(Host::new(*host, url.clone(), true));
    }
    api
}
