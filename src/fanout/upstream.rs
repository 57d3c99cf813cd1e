//! Upstream HTTP calls.
//!
//! # Responsibilities
//! - Hold the shared connection-pooling client
//! - Rebuild the buffered inbound request for one upstream URL
//! - Enforce the per-call deadline
//!
//! # Design Decisions
//! - The inbound body is buffered once and cloned per host (`Bytes` is refcounted)
//! - Timeouts surface as `UpstreamError::Timeout`, same path as transport errors

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;
use crate::http::request::X_FORWARDED_FOR;

/// Pooled client used for every upstream call of a server.
#[derive(Clone)]
pub struct UpstreamClient {
    inner: Client<HttpConnector, Body>,
    max_body_bytes: usize,
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
        connector.set_nodelay(true);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.idle_secs))
            .build(connector);

        Self {
            inner,
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Largest inbound body that will be buffered for fanout.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Send `request` and return once the response head arrives.
    pub async fn send(
        &self,
        request: Request<Body>,
        timeout: Duration,
    ) -> Result<Response<Incoming>, UpstreamError> {
        match tokio::time::timeout(timeout, self.inner.request(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(UpstreamError::Transport(e)),
            Err(_) => Err(UpstreamError::Timeout(timeout)),
        }
    }

    /// Send `request` and read the whole response body, all within `timeout`.
    /// Returns the status and the number of body bytes read.
    pub async fn send_and_drain(
        &self,
        request: Request<Body>,
        timeout: Duration,
    ) -> Result<(StatusCode, usize), UpstreamError> {
        let call = async {
            let response = self.inner.request(request).await?;
            let status = response.status();
            let body = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX).await?;
            Ok::<_, UpstreamError>((status, body.len()))
        };
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(timeout)),
        }
    }
}

/// The inbound request, buffered and stripped, ready to be replayed to every host.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Path after the API's bind prefix.
    pub rel_path: String,
    pub query: Option<String>,
    pub client_ip: IpAddr,
}

impl OutboundRequest {
    /// Copy of the request addressed to `url`.
    pub fn to_request(&self, url: &str) -> Result<Request<Body>, UpstreamError> {
        let invalid = |reason: String| UpstreamError::InvalidUrl {
            url: url.to_string(),
            reason,
        };
        let uri: Uri = url.parse().map_err(|e: axum::http::uri::InvalidUri| invalid(e.to_string()))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(invalid("url is not absolute".to_string()));
        }

        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .body(Body::from(self.body.clone()))
            .map_err(|e| invalid(e.to_string()))?;

        let headers = request.headers_mut();
        *headers = self.headers.clone();
        headers.remove(header::CONNECTION);
        headers.remove(header::HOST);
        if let Ok(value) = HeaderValue::from_str(&self.client_ip.to_string()) {
            headers.insert(X_FORWARDED_FOR, value);
        }
        Ok(request)
    }
}
