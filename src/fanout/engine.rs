//! The fanout proxy engine.
//!
//! # Flow
//! ```text
//! inbound request
//!     → strip bind prefix, drop Connection, buffer body once
//!     → caller = api.caller.resolve(source ip)
//!     → master = api.select_master(caller)
//!     → one task per host:
//!         ignored → report only
//!         master  → send, relay status/headers/body (or 502)
//!         shadow  → send, drain, discard
//!     → join all tasks
//!     → one RequestReport, master response to the client
//! ```
//!
//! The client waits for every host, so its latency is that of the slowest
//! participating host even though only the master's bytes are returned.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::future::join_all;

use crate::api::{Api, Host};
use crate::error::UpstreamError;
use crate::fanout::diagnostics::{HostReport, RequestReport};
use crate::fanout::upstream::{OutboundRequest, UpstreamClient};
use crate::http::{request::request_id, response};
use crate::observability::metrics;
use crate::routing::PathPrefixMatcher;

/// Whether a host's response is relayed or discarded for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Shadow,
}

impl Role {
    pub fn is_master(self) -> bool {
        self == Role::Master
    }
}

/// Result of one host's unit of work.
struct HostOutcome {
    report: HostReport,
    /// Only ever set for the master.
    response: Option<Response>,
}

/// Request handler bound to one API snapshot.
///
/// Built fresh every time an API is (re)loaded; it never observes later edits.
#[derive(Debug, Clone)]
pub struct FanoutHandler {
    api: Arc<Api>,
    prefix: PathPrefixMatcher,
    client: UpstreamClient,
}

impl FanoutHandler {
    pub fn new(api: Arc<Api>, client: UpstreamClient) -> Self {
        let prefix = PathPrefixMatcher::new(api.bind_path());
        Self {
            api,
            prefix,
            client,
        }
    }

    pub fn api(&self) -> &Arc<Api> {
        &self.api
    }

    pub fn bind_path(&self) -> &str {
        self.prefix.prefix()
    }

    /// Proxy `request` and return the master's response.
    pub async fn serve(&self, request: Request<Body>, client_addr: SocketAddr) -> Response {
        let (response, report) = self.fanout(request, client_addr).await;
        report.emit();
        response
    }

    /// Proxy `request`, returning the master's response together with the
    /// per-request diagnostics.
    pub async fn fanout(
        &self,
        request: Request<Body>,
        client_addr: SocketAddr,
    ) -> (Response, RequestReport) {
        let start = Instant::now();
        let request_id = request_id(request.headers());
        let (mut parts, body) = request.into_parts();

        let method = parts.method.to_string();
        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let stripped = self
            .prefix
            .strip(parts.uri.path())
            .unwrap_or(parts.uri.path());
        // Always rooted, so a base URL without a trailing '/' still joins cleanly.
        let rel_path = if stripped.starts_with('/') {
            stripped.to_string()
        } else {
            format!("/{stripped}")
        };
        let query = parts.uri.query().map(str::to_string);
        parts.headers.remove(header::CONNECTION);

        let client_ip = client_addr.ip().to_canonical();
        let caller = self.api.caller.resolve(&client_ip.to_string());
        let master = self.api.select_master(&caller).map(str::to_string);

        let mut report = RequestReport {
            request_id,
            api: self.api.name.clone(),
            client: client_addr.to_string(),
            method,
            uri,
            master: master.clone(),
            status: 0,
            elapsed: None,
            hosts: Vec::with_capacity(self.api.hosts.len()),
        };

        let body = match axum::body::to_bytes(body, self.client.max_body_bytes()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(api = %self.api.name, error = %e, "Failed to buffer request body");
                let response = (StatusCode::BAD_REQUEST, format!("failed to read request body: {}", e))
                    .into_response();
                report.status = response.status().as_u16();
                report.elapsed = Some(start.elapsed());
                return (response, report);
            }
        };

        let outbound = Arc::new(OutboundRequest {
            method: parts.method,
            headers: parts.headers,
            body,
            rel_path,
            query,
            client_ip,
        });

        let timeout = self.api.timeout();
        let tasks = self.api.hosts.iter().map(|host| {
            let role = if master.as_deref() == Some(host.name.as_str()) {
                Role::Master
            } else {
                Role::Shadow
            };
            let ignored = caller.is_ignored(&host.name);
            let host = host.clone();
            let client = self.client.clone();
            let outbound = Arc::clone(&outbound);
            tokio::spawn(async move { call_host(client, host, role, ignored, outbound, timeout).await })
        });
        let joined = join_all(tasks).await;

        let mut relayed = None;
        for (host, result) in self.api.hosts.iter().zip(joined) {
            let is_master = master.as_deref() == Some(host.name.as_str());
            let outcome = result.unwrap_or_else(|e| {
                let err = UpstreamError::Aborted(e.to_string());
                let url = host.upstream_url(&outbound.rel_path, outbound.query.as_deref());
                tracing::error!(api = %self.api.name, host = %host.name, error = %err, "Upstream task failed");
                let mut report = HostReport::new(&host.name, is_master);
                report.record_error(&err);
                report.url = Some(url.clone());
                HostOutcome {
                    report,
                    response: is_master.then(|| response::gateway_error(&url, &err)),
                }
            });
            metrics::record_upstream(&self.api.name, &outcome.report);
            if outcome.response.is_some() {
                relayed = outcome.response;
            }
            report.hosts.push(outcome.report);
        }

        let response = relayed.unwrap_or_else(|| {
            tracing::warn!(
                api = %self.api.name,
                hosts = self.api.hosts.len(),
                "No master response, replying with an empty body"
            );
            response::empty()
        });

        report.status = response.status().as_u16();
        report.elapsed = Some(start.elapsed());
        metrics::record_request(&self.api.name, &report.method, report.status, start);
        (response, report)
    }
}

async fn call_host(
    client: UpstreamClient,
    host: Host,
    role: Role,
    ignored: bool,
    outbound: Arc<OutboundRequest>,
    timeout: Duration,
) -> HostOutcome {
    if ignored {
        return HostOutcome {
            report: HostReport::ignored(&host.name, role.is_master()),
            response: None,
        };
    }

    let start = Instant::now();
    let deadline_start = tokio::time::Instant::now();
    let mut report = HostReport::new(&host.name, role.is_master());
    let url = host.upstream_url(&outbound.rel_path, outbound.query.as_deref());
    report.url = Some(url.clone());

    let result = match outbound.to_request(&url) {
        Ok(request) => match role {
            Role::Master => client.send(request, timeout).await.map(|upstream| {
                report.status = Some(upstream.status().as_u16());
                Some(response::relay(upstream, &url, deadline_start, timeout))
            }),
            Role::Shadow => client.send_and_drain(request, timeout).await.map(|(status, _)| {
                report.status = Some(status.as_u16());
                None
            }),
        },
        Err(e) => Err(e),
    };
    report.elapsed = Some(start.elapsed());

    match result {
        Ok(response) => HostOutcome { report, response },
        Err(err) => {
            tracing::warn!(host = %host.name, url = %url, master = role.is_master(), error = %err, "Upstream call failed");
            report.record_error(&err);
            HostOutcome {
                report,
                response: role.is_master().then(|| response::gateway_error(&url, &err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CallerItem;
    use crate::config::UpstreamConfig;

    fn handler(api: Api) -> FanoutHandler {
        FanoutHandler::new(Arc::new(api), UpstreamClient::new(&UpstreamConfig::default()))
    }

    fn client_addr() -> SocketAddr {
        "10.0.0.1:5000".parse().unwrap()
    }

    #[tokio::test]
    async fn zero_hosts_writes_nothing() {
        let fanout = handler(Api::new("empty"));
        let req = Request::builder().uri("/empty/x").body(Body::empty()).unwrap();

        let (response, report) = fanout.fanout(req, client_addr()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        assert!(report.master.is_none());
        assert!(report.hosts.is_empty());
    }

    #[tokio::test]
    async fn ignored_hosts_take_no_network_action() {
        let mut api = Api::new("user");
        // Nothing listens on these; an attempted call would be reported as an error.
        api.add_host(Host::new("h1", "http://127.0.0.1:9/", true));
        api.add_host(Host::new("h2", "http://127.0.0.1:9/", true));
        api.replace_callers(vec![CallerItem::new("10.0.0.1").with_ignore(["h1", "h2"])])
            .unwrap();
        let fanout = handler(api);
        let req = Request::builder().uri("/user/x").body(Body::empty()).unwrap();

        let (response, report) = fanout.fanout(req, client_addr()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(report.master.as_deref(), Some("h1"));
        assert!(report.hosts.iter().all(|h| h.ignored && h.error.is_none() && h.url.is_none()));
    }

    #[tokio::test]
    async fn invalid_url_on_master_is_a_gateway_error() {
        let mut api = Api::new("user");
        api.add_host(Host::new("h1", "not-a-url", true));
        let fanout = handler(api);
        let req = Request::builder().uri("/user/x").body(Body::empty()).unwrap();

        let (response, report) = fanout.fanout(req, client_addr()).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let host = report.host("h1").unwrap();
        assert!(host.master);
        assert_eq!(host.error_kind, Some("invalid_url"));
    }
}
