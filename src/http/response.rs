//! Responses written back to the client.
//!
//! # Design Decisions
//! - The master's body is streamed, never buffered, and cut off at the
//!   call's deadline
//! - `api-url` names the upstream URL actually used
//! - An unreachable master yields 502 with the URL and raw error text

use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{stream, StreamExt};
use hyper::body::Incoming;
use tokio::time::Instant;

use crate::error::UpstreamError;

pub const API_URL: HeaderName = HeaderName::from_static("api-url");

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = "fanout-proxy";

/// The master's response, relayed verbatim plus `api-url`.
///
/// The body keeps streaming only until `started + timeout`.
pub fn relay(
    upstream: axum::http::Response<Incoming>,
    url: &str,
    started: Instant,
    timeout: Duration,
) -> Response {
    let (mut parts, body) = upstream.into_parts();
    if let Ok(value) = HeaderValue::from_str(url) {
        parts.headers.insert(API_URL, value);
    }
    let body = with_deadline(Body::new(body), url, started + timeout, timeout);
    Response::from_parts(parts, body)
}

/// Stream `body`, failing with a timeout once `deadline` passes.
pub(crate) fn with_deadline(body: Body, url: &str, deadline: Instant, timeout: Duration) -> Body {
    let state = Some((body.into_data_stream(), url.to_string()));
    let chunks = stream::unfold(state, move |state| async move {
        let (mut data, url) = state?;
        match tokio::time::timeout_at(deadline, data.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some((data, url)))),
            Ok(None) => None,
            Err(_) => {
                tracing::warn!(url = %url, ?timeout, "Master body cut off at deadline");
                Some((Err(axum::Error::new(UpstreamError::Timeout(timeout))), None))
            }
        }
    });
    Body::from_stream(chunks)
}

/// 502 for a failed master call.
pub fn gateway_error(url: &str, err: &UpstreamError) -> Response {
    let mut response = (
        StatusCode::BAD_GATEWAY,
        format!("upstream error: {}: {}", url, err),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(url) {
        response.headers_mut().insert(API_URL, value);
    }
    response
}

/// Reply used when no master produced a response.
pub fn empty() -> Response {
    StatusCode::OK.into_response()
}
