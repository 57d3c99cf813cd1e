//! Bearer-key guard for the admin API.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::admin::handlers::AdminError;

/// Reject requests whose `Authorization` header does not carry `Bearer <key>`.
/// An empty key leaves the API open.
pub async fn require_api_key(
    State(key): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Result<Response, AdminError> {
    if key.is_empty() || bearer_matches(&request, &key) {
        return Ok(next.run(request).await);
    }
    tracing::warn!(path = %request.uri().path(), "Admin request without valid key");
    Err(AdminError::Unauthorized)
}

fn bearer_matches(request: &Request, key: &str) -> bool {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == key)
}
