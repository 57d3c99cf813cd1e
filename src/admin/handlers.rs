//! Admin API handlers.
//!
//! Every response uses the envelope `{code, msg, data}`; `code` 0 means success.
//! Mutations follow one path: edit a copy of the definition, validate, save
//! through the registry, then load it so the change goes live.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{Api, CallerItem, Host};
use crate::error::{RegistryError, StoreError, ValidationError};
use crate::registry::ApiRegistry;

pub const CODE_OK: i32 = 0;
pub const CODE_NOT_FOUND: i32 = 1;
pub const CODE_INVALID: i32 = 2;
pub const CODE_STORE: i32 = 3;
pub const CODE_UNAUTHORIZED: i32 = 4;

/// Response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonResult<T> {
    pub code: i32,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> JsonResult<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            code: CODE_OK,
            msg: "ok".to_string(),
            data: Some(data),
        })
    }
}

/// Failure of an admin request.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("api [{0}] not found")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(StoreError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("admin task failed: {0}")]
    Task(String),
}

impl From<StoreError> for AdminError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(name) => AdminError::NotFound(name),
            other => AdminError::Store(other),
        }
    }
}

impl From<RegistryError> for AdminError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Store(e) => e.into(),
            RegistryError::Validation(e) => e.into(),
        }
    }
}

impl AdminError {
    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            AdminError::NotFound(_) => (StatusCode::NOT_FOUND, CODE_NOT_FOUND),
            AdminError::Validation(_) => (StatusCode::BAD_REQUEST, CODE_INVALID),
            AdminError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, CODE_STORE),
            AdminError::Unauthorized => (StatusCode::UNAUTHORIZED, CODE_UNAUTHORIZED),
            AdminError::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, CODE_STORE),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Admin request failed");
        } else {
            tracing::debug!(error = %self, "Admin request rejected");
        }
        let body = JsonResult::<()> {
            code,
            msg: self.to_string(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

type AdminResult<T> = Result<Json<JsonResult<T>>, AdminError>;

/// Run registry writes, which touch the filesystem, off the async workers.
async fn blocking<T, F>(registry: &Arc<ApiRegistry>, f: F) -> Result<T, AdminError>
where
    F: FnOnce(&ApiRegistry) -> Result<T, AdminError> + Send + 'static,
    T: Send + 'static,
{
    let registry = Arc::clone(registry);
    tokio::task::spawn_blocking(move || f(&registry))
        .await
        .map_err(|e| AdminError::Task(e.to_string()))?
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub apis: usize,
    pub routes: usize,
}

/// One row of `GET /_apis`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiSummary {
    pub name: String,
    pub path: String,
    pub enable: bool,
    pub bound: bool,
    pub hosts: Vec<String>,
    pub callers: usize,
    pub timeout_ms: u64,
    pub note: String,
}

pub async fn get_status(State(registry): State<Arc<ApiRegistry>>) -> AdminResult<SystemStatus> {
    let snapshot = registry.snapshot();
    Ok(JsonResult::ok(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        apis: snapshot.len(),
        routes: snapshot.routes().len(),
    }))
}

pub async fn list_apis(State(registry): State<Arc<ApiRegistry>>) -> AdminResult<Vec<ApiSummary>> {
    let snapshot = registry.snapshot();
    let summaries = registry
        .list_apis()
        .into_iter()
        .map(|api| ApiSummary {
            bound: snapshot.routes().prefix_of(&api.name).is_some(),
            name: api.name.clone(),
            path: api.path.clone(),
            enable: api.enable,
            hosts: api.hosts.names(),
            callers: api.caller.len(),
            timeout_ms: api.timeout_ms,
            note: api.note.clone(),
        })
        .collect();
    Ok(JsonResult::ok(summaries))
}

pub async fn get_api(
    State(registry): State<Arc<ApiRegistry>>,
    Query(q): Query<NameQuery>,
) -> AdminResult<Api> {
    let api = registry
        .get_by_name(&q.name)
        .ok_or(AdminError::NotFound(q.name))?;
    Ok(JsonResult::ok(Api::clone(&api)))
}

/// Host row of a base save. A non-empty `orig_name` different from `name`
/// renames the host, carrying caller rules along.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostForm {
    pub name: String,
    pub orig_name: String,
    pub url: String,
    pub enable: bool,
    pub note: String,
}

/// Body of `POST /_api`. Empty `orig_name` creates a new API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseForm {
    pub name: String,
    pub orig_name: String,
    pub path: String,
    pub timeout_ms: Option<u64>,
    pub enable: bool,
    pub note: String,
    pub hosts: Vec<HostForm>,
}

impl Default for BaseForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            orig_name: String::new(),
            path: String::new(),
            timeout_ms: None,
            enable: true,
            note: String::new(),
            hosts: Vec::new(),
        }
    }
}

/// Build the definition a base save would persist, without touching anything.
pub fn apply_base_form(registry: &ApiRegistry, form: &BaseForm) -> Result<Api, AdminError> {
    let name = form.name.trim();
    let orig = form.orig_name.trim();

    let mut api = if orig.is_empty() {
        if registry.get_by_name(name).is_some() {
            return Err(ValidationError::ApiExists(name.to_string()).into());
        }
        registry.new_api(name)
    } else {
        let current = registry
            .get_by_name(orig)
            .ok_or_else(|| AdminError::NotFound(orig.to_string()))?;
        if orig != name && registry.get_by_name(name).is_some() {
            return Err(ValidationError::ApiExists(name.to_string()).into());
        }
        Api::clone(&current)
    };

    api.name = name.to_string();
    api.path = form.path.trim().to_string();
    api.path = api.bind_path();
    if let Some(timeout_ms) = form.timeout_ms {
        api.timeout_ms = timeout_ms;
    }
    api.enable = form.enable;
    api.note = form.note.clone();

    let keep: Vec<String> = form.hosts.iter().map(|h| h.name.trim().to_string()).collect();
    if let Some((i, dup)) = keep
        .iter()
        .enumerate()
        .find(|(i, name)| keep[..*i].contains(*name))
    {
        tracing::debug!(api = %name, host = %dup, row = i, "Duplicate host row");
        return Err(ValidationError::DuplicateHost(dup.clone()).into());
    }

    for host in &form.hosts {
        let orig_host = host.orig_name.trim();
        if !orig_host.is_empty() && orig_host != host.name {
            api.rename_host(orig_host, &host.name);
        }
    }
    for host in &form.hosts {
        let mut h = Host::new(host.name.trim(), host.url.trim(), host.enable);
        h.note = host.note.clone();
        api.add_host(h);
    }
    api.retain_hosts(&keep);

    let path = api.bind_path();
    if let Some(owner) = registry.snapshot().routes().owner_of(&path) {
        if owner != orig && owner != name {
            return Err(ValidationError::PathInUse {
                path,
                owner: owner.to_string(),
            }
            .into());
        }
    }

    api.validate()?;
    Ok(api)
}

pub async fn save_api(
    State(registry): State<Arc<ApiRegistry>>,
    Json(form): Json<BaseForm>,
) -> AdminResult<Api> {
    let api = apply_base_form(&registry, &form)?;
    let orig = form.orig_name.trim().to_string();

    let loaded = blocking(&registry, move |registry| {
        registry.save(&api)?;
        // The new name goes live before the old one is dropped.
        let loaded = registry.load(&api.name)?;
        if !orig.is_empty() && orig != api.name {
            registry.delete(&orig)?;
            tracing::info!(from = %orig, to = %api.name, "Api renamed");
        }
        Ok(loaded)
    })
    .await?;
    Ok(JsonResult::ok(Api::clone(&loaded)))
}

/// Body of `POST /_api/caller`: the full replacement rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerForm {
    pub name: String,
    #[serde(default)]
    pub caller: Vec<CallerItem>,
}

pub async fn save_caller(
    State(registry): State<Arc<ApiRegistry>>,
    Json(form): Json<CallerForm>,
) -> AdminResult<Vec<CallerItem>> {
    let current = registry
        .get_by_name(&form.name)
        .ok_or_else(|| AdminError::NotFound(form.name.clone()))?;

    let mut api = Api::clone(&current);
    api.replace_callers(form.caller)?;

    let loaded = blocking(&registry, move |registry| {
        registry.save(&api)?;
        Ok(registry.load(&api.name)?)
    })
    .await?;
    Ok(JsonResult::ok(loaded.caller.items().to_vec()))
}

pub async fn reload_api(
    State(registry): State<Arc<ApiRegistry>>,
    Query(q): Query<NameQuery>,
) -> AdminResult<Api> {
    let api = blocking(&registry, move |registry| Ok(registry.load(&q.name)?)).await?;
    Ok(JsonResult::ok(Api::clone(&api)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

pub async fn delete_api(
    State(registry): State<Arc<ApiRegistry>>,
    Query(q): Query<NameQuery>,
) -> AdminResult<Deleted> {
    let deleted = blocking(&registry, move |registry| Ok(registry.delete(&q.name)?)).await?;
    Ok(JsonResult::ok(Deleted { deleted }))
}

pub async fn not_found() -> Response {
    let body = JsonResult::<()> {
        code: CODE_NOT_FOUND,
        msg: "not found".to_string(),
        data: None,
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
