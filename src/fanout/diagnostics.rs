//! Per-request fanout diagnostics.
//!
//! Every proxied request produces exactly one [`RequestReport`], holding one
//! [`HostReport`] per host of the API (master, shadows and ignored hosts alike).

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::UpstreamError;
use crate::observability::logging::ACCESS_TARGET;

fn as_millis<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&(d.as_micros() as f64 / 1000.0)),
        None => serializer.serialize_none(),
    }
}

/// Outcome of one host's unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub name: String,
    pub master: bool,
    pub ignored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis", skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl HostReport {
    pub fn new(name: impl Into<String>, master: bool) -> Self {
        Self {
            name: name.into(),
            master,
            ignored: false,
            url: None,
            status: None,
            elapsed: None,
            error: None,
            error_kind: None,
        }
    }

    pub fn ignored(name: impl Into<String>, master: bool) -> Self {
        Self {
            ignored: true,
            ..Self::new(name, master)
        }
    }

    pub fn record_error(&mut self, err: &UpstreamError) {
        self.error = Some(err.to_string());
        self.error_kind = Some(err.kind().as_str());
    }

    /// Label used in metrics: `ok`, `ignored` or the error kind.
    pub fn outcome(&self) -> &'static str {
        if self.ignored {
            "ignored"
        } else {
            self.error_kind.unwrap_or("ok")
        }
    }
}

/// Aggregated record of one proxied request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestReport {
    pub request_id: String,
    pub api: String,
    pub client: String,
    pub method: String,
    pub uri: String,
    pub master: Option<String>,
    pub status: u16,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Option<Duration>,
    pub hosts: Vec<HostReport>,
}

impl RequestReport {
    pub fn host(&self, name: &str) -> Option<&HostReport> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// Log the record as one structured event.
    pub fn emit(&self) {
        let hosts = serde_json::to_string(&self.hosts).unwrap_or_default();
        let elapsed_ms = self.elapsed.map(|d| d.as_micros() as f64 / 1000.0).unwrap_or_default();
        tracing::info!(
            target: ACCESS_TARGET,
            request_id = %self.request_id,
            api = %self.api,
            client = %self.client,
            method = %self.method,
            uri = %self.uri,
            master = self.master.as_deref().unwrap_or("-"),
            status = self.status,
            elapsed_ms,
            hosts = %hosts,
            "Request completed"
        );
    }
}
