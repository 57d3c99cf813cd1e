//! Fanout reverse proxy.
//!
//! Every request bound to an API is sent to all of the API's hosts at once;
//! the response of one host, the master chosen per caller, is relayed back
//! while the others run as shadows whose responses are discarded.

// Core subsystems
pub mod api;
pub mod fanout;
pub mod http;
pub mod registry;
pub mod routing;

// Surrounding surfaces
pub mod admin;
pub mod config;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use api::{Api, CallerItem, Host};
pub use config::schema::ProxyConfig;
pub use http::ApiServer;
pub use lifecycle::Shutdown;
pub use registry::ApiRegistry;
