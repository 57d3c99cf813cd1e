//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! server.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → one ApiServer per enabled [[server]]
//!
//! Per server, definition directory api_<port>/:
//!     watcher.rs detects <name>.json change
//!     → ApiRegistry::load / unload
//!     → atomic swap of the registry snapshot
//! ```
//!
//! # Design Decisions
//! - Process config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, ObservabilityConfig, ProxyConfig, ReloadConfig, ServerConfig, UpstreamConfig,
};
pub use watcher::{DefinitionEvent, DefinitionWatcher};
