//! Fanout proxy subsystem.
//!
//! # Data Flow
//! ```text
//! FanoutHandler (bound API snapshot)
//!     → engine.rs (master selection, one task per host, join all)
//!     → upstream.rs (rebuilt request, deadline, pooled client)
//!     → diagnostics.rs (per-host + per-request records)
//! ```
//!
//! # Design Decisions
//! - Master/shadow roles are fixed before any call is made
//! - Only the master task produces a response; no locking on the writer
//! - One host failing never cancels the others

pub mod diagnostics;
pub mod engine;
pub mod upstream;

pub use diagnostics::{HostReport, RequestReport};
pub use engine::{FanoutHandler, Role};
pub use upstream::{OutboundRequest, UpstreamClient};
