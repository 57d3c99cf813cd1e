//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → per server: definition dir → registry load → watcher → bind
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Reload every definition of every server
//! ```
//!
//! # Design Decisions
//! - Fail fast: a server that cannot bind aborts startup
//! - A broken definition never aborts startup; it is logged and skipped

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start_servers, Running, StartupError};
