//! API registry subsystem.
//!
//! # State Machine (per API)
//! ```text
//! Unloaded ──load──▶ Loaded(disabled)
//!          ──load──▶ Loaded(enabled, bound)
//! Loaded(enabled, bound) ──load──▶ Loaded(enabled, rebound)
//! Loaded(*) ──delete / unload──▶ gone (entry and route removed)
//! ```
//!
//! Every transition is one atomic snapshot swap.

pub mod api_registry;

pub use api_registry::{ApiRegistry, Handler, Snapshot};
