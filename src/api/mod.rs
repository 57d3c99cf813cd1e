//! API definitions subsystem.
//!
//! # Data Flow
//! ```text
//! <conf dir>/api_<port>/<name>.json
//!     → store.rs (read / write / remove / list)
//!     → definition.rs (Api: path, hosts, caller rules, timeout)
//!         → host.rs (ordered host set, upstream URL building)
//!         → caller.rs (per-IP pref / ignore rules)
//!     → registry (snapshot + route binding)
//! ```
//!
//! # Design Decisions
//! - Definitions are plain values; a loaded definition is never mutated,
//!   edits happen on a copy that is saved and reloaded
//! - Validation runs on save, not on load, so a hand-edited file still loads

pub mod caller;
pub mod definition;
pub mod host;
pub mod store;

pub use caller::{CallerItem, CallerRegistry};
pub use definition::Api;
pub use host::{Host, Hosts};
pub use store::{ApiStore, JsonFileStore};
