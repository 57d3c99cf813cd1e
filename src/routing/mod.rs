//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (longest-prefix lookup)
//!     → matcher.rs (prefix test, relative path)
//!     → Return: bound handler or NoMatch (falls through to admin)
//!
//! Route Updates (registry load/delete):
//!     current table
//!     → clone, bind/unbind
//!     → publish with the registry snapshot
//! ```
//!
//! # Design Decisions
//! - Tables are immutable once published
//! - No regex in hot path (prefix matching only)
//! - Deterministic: most specific prefix wins

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{Route, RoutingTable};
