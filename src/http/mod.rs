//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, Server header)
//!     → registry lookup by path prefix
//!         hit  → fanout engine (request.rs headers, response.rs relay / 502)
//!         miss → admin API
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_FORWARDED_FOR, X_REQUEST_ID};
pub use response::{API_URL, SERVER_NAME};
pub use server::ApiServer;
