//! HTTP server for the Vehicle Record Ledger.
//!
//! Exposes the record store over a small JSON API. This is the only layer
//! that turns store errors into HTTP status codes.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::{is_valid_field_name, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use router::build_router;
pub use server::{open_store, VrlServer};
pub use state::AppState;
