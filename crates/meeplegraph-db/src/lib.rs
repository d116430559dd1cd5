//! Database module for caching API responses.
//!
//! Uses `rusqlite` (bundled `SQLite`) to persist raw HTTP responses
//! keyed by request signature, so repeated lookups against the
//! BoardGameGeek API can be served without touching the network.

mod connection;
mod migrations;
/// Response cache operations.
pub mod responses;

#[allow(clippy::module_name_repetitions)]
pub use connection::{open_db, resolve_db_path};
#[allow(clippy::module_name_repetitions)]
pub use responses::{CachedResponse, ResponseCache};
