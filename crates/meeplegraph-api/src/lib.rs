//! BoardGameGeek API client library for meeplegraph.
//!
//! Provides a rate-limited, cache-aware client for the XML API2 and a
//! parser for the historical rank snapshots published as CSV.

/// BoardGameGeek XML API2 client.
pub mod bgg;

/// Historical rank snapshot (CSV).
pub mod snapshot;
