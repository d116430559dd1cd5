//! Application configuration module.
//!
//! Reads the TOML config file holding client tunables (`[client]`)
//! and the response cache settings (`[cache]`). `AppPaths` locates the
//! config file and the cache directory.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::AppConfig;
pub use paths::AppPaths;
