//! Per-invocation locations of the config file and the cache database.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::config::CacheConfig;

/// Config file name, both under `--dir` and the default directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Where one run reads its config and keeps its cache.
///
/// `--dir` relocates both: the config file is read from it and the cache
/// database is created in it, ahead of any `[cache].dir` in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    config_file: PathBuf,
    dir: Option<PathBuf>,
}

impl AppPaths {
    /// Resolves paths for an optional `--dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is `None` and `HOME` is not set.
    pub fn resolve(dir: Option<&Path>) -> Result<Self> {
        let config_file = match dir {
            Some(d) => d.join(CONFIG_FILE_NAME),
            None => {
                let home = std::env::var("HOME").context("HOME environment variable is not set")?;
                PathBuf::from(home)
                    .join(".config")
                    .join("meeplegraph")
                    .join(CONFIG_FILE_NAME)
            }
        };
        Ok(Self {
            config_file,
            dir: dir.map(Path::to_path_buf),
        })
    }

    /// Config file to load.
    #[must_use]
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Cache database directory: `--dir`, then `[cache].dir`.
    ///
    /// `None` leaves the choice to the cache (`~/.cache/meeplegraph`).
    #[must_use]
    pub fn cache_dir(&self, cache: &CacheConfig) -> Option<PathBuf> {
        self.dir.clone().or_else(|| cache.dir.clone())
    }
}
