//! Database connection management.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::migrations::run_migrations;

/// Database file name inside the cache directory.
const DB_FILE_NAME: &str = "meeplegraph.db";

/// Opens (or creates) the cache database and runs migrations.
///
/// - If `dir` is `Some`, uses `{dir}/meeplegraph.db`.
/// - Otherwise uses `~/.cache/meeplegraph/meeplegraph.db`.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrations fail.
pub fn open_db(dir: Option<&Path>) -> Result<Connection> {
    let db_path = resolve_db_path(dir)?;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    run_migrations(&conn).context("database migration failed")?;

    tracing::debug!(path = %db_path.display(), "response cache opened");
    Ok(conn)
}

/// Opens a private in-memory database with the cache schema applied.
///
/// # Errors
///
/// Returns an error if `SQLite` cannot allocate the database or migrations fail.
pub(crate) fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    run_migrations(&conn).context("database migration failed")?;
    Ok(conn)
}

/// Resolves the database file path.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined (when `dir` is `None`).
pub fn resolve_db_path(dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.join(DB_FILE_NAME));
    }

    let home = std::env::var("HOME").context("HOME environment variable is not set")?;
    Ok(PathBuf::from(home)
        .join(".cache")
        .join("meeplegraph")
        .join(DB_FILE_NAME))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_open_db_in_temp_dir() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();

        // Act
        let conn = open_db(Some(dir.path())).unwrap();

        // Assert
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert!(version > 0);
        assert!(dir.path().join("meeplegraph.db").exists());
    }

    #[test]
    fn test_open_db_creates_missing_directory() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        // Act
        open_db(Some(&nested)).unwrap();

        // Assert
        assert!(nested.join("meeplegraph.db").exists());
    }

    #[test]
    fn test_resolve_db_path_with_dir() {
        // Arrange
        let dir = PathBuf::from("/tmp/myproject");

        // Act
        let path = resolve_db_path(Some(&dir)).unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/tmp/myproject/meeplegraph.db"));
    }

    #[test]
    fn test_resolve_db_path_default() {
        // Arrange & Act
        let path = resolve_db_path(None).unwrap();

        // Assert
        assert!(path.ends_with(".cache/meeplegraph/meeplegraph.db"));
    }
}
