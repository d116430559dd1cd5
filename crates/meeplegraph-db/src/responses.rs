//! HTTP response cache keyed by request signature.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension};

use super::connection::{open_db, open_in_memory};

/// A cached response row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// HTTP status code of the stored response.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
    /// Unix timestamp (seconds) when the response was stored.
    pub fetched_at: i64,
}

/// Persistent response cache with a time-to-live.
///
/// The connection sits behind a mutex so one handle can be shared
/// (`Arc<ResponseCache>`) between several clients.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ResponseCache {
    conn: Mutex<Connection>,
    ttl: Duration,
}

impl ResponseCache {
    /// Opens the on-disk cache in `dir` (see [`open_db`] for the default location).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(dir: Option<&Path>, ttl: Duration) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_db(dir)?),
            ttl,
        })
    }

    /// Creates a cache that lives only as long as this handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn in_memory(ttl: Duration) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_in_memory()?),
            ttl,
        })
    }

    /// Configured time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` if a non-expired response is stored for `signature`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn contains(&self, signature: &str) -> Result<bool> {
        Ok(self.get(signature)?.is_some())
    }

    /// Loads the non-expired response stored for `signature`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get(&self, signature: &str) -> Result<Option<CachedResponse>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT status, body, fetched_at FROM http_responses WHERE signature = ?1",
                [signature],
                |row| {
                    Ok(CachedResponse {
                        status: row.get(0)?,
                        body: row.get(1)?,
                        fetched_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("failed to query http_responses")?;

        Ok(row.filter(|r| self.is_fresh(r.fetched_at, now_unix())))
    }

    /// Stores (or replaces) the response for `signature`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub fn store(&self, signature: &str, status: u16, body: &[u8]) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO http_responses (signature, status, body, fetched_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(signature) DO UPDATE SET
                status = excluded.status,
                body = excluded.body,
                fetched_at = excluded.fetched_at",
            rusqlite::params![signature, status, body, now_unix()],
        )
        .with_context(|| format!("failed to store response for {signature}"))?;
        Ok(())
    }

    /// Deletes every expired entry and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub fn purge_expired(&self) -> Result<usize> {
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let cutoff = now_unix().saturating_sub(ttl_secs);
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM http_responses WHERE fetched_at <= ?1", [cutoff])
            .context("failed to purge expired responses")?;
        tracing::debug!(removed, "expired responses purged");
        Ok(removed)
    }

    /// Number of stored rows, expired ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: usize = conn
            .query_row("SELECT COUNT(*) FROM http_responses", [], |row| row.get(0))
            .context("failed to count http_responses")?;
        Ok(count)
    }

    /// Returns `true` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn is_fresh(&self, fetched_at: i64, now: i64) -> bool {
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        now.saturating_sub(fetched_at) < ttl_secs
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("response cache lock poisoned"))
    }
}

/// Current Unix time in seconds.
fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const WEEK: Duration = Duration::from_secs(604_800);

    #[test]
    fn test_store_and_get() {
        // Arrange
        let cache = ResponseCache::in_memory(WEEK).unwrap();

        // Act
        cache
            .store("GET https://example.test/thing?id=1", 200, b"<items/>")
            .unwrap();
        let row = cache.get("GET https://example.test/thing?id=1").unwrap();

        // Assert
        let row = row.unwrap();
        assert_eq!(row.status, 200);
        assert_eq!(row.body, b"<items/>");
        assert!(cache.contains("GET https://example.test/thing?id=1").unwrap());
    }

    #[test]
    fn test_missing_signature() {
        // Arrange
        let cache = ResponseCache::in_memory(WEEK).unwrap();

        // Act & Assert
        assert!(cache.get("GET nope").unwrap().is_none());
        assert!(!cache.contains("GET nope").unwrap());
    }

    #[test]
    fn test_store_replaces_existing_row() {
        // Arrange
        let cache = ResponseCache::in_memory(WEEK).unwrap();
        cache.store("sig", 200, b"old").unwrap();

        // Act
        cache.store("sig", 200, b"new").unwrap();

        // Assert
        assert_eq!(cache.get("sig").unwrap().unwrap().body, b"new");
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        // Arrange
        let cache = ResponseCache::in_memory(Duration::ZERO).unwrap();
        cache.store("sig", 200, b"body").unwrap();

        // Act & Assert
        assert!(!cache.contains("sig").unwrap());
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_purge_expired_removes_stale_rows() {
        // Arrange
        let cache = ResponseCache::in_memory(Duration::ZERO).unwrap();
        cache.store("a", 200, b"1").unwrap();
        cache.store("b", 200, b"2").unwrap();

        // Act
        let removed = cache.purge_expired().unwrap();

        // Assert
        assert_eq!(removed, 2);
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_purge_keeps_fresh_rows() {
        // Arrange
        let cache = ResponseCache::in_memory(WEEK).unwrap();
        cache.store("a", 200, b"1").unwrap();

        // Act
        let removed = cache.purge_expired().unwrap();

        // Assert
        assert_eq!(removed, 0);
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_on_disk_cache_survives_reopen() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = ResponseCache::open(Some(dir.path()), WEEK).unwrap();
            cache.store("sig", 200, b"persisted").unwrap();
        }

        // Act
        let reopened = ResponseCache::open(Some(dir.path()), WEEK).unwrap();

        // Assert
        assert_eq!(reopened.get("sig").unwrap().unwrap().body, b"persisted");
    }
}
