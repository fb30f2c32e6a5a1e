//! Named cache and entry operations.
//!
//! Mirrors the surface a browser exposes for its cache storage: open a named
//! cache, enumerate or delete caches, and put/match/delete entries within one.

use super::connection::CacheDb;
use super::entry::StoredEntry;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

const ENTRY_COLUMNS: &str = "hash, method, url, endpoint, body, stored_at";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredEntry> {
    Ok(StoredEntry {
        hash: row.get(0)?,
        method: row.get(1)?,
        url: row.get(2)?,
        endpoint: row.get(3)?,
        body: row.get(4)?,
        stored_at: row.get(5)?,
    })
}

impl CacheDb {
    /// Create the named cache if it does not already exist.
    pub async fn open_cache(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every cache in the database, oldest first.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at, name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a cache and all of its entries.
    ///
    /// Returns false if no cache had that name.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entry, creating the cache if needed.
    pub async fn put_entry(&self, cache: &str, entry: &StoredEntry) -> Result<(), Error> {
        let cache = cache.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![cache, chrono::Utc::now().to_rfc3339()],
                )?;
                tx.execute(
                    "INSERT INTO entries (cache_name, hash, method, url, endpoint, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(cache_name, hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        endpoint = excluded.endpoint,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        cache,
                        entry.hash,
                        entry.method,
                        entry.url,
                        entry.endpoint,
                        entry.body,
                        entry.stored_at
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by key. Returns None if the cache or key is absent.
    pub async fn match_entry(&self, cache: &str, hash: &str) -> Result<Option<StoredEntry>, Error> {
        let cache = cache.to_string();
        let hash = hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE cache_name = ?1 AND hash = ?2");
                match conn.query_row(&sql, params![cache, hash], entry_from_row) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// All entries of a cache, in insertion order.
    pub async fn entries(&self, cache: &str) -> Result<Vec<StoredEntry>, Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<StoredEntry>, Error> {
                let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE cache_name = ?1 ORDER BY rowid");
                let mut stmt = conn.prepare(&sql)?;
                let entries = stmt
                    .query_map(params![cache], entry_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry whose request path equals `endpoint` exactly.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_endpoint(&self, cache: &str, endpoint: &str) -> Result<u64, Error> {
        let cache = cache.to_string();
        let endpoint = endpoint.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND endpoint = ?2",
                    params![cache, endpoint],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries across every cache.
    pub async fn total_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheMetadata;
    use serde_json::json;

    fn make_entry(url: &str, endpoint: &str, timestamp: i64) -> StoredEntry {
        let metadata = CacheMetadata { timestamp, url: url.to_string(), endpoint: endpoint.to_string() };
        StoredEntry::with_metadata("GET", json!({ "value": timestamp }), metadata).unwrap()
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_entry("https://api.example.com/lite/v1/analytics", "/lite/v1/analytics", 0);

        db.put_entry("v1", &entry).await.unwrap();

        let found = db.match_entry("v1", &entry.hash).await.unwrap().unwrap();
        assert_eq!(found, entry);
        assert_eq!(db.cache_names().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("v1").await.unwrap();
        assert!(db.match_entry("v1", "nonexistent").await.unwrap().is_none());
        assert!(db.match_entry("other", "nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_wholesale() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://api.example.com/lite/v1/analytics";
        db.put_entry("v1", &make_entry(url, "/lite/v1/analytics", 1)).await.unwrap();
        db.put_entry("v1", &make_entry(url, "/lite/v1/analytics", 2)).await.unwrap();

        let entries = db.entries("v1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].metadata().unwrap().timestamp, 2);
    }

    #[tokio::test]
    async fn test_caches_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_entry("https://api.example.com/lite/v1/analytics", "/lite/v1/analytics", 0);
        db.put_entry("v1", &entry).await.unwrap();

        assert!(db.match_entry("v2", &entry.hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_cache_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("https://api.example.com/a", "/a", 0)).await.unwrap();
        db.put_entry("v2", &make_entry("https://api.example.com/b", "/b", 0)).await.unwrap();

        assert!(db.delete_cache("v1").await.unwrap());
        assert!(!db.delete_cache("v1").await.unwrap());
        assert_eq!(db.cache_names().await.unwrap(), vec!["v2".to_string()]);
        assert_eq!(db.total_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_endpoint_exact_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("https://api.example.com/x", "/x", 0)).await.unwrap();
        db.put_entry("v1", &make_entry("https://api.example.com/x?page=2", "/x", 0)).await.unwrap();
        db.put_entry("v1", &make_entry("https://api.example.com/x/y", "/x/y", 0)).await.unwrap();

        let deleted = db.delete_endpoint("v1", "/x").await.unwrap();
        assert_eq!(deleted, 2);

        let remaining = db.entries("v1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].endpoint, "/x/y");
    }

}
