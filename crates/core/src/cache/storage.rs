//! Store-level operations: create, enumerate, delete, bulk precache.

use chrono::Utc;
use tokio_rusqlite::params;

use super::connection::CacheDb;
use super::store::{CacheStore, EntryRecord};
use super::{PRECACHE_ROUTE, timestamp};
use crate::request::Request;
use crate::response::Response;
use crate::Error;

impl CacheDb {
    /// Open (or create) a named store.
    pub async fn open_store(&self, name: &str) -> Result<CacheStore, Error> {
        let owned = name.to_string();
        let created_at = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_stores (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;
        Ok(self.store(name))
    }

    /// Check whether a store exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all stores, in creation order.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_at ASC, rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all its entries. Returns whether it existed.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Create a store and fill it in a single transaction.
    ///
    /// Either every entry is committed or none is; leftovers from an earlier
    /// store with the same name are replaced.
    pub async fn precache(&self, name: &str, entries: Vec<(Request, Response)>) -> Result<CacheStore, Error> {
        let records = entries
            .iter()
            .map(|(request, response)| EntryRecord::new(request, response, Some(PRECACHE_ROUTE)))
            .collect::<Result<Vec<_>, _>>()?;
        let owned = name.to_string();
        let now = timestamp(Utc::now());

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO cache_stores (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
                    params![owned, now],
                )?;
                tx.execute("DELETE FROM cache_entries WHERE store_name = ?1", params![owned])?;
                for record in &records {
                    record.upsert(&tx, &owned, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(self.store(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_open_store_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("v1").await.unwrap();
        db.open_store("v1").await.unwrap();
        assert_eq!(db.store_names().await.unwrap(), vec!["v1"]);
    }

    #[tokio::test]
    async fn test_store_names_and_delete() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("v1").await.unwrap();
        db.open_store("v2").await.unwrap();
        assert_eq!(db.store_names().await.unwrap(), vec!["v1", "v2"]);

        assert!(db.delete_store("v1").await.unwrap());
        assert!(!db.delete_store("v1").await.unwrap());
        assert!(!db.has_store("v1").await.unwrap());
        assert_eq!(db.store_names().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_delete_store_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("v1").await.unwrap();
        store.put(&get("https://app.test/"), &Response::new(200, "shell"), None).await.unwrap();

        db.delete_store("v1").await.unwrap();
        db.open_store("v1").await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_precache_commits_all_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entries = vec![
            (get("https://app.test/"), Response::new(200, "root")),
            (get("https://app.test/index.html"), Response::new(200, "index")),
            (get("https://app.test/app.css"), Response::new(200, "css")),
        ];

        let store = db.precache("v1", entries).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 3);
        let keys = store.keys().await.unwrap();
        assert!(keys.iter().all(|k| k.route.as_deref() == Some(PRECACHE_ROUTE)));
    }

    #[tokio::test]
    async fn test_precache_rejects_batch_atomically() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entries = vec![
            (get("https://app.test/"), Response::new(200, "root")),
            (get("https://app.test/form").with_method("POST"), Response::new(200, "")),
        ];

        assert!(db.precache("v1", entries).await.is_err());
        assert!(!db.has_store("v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_precache_replaces_leftovers() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stale = db.open_store("v1").await.unwrap();
        stale.put(&get("https://app.test/old.js"), &Response::new(200, "old"), None).await.unwrap();

        let store = db.precache("v1", vec![(get("https://app.test/"), Response::new(200, "root"))]).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.match_request(&get("https://app.test/old.js")).await.unwrap().is_none());
    }
}
