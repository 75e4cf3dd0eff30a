//! Persisted designation of the active store.

use chrono::Utc;
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::timestamp;
use crate::Error;

impl CacheDb {
    /// Name of the store designated active by the last successful activation.
    pub async fn active_store(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result = conn.query_row("SELECT active_store FROM registration WHERE id = 1", [], |row| {
                    row.get::<_, Option<String>>(0)
                });
                match result {
                    Ok(name) => Ok(name),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Record `name` as the active store.
    pub async fn set_active_store(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let activated_at = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO registration (id, active_store, activated_at) VALUES (1, ?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET
                        active_store = excluded.active_store,
                        activated_at = excluded.activated_at",
                    params![name, activated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_active_store_initially_none() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.active_store().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_active_store_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set_active_store("v1").await.unwrap();
        db.set_active_store("v2").await.unwrap();
        assert_eq!(db.active_store().await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_active_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        CacheDb::open(&path).await.unwrap().set_active_store("v3").await.unwrap();

        let reopened = CacheDb::open(&path).await.unwrap();
        assert_eq!(reopened.active_store().await.unwrap().as_deref(), Some("v3"));
    }
}
