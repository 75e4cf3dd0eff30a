//! Entry operations on one named cache store.
//!
//! A `CacheStore` is a cheap handle (connection clone + shared name) that is
//! passed explicitly into each fetch handler instead of being looked up from
//! global state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use super::{PRECACHE_ROUTE, timestamp};
use crate::policy::Expiration;
use crate::request::Request;
use crate::response::{Response, ResponseType};
use crate::Error;

/// Handle to a named cache store.
#[derive(Clone, Debug)]
pub struct CacheStore {
    db: CacheDb,
    name: Arc<str>,
}

/// Listing view of a stored entry (no body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EntryMeta {
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub route: Option<String>,
    pub response_type: String,
    pub status: u16,
    pub size: i64,
    pub stored_at: String,
}

/// Owned values for one row insert, built outside the connection thread.
pub(crate) struct EntryRecord {
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub route: Option<String>,
    pub response: Response,
    pub headers_json: String,
}

impl EntryRecord {
    pub(crate) fn new(request: &Request, response: &Response, route: Option<&str>) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!("only GET requests can be cached, got {}", request.method)));
        }
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize headers: {e}")))?;
        Ok(Self {
            key_hash: compute_entry_key(&request.method, request.url.as_str()),
            method: request.method.clone(),
            url: request.url.to_string(),
            route: route.map(str::to_string),
            response: response.clone(),
            headers_json,
        })
    }

    /// Insert or replace the entry; the last writer for an identity wins.
    ///
    /// A precached entry keeps its route when a runtime write refreshes it,
    /// so route expiration never evicts manifest entries.
    pub(crate) fn upsert(&self, conn: &rusqlite::Connection, store: &str, stored_at: &str) -> rusqlite::Result<()> {
        let response = &self.response;
        conn.execute(
            "INSERT INTO cache_entries (
                store_name, key_hash, method, url, route,
                response_type, response_url, status, status_text, headers_json,
                body, size, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(store_name, key_hash) DO UPDATE SET
                route = CASE WHEN cache_entries.route = ?14 THEN cache_entries.route ELSE excluded.route END,
                response_type = excluded.response_type,
                response_url = excluded.response_url,
                status = excluded.status,
                status_text = excluded.status_text,
                headers_json = excluded.headers_json,
                body = excluded.body,
                size = excluded.size,
                stored_at = excluded.stored_at",
            params![
                store,
                &self.key_hash,
                &self.method,
                &self.url,
                &self.route,
                response.response_type.as_str(),
                &response.url,
                response.status,
                &response.status_text,
                &self.headers_json,
                response.body.as_ref(),
                response.size() as i64,
                stored_at,
                PRECACHE_ROUTE,
            ],
        )?;
        Ok(())
    }
}

/// Raw columns of a matched entry.
struct EntryRow {
    response_type: String,
    response_url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn into_response(self) -> Result<Response, Error> {
        let headers: BTreeMap<String, String> = serde_json::from_str(&self.headers_json)
            .map_err(|e| Error::InvalidInput(format!("corrupt headers column: {e}")))?;
        Ok(Response {
            response_type: self.response_type.parse::<ResponseType>()?,
            url: self.response_url,
            status: self.status,
            status_text: self.status_text,
            headers,
            body: Bytes::from(self.body),
            cached_at: Some(self.stored_at),
        })
    }
}

fn cutoff(age: Duration) -> Result<String, Error> {
    let age = chrono::Duration::from_std(age).map_err(|e| Error::InvalidInput(format!("age out of range: {e}")))?;
    Ok(timestamp(Utc::now() - age))
}

impl CacheDb {
    /// Handle to a store by name. The store itself is created by
    /// [`CacheDb::open_store`] or [`CacheDb::precache`].
    pub fn store(&self, name: &str) -> CacheStore {
        CacheStore { db: self.clone(), name: Arc::from(name) }
    }
}

impl CacheStore {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the stored response for a request identity.
    ///
    /// The returned response has `cached_at` set.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        let store = self.name.to_string();
        let key_hash = compute_entry_key(&request.method, request.url.as_str());
        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT response_type, response_url, status, status_text, headers_json, body, stored_at
                     FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![store, key_hash], |row| {
                    Ok(EntryRow {
                        response_type: row.get(0)?,
                        response_url: row.get(1)?,
                        status: row.get(2)?,
                        status_text: row.get(3)?,
                        headers_json: row.get(4)?,
                        body: row.get(5)?,
                        stored_at: row.get(6)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    /// Store a response under the request's identity.
    ///
    /// Fails if the request is not a GET or if the store has been deleted.
    pub async fn put(&self, request: &Request, response: &Response, route: Option<&str>) -> Result<(), Error> {
        let record = EntryRecord::new(request, response, route)?;
        let store = self.name.to_string();
        let stored_at = timestamp(Utc::now());
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                record.upsert(conn, &store, &stored_at)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let store = self.name.to_string();
        let key_hash = compute_entry_key(&request.method, request.url.as_str());
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2",
                    params![store, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// List entries, oldest first.
    pub async fn keys(&self) -> Result<Vec<EntryMeta>, Error> {
        let store = self.name.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key_hash, method, url, route, response_type, status, size, stored_at
                     FROM cache_entries WHERE store_name = ?1 ORDER BY stored_at ASC, rowid ASC",
                )?;
                let rows = stmt.query_map(params![store], |row| {
                    Ok(EntryMeta {
                        key_hash: row.get(0)?,
                        method: row.get(1)?,
                        url: row.get(2)?,
                        route: row.get(3)?,
                        response_type: row.get(4)?,
                        status: row.get(5)?,
                        size: row.get(6)?,
                        stored_at: row.get(7)?,
                    })
                })?;
                let entries = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in the store.
    pub async fn len(&self) -> Result<u64, Error> {
        let store = self.name.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1",
                    params![store],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Apply a route's expiration rules to the entries it wrote.
    ///
    /// Entries older than `max_age_secs` go first, then the oldest entries
    /// beyond `max_entries`. Returns the number of deleted entries.
    pub async fn expire(&self, route: &str, expiration: &Expiration) -> Result<u64, Error> {
        if expiration.is_unbounded() {
            return Ok(0);
        }
        let store = self.name.to_string();
        let route = route.to_string();
        let older_than = expiration.max_age().map(cutoff).transpose()?;
        let max_entries = expiration.max_entries.map(|n| n as i64);

        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let mut deleted = 0;
                if let Some(older_than) = older_than {
                    deleted += conn.execute(
                        "DELETE FROM cache_entries WHERE store_name = ?1 AND route = ?2 AND stored_at < ?3",
                        params![store, route, older_than],
                    )?;
                }
                if let Some(max) = max_entries {
                    deleted += conn.execute(
                        "DELETE FROM cache_entries WHERE store_name = ?1 AND key_hash IN (
                            SELECT key_hash FROM cache_entries WHERE store_name = ?1 AND route = ?2
                            ORDER BY stored_at DESC, rowid DESC LIMIT -1 OFFSET ?3
                        )",
                        params![store, route, max],
                    )?;
                }
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry stored before `now - age`, whatever its route.
    pub async fn purge_older_than(&self, age: Duration) -> Result<u64, Error> {
        let store = self.name.to_string();
        let older_than = cutoff(age)?;
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE store_name = ?1 AND stored_at < ?2",
                    params![store, older_than],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge oldest entries until count <= max_entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_lru(&self, max_entries: usize) -> Result<u64, Error> {
        let store = self.name.to_string();
        let max = max_entries as i64;
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE store_name = ?1 AND key_hash IN (
                        SELECT key_hash FROM cache_entries WHERE store_name = ?1
                        ORDER BY stored_at DESC, rowid DESC LIMIT -1 OFFSET ?2
                    )",
                    params![store, max],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
