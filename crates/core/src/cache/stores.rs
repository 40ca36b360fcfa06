//! Named store and entry operations.
//!
//! A store is created implicitly by the first write into it and removed
//! wholesale with [`CacheDb::delete_store`]; entries cascade with it.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::{Error, Response};
use bytes::Bytes;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, Transaction};
use tokio_rusqlite::params;

/// A stored response together with the bookkeeping kept next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub store: String,
    pub url: String,
    pub response: Response,
    pub stored_at: String,
}

fn encode_headers(headers: &[(String, String)]) -> Result<String, Error> {
    Ok(serde_json::to_string(headers)?)
}

fn decode_headers(json: &str) -> Result<Vec<(String, String)>, Error> {
    Ok(serde_json::from_str(json)?)
}

/// Insert the store row if missing, then upsert the entry.
fn write_entry(tx: &Transaction<'_>, store: &str, url: &str, response: &Response, now: &str) -> Result<(), Error> {
    tx.execute(
        "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
        params![store, now],
    )?;
    tx.execute(
        "INSERT INTO cache_entries (store, key_hash, url, status, status_text, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(store, key_hash) DO UPDATE SET
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            store,
            compute_entry_key(url),
            url,
            response.status,
            &response.status_text,
            encode_headers(&response.headers)?,
            response.body.as_ref(),
            now,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Names of every existing store, oldest first.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a store with this name exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns false if no such store existed.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response under `url`, creating the store if absent.
    pub async fn put_entry(&self, store: &str, url: &str, response: &Response) -> Result<(), Error> {
        let (store, url, response) = (store.to_string(), url.to_string(), response.clone());
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                write_entry(&tx, &store, &url, &response, &now)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store a batch of responses in a single transaction.
    ///
    /// Either every entry is written (and the store created) or none is.
    pub async fn put_entries(&self, store: &str, entries: Vec<(String, Response)>) -> Result<(), Error> {
        let store = store.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for (url, response) in &entries {
                    write_entry(&tx, &store, url, response, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the entry stored under `url`.
    ///
    /// Returns None if the store or the entry doesn't exist.
    pub async fn get_entry(&self, store: &str, url: &str) -> Result<Option<StoredEntry>, Error> {
        let (store, key) = (store.to_string(), compute_entry_key(url));
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let row = conn
                    .query_row(
                        "SELECT url, status, status_text, headers_json, body, stored_at
                         FROM cache_entries WHERE store = ?1 AND key_hash = ?2",
                        params![store, key],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, u16>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, Vec<u8>>(4)?,
                                row.get::<_, String>(5)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((url, status, status_text, headers_json, body, stored_at)) = row else {
                    return Ok(None);
                };

                let response =
                    Response { status, status_text, headers: decode_headers(&headers_json)?, body: Bytes::from(body) };
                Ok(Some(StoredEntry { store, url, response, stored_at }))
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a store; zero when the store doesn't exist.
    pub async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a store, in insertion order.
    pub async fn entry_urls(&self, store: &str) -> Result<Vec<String>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT url FROM cache_entries WHERE store = ?1 ORDER BY stored_at ASC, rowid ASC")?;
                let urls = stmt
                    .query_map(params![store], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
