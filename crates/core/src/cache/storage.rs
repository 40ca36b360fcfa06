//! Storage seam used by the cache controller.
//!
//! The controller only needs named-store operations (open-by-write,
//! enumerate, delete, get, put) plus the registration record. Keeping them
//! behind a trait lets hosts swap the backend and lets tests inject a store
//! that fails.

use super::connection::CacheDb;
use crate::{Error, Response};

/// Key→response storage addressed by store name.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of every existing store.
    async fn store_names(&self) -> Result<Vec<String>, Error>;

    /// Whether a store with this name exists.
    async fn has_store(&self, name: &str) -> Result<bool, Error>;

    /// Delete a store and its entries. Returns false if it didn't exist.
    async fn delete_store(&self, name: &str) -> Result<bool, Error>;

    /// Stored response for `url` in `store`.
    async fn match_entry(&self, store: &str, url: &str) -> Result<Option<Response>, Error>;

    /// Write one response, creating the store if absent.
    async fn put_entry(&self, store: &str, url: &str, response: &Response) -> Result<(), Error>;

    /// Write every response or none of them.
    async fn put_all(&self, store: &str, entries: Vec<(String, Response)>) -> Result<(), Error>;

    /// Number of entries in `store` (zero if absent).
    async fn entry_count(&self, store: &str) -> Result<u64, Error>;

    /// Version recorded as governing `scope`.
    async fn active_version(&self, scope: &str) -> Result<Option<String>, Error>;

    /// Record `version` as governing `scope`.
    async fn set_active_version(&self, scope: &str, version: &str) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl CacheStorage for CacheDb {
    async fn store_names(&self) -> Result<Vec<String>, Error> {
        CacheDb::store_names(self).await
    }

    async fn has_store(&self, name: &str) -> Result<bool, Error> {
        CacheDb::has_store(self, name).await
    }

    async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        CacheDb::delete_store(self, name).await
    }

    async fn match_entry(&self, store: &str, url: &str) -> Result<Option<Response>, Error> {
        Ok(self.get_entry(store, url).await?.map(|entry| entry.response))
    }

    async fn put_entry(&self, store: &str, url: &str, response: &Response) -> Result<(), Error> {
        CacheDb::put_entry(self, store, url, response).await
    }

    async fn put_all(&self, store: &str, entries: Vec<(String, Response)>) -> Result<(), Error> {
        self.put_entries(store, entries).await
    }

    async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        CacheDb::entry_count(self, store).await
    }

    async fn active_version(&self, scope: &str) -> Result<Option<String>, Error> {
        Ok(self.registration(scope).await?.map(|reg| reg.active_version))
    }

    async fn set_active_version(&self, scope: &str, version: &str) -> Result<(), Error> {
        self.set_registration(scope, version).await
    }
}
