//! Named, versioned cache stores.
//!
//! A store maps request keys (method + URL) to captured responses. Stores are
//! reached only through the [`CacheStorage`] trait so the interception logic
//! can be exercised against any backend:
//!
//! - [`CacheDb`]: SQLite via tokio-rusqlite, WAL mode, automatic migrations
//! - [`MemoryStorage`]: in-process maps for tests and throwaway hosts

pub mod connection;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod stores;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use crate::Error;
use crate::http::{CachedRequest, CachedResponse};

pub use connection::CacheDb;
pub use memory::MemoryStorage;

/// Summary of one stored entry, for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntryMeta {
    pub key: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub stored_at: String,
    pub body_len: usize,
}

/// Cache store lifecycle and entry access.
///
/// Writes are independent per-key puts with overwrite semantics. There is no
/// isolation between concurrent writers: the last write for a key wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named store if it does not exist.
    async fn open(&self, name: &str) -> Result<(), Error>;

    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Names of all existing stores, sorted.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Remove a store and all of its entries.
    ///
    /// Returns false if no such store existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Write a batch of entries; either all of them land or none do.
    ///
    /// The store is created if missing.
    async fn put_all(&self, name: &str, entries: Vec<(CachedRequest, CachedResponse)>) -> Result<(), Error>;

    /// Write a single entry only if the store still exists.
    ///
    /// Returns false, writing nothing, when the store is gone. Background
    /// writes use this so they cannot bring back a purged store.
    async fn put_existing(
        &self, name: &str, request: &CachedRequest, response: &CachedResponse,
    ) -> Result<bool, Error>;

    /// Look up the stored response for a request.
    ///
    /// A missing store is a miss, not an error.
    async fn match_request(&self, name: &str, request: &CachedRequest) -> Result<Option<CachedResponse>, Error>;

    /// List entries of a store, oldest first.
    async fn entries(&self, name: &str) -> Result<Vec<CacheEntryMeta>, Error>;

    /// Write a single entry.
    async fn put(&self, name: &str, request: &CachedRequest, response: &CachedResponse) -> Result<(), Error> {
        self.put_all(name, vec![(request.clone(), response.clone())]).await
    }
}
