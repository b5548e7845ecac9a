//! Async wrapper around [`CacheStore`].
//!
//! Runs every store operation on the blocking thread pool via
//! [`tokio::task::spawn_blocking`], keeping the async event loop free while
//! DuckDB does its I/O.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{CoinCacheError, Result};
use crate::store::{CacheStore, CacheTable};

/// Async, cloneable handle to a [`CacheStore`].
///
/// The store is protected by a [`Mutex`] since a DuckDB connection cannot be
/// shared across threads without synchronization.
#[derive(Clone)]
pub struct AsyncCacheStore {
    inner: Arc<Mutex<CacheStore>>,
}

impl AsyncCacheStore {
    /// Wrap an already opened store.
    pub fn new(store: CacheStore) -> Self {
        Self { inner: Arc::new(Mutex::new(store)) }
    }

    /// Open (or create) a store file on the blocking pool.
    pub async fn open(path: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || CacheStore::open(path).map(Self::new))
            .await
            .map_err(|e| CoinCacheError::Task(format!("Task join error: {e}")))?
    }

    /// Open an in-memory store.
    pub async fn open_in_memory() -> Result<Self> {
        tokio::task::spawn_blocking(|| CacheStore::open_in_memory().map(Self::new))
            .await
            .map_err(|e| CoinCacheError::Task(format!("Task join error: {e}")))?
    }

    /// Run a sync store operation on the blocking thread pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&CacheStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store
                .lock()
                .map_err(|_| CoinCacheError::Task("store lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| CoinCacheError::Task(format!("Task join error: {e}")))?
    }

    pub async fn put(&self, table: CacheTable, key: &str, payload: Value) -> Result<()> {
        let key = key.to_string();
        self.run(move |s| s.put(table, &key, &payload)).await
    }

    pub async fn get(&self, table: CacheTable, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        self.run(move |s| s.get(table, &key)).await
    }

    /// Visit every entry of `table` on the blocking pool.
    pub async fn for_each<F>(&self, table: CacheTable, visitor: F) -> Result<usize>
    where
        F: FnMut(&str, Value) + Send + 'static,
    {
        self.run(move |s| s.for_each(table, visitor)).await
    }

    /// Collect every entry of `table` as `(key, payload)` pairs.
    pub async fn entries(&self, table: CacheTable) -> Result<Vec<(String, Value)>> {
        self.run(move |s| {
            let mut out = Vec::new();
            s.for_each(table, |key, value| out.push((key.to_string(), value)))?;
            Ok(out)
        })
        .await
    }

    pub async fn delete(&self, table: CacheTable, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.run(move |s| s.delete(table, &key)).await
    }

    pub async fn delete_table(&self, table: CacheTable) -> Result<usize> {
        self.run(move |s| s.delete_table(table)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.run(|s| s.clear()).await
    }
}
