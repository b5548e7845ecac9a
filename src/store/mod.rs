//! Durable key-value cache backed by DuckDB.
//!
//! All tables share one physical DuckDB table keyed by `(tbl, entry_key)`.
//! Payloads are stored as JSON text; writes are upserts, so the last write for
//! a key wins.

pub mod async_store;

pub use async_store::AsyncCacheStore;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use duckdb::{params, Connection as DuckDbConnection};
use serde_json::Value;
use tracing::{debug, warn};

use crate::currency::Currency;
use crate::error::Result;

// ---------------------------------------------------------------------------
// CacheTable
// ---------------------------------------------------------------------------

/// Logical tables of the durable cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheTable {
    PopularCoinsLists,
    CoinDetails,
    CurrencyRates,
    GlobalCacheInfo,
}

impl CacheTable {
    pub const ALL: [CacheTable; 4] = [
        CacheTable::PopularCoinsLists,
        CacheTable::CoinDetails,
        CacheTable::CurrencyRates,
        CacheTable::GlobalCacheInfo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheTable::PopularCoinsLists => "popularCoinsLists",
            CacheTable::CoinDetails => "coinDetails",
            CacheTable::CurrencyRates => "currencyRates",
            CacheTable::GlobalCacheInfo => "globalCacheInfo",
        }
    }
}

impl fmt::Display for CacheTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry key of a per-coin detail record: `"<CUR>/<coin id>"`.
pub fn coin_details_key(currency: Currency, coin_id: &str) -> String {
    format!("{}/{}", currency.code(), coin_id)
}

// ---------------------------------------------------------------------------
// CacheStore
// ---------------------------------------------------------------------------

/// Synchronous durable store. See [`AsyncCacheStore`] for the async form.
pub struct CacheStore {
    conn: DuckDbConnection,
    path: Option<PathBuf>,
}

impl CacheStore {
    /// Open (or create) a store file, creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = DuckDbConnection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a store that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self> {
        let conn = DuckDbConnection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: DuckDbConnection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (\
               tbl VARCHAR NOT NULL, \
               entry_key VARCHAR NOT NULL, \
               payload VARCHAR NOT NULL, \
               PRIMARY KEY (tbl, entry_key)\
             )",
        )?;
        Ok(Self { conn, path })
    }

    /// Location of the backing file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or overwrite the payload stored under `(table, key)`.
    pub fn put(&self, table: CacheTable, key: &str, payload: &Value) -> Result<()> {
        let text = serde_json::to_string(payload)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO cache_entries (tbl, entry_key, payload) VALUES (?, ?, ?)",
            params![table.as_str(), key, text],
        )?;
        debug!(%table, key = %key, "cache entry written");
        Ok(())
    }

    /// Read the payload stored under `(table, key)`.
    ///
    /// A payload that no longer parses is deleted and reported as absent, so
    /// the next write replaces it.
    pub fn get(&self, table: CacheTable, key: &str) -> Result<Option<Value>> {
        let text: Option<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT payload FROM cache_entries WHERE tbl = ? AND entry_key = ?")?;
            let mut rows = stmt.query(params![table.as_str(), key])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };

        let Some(text) = text else {
            return Ok(None);
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(%table, key = %key, "corrupt cache entry: {} -- removing", e);
                self.delete(table, key)?;
                Ok(None)
            }
        }
    }

    /// Visit every entry of `table` in key order. Returns the number visited.
    ///
    /// Entries whose payload does not parse are skipped.
    pub fn for_each<F>(&self, table: CacheTable, mut visitor: F) -> Result<usize>
    where
        F: FnMut(&str, Value),
    {
        let mut stmt = self.conn.prepare(
            "SELECT entry_key, payload FROM cache_entries WHERE tbl = ? ORDER BY entry_key",
        )?;
        let mut rows = stmt.query(params![table.as_str()])?;

        let mut visited = 0;
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let text: String = row.get(1)?;
            match serde_json::from_str(&text) {
                Ok(value) => {
                    visitor(&key, value);
                    visited += 1;
                }
                Err(e) => warn!(%table, key = %key, "skipping corrupt cache entry: {}", e),
            }
        }
        Ok(visited)
    }

    /// List the keys of `table` in key order.
    pub fn keys(&self, table: CacheTable) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry_key FROM cache_entries WHERE tbl = ? ORDER BY entry_key")?;
        let mut rows = stmt.query(params![table.as_str()])?;

        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }

    /// Delete a single entry. Returns whether it existed.
    pub fn delete(&self, table: CacheTable, key: &str) -> Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM cache_entries WHERE tbl = ? AND entry_key = ?",
            params![table.as_str(), key],
        )?;
        Ok(n > 0)
    }

    /// Delete every entry of `table`. Returns the number removed.
    pub fn delete_table(&self, table: CacheTable) -> Result<usize> {
        let n = self
            .conn
            .execute("DELETE FROM cache_entries WHERE tbl = ?", params![table.as_str()])?;
        Ok(n)
    }

    /// Delete every entry of every table.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute_batch("DELETE FROM cache_entries")?;
        Ok(())
    }
}
