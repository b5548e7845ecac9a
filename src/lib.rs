//! Multi-currency coin data cache.
//!
//! Keeps popular-coin lists and per-coin details consistent across the
//! supported display currencies. Data arriving in one currency is published
//! immediately; the other currencies are served from a DuckDB-backed cache
//! while their freshness markers hold, and otherwise derived by a background
//! transform worker and written back.
//!
//! # Quick start
//!
//! ```no_run
//! use coin_cache::{CoinCache, Currency, KnownData};
//! # use coin_cache::{models::CoinOverview, ExchangeRateMatrix, Result};
//! # async fn example(coins: Vec<CoinOverview>, rates: ExchangeRateMatrix) -> Result<()> {
//! let cache = CoinCache::builder().build().await?;
//!
//! let outcome = cache
//!     .refresh_popular_coins(KnownData { currency: Currency::Cad, data: coins, rates }, true)
//!     .await;
//! let usd = cache.memory().popular_coins(Currency::Usd);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod currency;
pub mod error;
pub mod freshness;
pub mod merge;
pub mod models;
pub mod preload;
pub mod publish;
pub mod rates;
pub mod store;
mod sync;
pub mod validity;
pub mod worker;

pub use coordinator::{
    CacheCoordinator, CacheStrategy, CoinDetailsStrategy, CoordinatorContext, CoordinatorOutcome,
    CoordinatorState, KnownData, PopularCoinsStrategy,
};
pub use currency::Currency;
pub use error::{CoinCacheError, Result, TransformError, WorkerUnavailable};
pub use merge::merge_details;
pub use preload::{PreloadDedup, PreloadGuard, PreloadStart, PreloadTracker};
pub use publish::{MemoryStore, PublishedUpdate, Publisher};
pub use rates::{convert, ExchangeRateMatrix};
pub use store::{AsyncCacheStore, CacheStore, CacheTable};
pub use validity::ValidityTracker;
pub use worker::WorkerHandle;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use freshness::{FreshnessPolicy, GlobalCacheInfo};
use models::{CoinDetails, CoinOverview};

// ---------------------------------------------------------------------------
// CoinCacheBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing a [`CoinCache`].
///
/// Use [`CoinCache::builder()`] to obtain a builder, chain configuration
/// methods, and call [`build()`](CoinCacheBuilder::build).
pub struct CoinCacheBuilder {
    store_path: Option<PathBuf>,
    in_memory: bool,
    validity_ttl: Duration,
    freshness_window: Duration,
    max_preloaded_coins: usize,
    inline_fallback: bool,
    background_worker: bool,
    worker: Option<WorkerHandle>,
}

impl Default for CoinCacheBuilder {
    fn default() -> Self {
        Self {
            store_path: None,
            in_memory: false,
            validity_ttl: config::DEFAULT_VALIDITY_TTL,
            freshness_window: config::DEFAULT_FRESHNESS_WINDOW,
            max_preloaded_coins: config::DEFAULT_MAX_PRELOADED_COINS,
            inline_fallback: true,
            background_worker: true,
            worker: None,
        }
    }
}

impl CoinCacheBuilder {
    /// Set the durable store file.
    ///
    /// If not set, `coin-cache.duckdb` in the platform cache directory is used
    /// (e.g. `~/.cache/coin-cache/` on Linux).
    pub fn store_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.store_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keep the durable store in memory only.
    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    /// How long a written entry is trusted. Defaults to 5 minutes.
    pub fn validity_ttl(mut self, ttl: Duration) -> Self {
        self.validity_ttl = ttl;
        self
    }

    /// Window after which [`CoinCache::check_freshness`] forces a reset.
    pub fn freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Capacity of the preload tracker. Defaults to 10 coins.
    pub fn max_preloaded_coins(mut self, max: usize) -> Self {
        self.max_preloaded_coins = max;
        self
    }

    /// Convert inline when no worker is running. Defaults to `true`.
    pub fn inline_fallback(mut self, enabled: bool) -> Self {
        self.inline_fallback = enabled;
        self
    }

    /// Start the background worker on build. Defaults to `true`.
    pub fn background_worker(mut self, enabled: bool) -> Self {
        self.background_worker = enabled;
        self
    }

    /// Share an existing worker handle instead of creating one.
    pub fn worker(mut self, worker: WorkerHandle) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Open the durable store and start the worker.
    pub async fn build(self) -> Result<CoinCache> {
        let store = if self.in_memory {
            AsyncCacheStore::open_in_memory().await?
        } else {
            let path = self.store_path.unwrap_or_else(config::default_store_path);
            AsyncCacheStore::open(path).await?
        };

        let worker = self.worker.unwrap_or_default();
        if self.background_worker {
            worker.initialize();
        }

        Ok(CoinCache {
            worker,
            store,
            validity: ValidityTracker::new(self.validity_ttl),
            preload: PreloadDedup::new(self.max_preloaded_coins),
            memory: MemoryStore::default(),
            freshness: FreshnessPolicy::new(self.freshness_window),
            inline_fallback: self.inline_fallback,
        })
    }
}

// ---------------------------------------------------------------------------
// PreloadOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PreloadOutcome {
    /// Another preload of the same coin is running; nothing was done.
    AlreadyInFlight,
    /// The coin's details are now cached in every currency.
    Preloaded { evicted: Option<String>, outcome: CoordinatorOutcome },
    /// Details were fetched but not every currency could be derived.
    Incomplete { evicted: Option<String>, outcome: CoordinatorOutcome },
}

// ---------------------------------------------------------------------------
// CoinCache
// ---------------------------------------------------------------------------

/// The main entry point: owns the worker, the cache tiers and the preload
/// tracker, and hands out coordinators wired to them.
pub struct CoinCache {
    worker: WorkerHandle,
    store: AsyncCacheStore,
    validity: ValidityTracker,
    preload: PreloadDedup,
    memory: MemoryStore,
    freshness: FreshnessPolicy,
    inline_fallback: bool,
}

impl CoinCache {
    /// Create a new builder for configuring the cache.
    pub fn builder() -> CoinCacheBuilder {
        CoinCacheBuilder::default()
    }

    // -- Accessors ---------------------------------------------------------

    pub fn worker(&self) -> &WorkerHandle {
        &self.worker
    }

    pub fn store(&self) -> &AsyncCacheStore {
        &self.store
    }

    pub fn validity(&self) -> &ValidityTracker {
        &self.validity
    }

    pub fn preload(&self) -> &PreloadDedup {
        &self.preload
    }

    /// The published in-memory tier.
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Receive every update published from now on.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PublishedUpdate> {
        self.memory.subscribe()
    }

    // -- Coordinators ------------------------------------------------------

    fn context(&self) -> CoordinatorContext {
        CoordinatorContext {
            worker: self.worker.clone(),
            store: self.store.clone(),
            validity: self.validity.clone(),
            publisher: Arc::new(self.memory.clone()),
            inline_fallback: self.inline_fallback,
        }
    }

    /// A coordinator for the popular-coins list. The caller owns it and should
    /// call [`CacheCoordinator::cleanup`] when done (dropping it also works).
    pub fn popular_coins_coordinator(&self) -> CacheCoordinator<PopularCoinsStrategy> {
        CacheCoordinator::new(PopularCoinsStrategy, self.context())
    }

    /// A coordinator for one coin's details.
    pub fn coin_details_coordinator(&self, coin_id: &str) -> CacheCoordinator<CoinDetailsStrategy> {
        CacheCoordinator::new(CoinDetailsStrategy::new(coin_id), self.context())
    }

    /// Publish a coin list and reconcile the other currencies.
    pub async fn refresh_popular_coins(
        &self,
        known: KnownData<Vec<CoinOverview>>,
        cache_valid: bool,
    ) -> CoordinatorOutcome {
        let coordinator = self.popular_coins_coordinator();
        let outcome = coordinator.run(known, cache_valid).await;
        coordinator.cleanup();
        outcome
    }

    /// Publish a coin's details and reconcile the other currencies.
    pub async fn refresh_coin_details(
        &self,
        known: KnownData<CoinDetails>,
        cache_valid: bool,
    ) -> CoordinatorOutcome {
        let coordinator = self.coin_details_coordinator(&known.data.id);
        let outcome = coordinator.run(known, cache_valid).await;
        coordinator.cleanup();
        outcome
    }

    // -- Preloading --------------------------------------------------------

    /// Fetch and cache a coin's full details ahead of navigation.
    ///
    /// At most one preload per coin runs at a time. `fetch` supplies the full
    /// record in `currency`; a fetch error is returned after the in-flight
    /// mark has been released. A coin that was already preloaded stays
    /// tracked for eviction when its re-preload fails.
    pub async fn preload_coin<F>(
        &self,
        coin_id: &str,
        currency: Currency,
        rates: ExchangeRateMatrix,
        fetch: F,
    ) -> Result<PreloadOutcome>
    where
        F: Future<Output = Result<CoinDetails>>,
    {
        let Some((guard, evicted)) = self.preload.begin(coin_id) else {
            return Ok(PreloadOutcome::AlreadyInFlight);
        };
        if let Some(evicted) = &evicted {
            self.evict_coin(evicted).await;
        }

        let details = fetch.await?;
        let outcome = self
            .refresh_coin_details(KnownData { currency, data: details, rates }, true)
            .await;

        if outcome.is_settled() {
            guard.complete();
            Ok(PreloadOutcome::Preloaded { evicted, outcome })
        } else {
            Ok(PreloadOutcome::Incomplete { evicted, outcome })
        }
    }

    /// Drop a coin's full details from every tier.
    pub async fn evict_coin(&self, coin_id: &str) {
        for currency in Currency::ALL {
            let key = store::coin_details_key(currency, coin_id);
            self.validity.invalidate(CacheTable::CoinDetails, &key);
            if let Err(e) = self.store.delete(CacheTable::CoinDetails, &key).await {
                warn!(coin_id, "failed to evict cached details: {}", e);
            }
        }
        self.memory.remove_coin(coin_id);
        info!(coin_id, "evicted preloaded coin");
    }

    // -- Exchange rates ----------------------------------------------------

    /// Persist and publish a rate matrix, one row per source currency.
    pub async fn store_rates(&self, rates: &ExchangeRateMatrix) -> Result<()> {
        for currency in Currency::ALL {
            if let Some(row) = rates.row(currency) {
                let payload = serde_json::to_value(row)?;
                self.store
                    .put(CacheTable::CurrencyRates, currency.code(), payload)
                    .await?;
                self.validity.mark_valid(CacheTable::CurrencyRates, currency.code());
            }
        }
        self.memory.publish(PublishedUpdate::ExchangeRates(rates.clone()));
        Ok(())
    }

    /// Load the rate matrix from the durable store if every row is present
    /// and still marked valid.
    pub async fn cached_rates(&self) -> Result<Option<ExchangeRateMatrix>> {
        let all_valid = Currency::ALL
            .iter()
            .all(|c| self.validity.is_valid(CacheTable::CurrencyRates, c.code()));
        if !all_valid {
            return Ok(None);
        }

        let mut matrix = ExchangeRateMatrix::new();
        for (key, payload) in self.store.entries(CacheTable::CurrencyRates).await? {
            let from: Currency = key.parse()?;
            let row: BTreeMap<Currency, f64> = serde_json::from_value(payload)?;
            for (to, rate) in row {
                matrix.set(from, to, rate);
            }
        }
        Ok(matrix.is_complete().then_some(matrix))
    }

    // -- Freshness ---------------------------------------------------------

    /// Compare the stored cache info with the server's cache version.
    ///
    /// Returns the `cache_valid` verdict to pass to coordinators. When stale,
    /// every data table and freshness marker is cleared and the new version
    /// is recorded.
    pub async fn check_freshness(&self, server_version: &str) -> Result<bool> {
        let info = match self
            .store
            .get(CacheTable::GlobalCacheInfo, config::GLOBAL_CACHE_INFO_KEY)
            .await
        {
            Ok(Some(payload)) => serde_json::from_value(payload).unwrap_or_default(),
            Ok(None) => GlobalCacheInfo::default(),
            Err(e) => {
                warn!("failed to read global cache info: {}", e);
                GlobalCacheInfo::default()
            }
        };

        let now = Utc::now();
        if self.freshness.evaluate(&info, server_version, now) {
            return Ok(true);
        }

        info!(server_version, "cache stale; resetting");
        self.invalidate_all().await?;
        let fresh = GlobalCacheInfo::reset_now(server_version, now);
        self.store
            .put(
                CacheTable::GlobalCacheInfo,
                config::GLOBAL_CACHE_INFO_KEY,
                serde_json::to_value(&fresh)?,
            )
            .await?;
        Ok(false)
    }

    /// Clear every freshness marker and every durable data table.
    ///
    /// Published data is kept so callers keep showing it until reconciled.
    pub async fn invalidate_all(&self) -> Result<()> {
        self.validity.clear();
        for table in CacheTable::ALL {
            if table != CacheTable::GlobalCacheInfo {
                self.store.delete_table(table).await?;
            }
        }
        Ok(())
    }

    /// Stop the worker. Pending transforms are abandoned.
    pub fn shutdown(&self) {
        self.worker.terminate();
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for CoinCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CoinCache(worker={}, ttl={:?}, preloaded=[{}])",
            if self.worker.is_initialized() { "running" } else { "stopped" },
            self.validity.ttl(),
            self.preload.preloaded_coins().join(", ")
        )
    }
}
