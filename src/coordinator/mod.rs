//! Cache coordination: publish what is known, then reconcile the other
//! currencies from the durable cache or the transform worker.
//!
//! A [`CacheCoordinator`] walks `Init -> DispatchKnown -> Resolve -> Settled`
//! for one piece of data (a coin list, one coin's details). What differs per
//! data kind lives in a [`CacheStrategy`]; the coordinator owns the I/O.

pub mod coin_details;
pub mod popular_coins;

pub use coin_details::CoinDetailsStrategy;
pub use popular_coins::PopularCoinsStrategy;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::currency::Currency;
use crate::error::{Result, TransformError};
use crate::publish::{PublishedUpdate, Publisher};
use crate::rates::ExchangeRateMatrix;
use crate::store::{AsyncCacheStore, CacheTable};
use crate::sync::lock;
use crate::validity::ValidityTracker;
use crate::worker::{transform, CorrelationToken, TransformRequest, TransformResponse, WorkerHandle};

// ---------------------------------------------------------------------------
// KnownData / CacheStrategy
// ---------------------------------------------------------------------------

/// Data the caller already holds in one currency, plus the rates to derive
/// the others from.
#[derive(Debug, Clone)]
pub struct KnownData<T> {
    pub currency: Currency,
    pub data: T,
    pub rates: ExchangeRateMatrix,
}

/// The per-data-kind half of a coordinator.
pub trait CacheStrategy: Send + Sync + 'static {
    type Data: Clone + Send + Sync + 'static;

    /// Durable table holding this kind of data.
    fn table(&self) -> CacheTable;

    /// Entry key for `currency` within [`table`](Self::table).
    fn cache_key(&self, currency: Currency) -> String;

    /// The update that publishes `data` for `currency`.
    fn dispatch_known(&self, currency: Currency, data: &Self::Data) -> PublishedUpdate;

    /// Decode a durable payload.
    fn get_from_cache(&self, payload: Value) -> Result<Self::Data>;

    /// Encode data for the durable store.
    fn encode(&self, data: &Self::Data) -> Result<Value>;

    /// Build the worker request deriving every non-excluded currency.
    fn send_to_worker(
        &self,
        known: &KnownData<Self::Data>,
        exclude: Vec<Currency>,
    ) -> TransformRequest;

    /// Split a worker reply into per-currency data.
    fn handle_transformed(
        &self,
        response: TransformResponse,
    ) -> std::result::Result<Vec<(Currency, Self::Data)>, TransformError>;

    /// Combine a newly derived value with what the durable cache holds.
    fn merge(&self, existing: Option<Self::Data>, incoming: Self::Data) -> Self::Data;
}

// ---------------------------------------------------------------------------
// State and outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Init,
    DispatchKnown,
    Resolve,
    Settled,
}

/// How a coordinator run ended. None of these is fatal: the known data has
/// been published in every case except `Detached`.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorOutcome {
    /// Every other currency was served from the durable cache.
    CacheHit { currencies: Vec<Currency> },
    /// These currencies were derived by a transform, persisted and published;
    /// the rest were cache hits.
    Transformed { currencies: Vec<Currency> },
    /// No worker was running and inline conversion is disabled.
    WorkerUnavailable,
    /// The worker was terminated or the coordinator cleaned up before the
    /// reply arrived.
    Abandoned,
    /// The transform rejected the request.
    Failed(TransformError),
    /// `run` was called after `cleanup`.
    Detached,
}

impl CoordinatorOutcome {
    /// Whether the run reached [`CoordinatorState::Settled`].
    pub fn is_settled(&self) -> bool {
        matches!(self, CoordinatorOutcome::CacheHit { .. } | CoordinatorOutcome::Transformed { .. })
    }
}

// ---------------------------------------------------------------------------
// CoordinatorContext
// ---------------------------------------------------------------------------

/// The shared collaborators a coordinator works against.
#[derive(Clone)]
pub struct CoordinatorContext {
    pub worker: WorkerHandle,
    pub store: AsyncCacheStore,
    pub validity: ValidityTracker,
    pub publisher: Arc<dyn Publisher>,
    /// Convert on the blocking pool when no worker is running.
    pub inline_fallback: bool,
}

// ---------------------------------------------------------------------------
// CacheCoordinator
// ---------------------------------------------------------------------------

pub struct CacheCoordinator<S: CacheStrategy> {
    strategy: S,
    ctx: CoordinatorContext,
    state: Mutex<CoordinatorState>,
    pending: Mutex<HashSet<CorrelationToken>>,
    detached: Arc<AtomicBool>,
}

impl<S: CacheStrategy> CacheCoordinator<S> {
    pub fn new(strategy: S, ctx: CoordinatorContext) -> Self {
        Self {
            strategy,
            ctx,
            state: Mutex::new(CoordinatorState::Init),
            pending: Mutex::new(HashSet::new()),
            detached: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn state(&self) -> CoordinatorState {
        *lock(&self.state)
    }

    /// Publish `known`, then bring every other currency up to date.
    ///
    /// `cache_valid` is the caller's global freshness verdict; when `false`
    /// no durable entry is trusted.
    pub async fn run(&self, known: KnownData<S::Data>, cache_valid: bool) -> CoordinatorOutcome {
        if self.detached.load(Ordering::SeqCst) {
            return CoordinatorOutcome::Detached;
        }
        self.set_state(CoordinatorState::Init);

        self.set_state(CoordinatorState::DispatchKnown);
        self.ctx
            .publisher
            .publish(self.strategy.dispatch_known(known.currency, &known.data));

        self.set_state(CoordinatorState::Resolve);
        let table = self.strategy.table();
        let mut hits = Vec::new();
        let mut misses = Vec::new();

        // The known value is merged over its durable entry later, so that
        // entry must be trusted too.
        let known_key = self.strategy.cache_key(known.currency);
        if !(cache_valid && self.ctx.validity.is_valid(table, &known_key)) {
            self.discard(&known_key).await;
        }

        for currency in Currency::all_except(&[known.currency]) {
            let key = self.strategy.cache_key(currency);
            if cache_valid && self.ctx.validity.is_valid(table, &key) {
                match self.read_cached(&key).await {
                    Some(data) => {
                        self.ctx
                            .publisher
                            .publish(self.strategy.dispatch_known(currency, &data));
                        hits.push(currency);
                    }
                    None => misses.push(currency),
                }
            } else {
                self.discard(&key).await;
                misses.push(currency);
            }
        }

        if misses.is_empty() {
            self.persist(known.currency, known.data).await;
            self.set_state(CoordinatorState::Settled);
            return CoordinatorOutcome::CacheHit { currencies: hits };
        }

        let mut exclude = vec![known.currency];
        exclude.extend(hits.iter().copied());
        let request = self.strategy.send_to_worker(&known, exclude.clone());

        let response = match self.transform(request).await {
            Ok(response) => response,
            Err(outcome) => return outcome,
        };
        let results = match self.strategy.handle_transformed(response) {
            Ok(results) => results,
            Err(e) => {
                warn!(%table, "unusable transform reply: {}", e);
                return CoordinatorOutcome::Failed(e);
            }
        };

        let mut transformed = Vec::new();
        for (currency, data) in results {
            if exclude.contains(&currency) {
                continue;
            }
            if let Some(merged) = self.persist(currency, data).await {
                self.ctx
                    .publisher
                    .publish(self.strategy.dispatch_known(currency, &merged));
                transformed.push(currency);
            }
        }
        self.persist(known.currency, known.data).await;

        self.set_state(CoordinatorState::Settled);
        CoordinatorOutcome::Transformed { currencies: transformed }
    }

    /// Detach from the worker: outstanding callbacks are dropped unfired and
    /// later runs return [`CoordinatorOutcome::Detached`].
    ///
    /// Returns `true` only on the first call. Also runs on drop.
    pub fn cleanup(&self) -> bool {
        if self.detached.swap(true, Ordering::SeqCst) {
            return false;
        }
        let tokens: Vec<CorrelationToken> = lock(&self.pending).drain().collect();
        for token in &tokens {
            self.ctx.worker.cancel(token);
        }
        debug!(table = %self.strategy.table(), cancelled = tokens.len(), "coordinator cleaned up");
        true
    }

    fn set_state(&self, state: CoordinatorState) {
        *lock(&self.state) = state;
        debug!(table = %self.strategy.table(), ?state, "coordinator state");
    }

    /// Drop an untrusted entry and its marker.
    async fn discard(&self, key: &str) {
        let table = self.strategy.table();
        self.ctx.validity.invalidate(table, key);
        if let Err(e) = self.ctx.store.delete(table, key).await {
            warn!(%table, key = %key, "failed to delete stale cache entry: {}", e);
        }
    }

    /// Read and decode a durable entry; any failure is a miss.
    async fn read_cached(&self, key: &str) -> Option<S::Data> {
        let table = self.strategy.table();
        match self.ctx.store.get(table, key).await {
            Ok(Some(payload)) => match self.strategy.get_from_cache(payload) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!(%table, key = %key, "undecodable cache entry: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(%table, key = %key, "cache read failed: {}", e);
                None
            }
        }
    }

    /// Merge `data` over the durable value, write it back and mark it valid.
    ///
    /// Returns the merged value, or `None` if it could not be stored.
    async fn persist(&self, currency: Currency, data: S::Data) -> Option<S::Data> {
        let table = self.strategy.table();
        let key = self.strategy.cache_key(currency);
        let existing = self.read_cached(&key).await;
        let merged = self.strategy.merge(existing, data);

        let payload = match self.strategy.encode(&merged) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%table, key = %key, "failed to encode cache entry: {}", e);
                return None;
            }
        };
        if let Err(e) = self.ctx.store.put(table, &key, payload).await {
            warn!(%table, key = %key, "cache write failed: {}", e);
            return None;
        }
        self.ctx.validity.mark_valid(table, &key);
        Some(merged)
    }

    /// Hand a request to the worker, or convert inline when none is running.
    async fn transform(
        &self,
        request: TransformRequest,
    ) -> std::result::Result<TransformResponse, CoordinatorOutcome> {
        if !self.ctx.worker.is_initialized() {
            return self.transform_inline(request).await;
        }

        let (tx, rx) = oneshot::channel();
        let detached = self.detached.clone();
        let posted = self.ctx.worker.post_with_callback(request, move |reply| {
            if !detached.load(Ordering::SeqCst) {
                let _ = tx.send(reply);
            }
        });
        let token = match posted {
            Ok(token) => token,
            Err(_) => return Err(CoordinatorOutcome::WorkerUnavailable),
        };
        lock(&self.pending).insert(token.clone());

        let reply = rx.await;
        lock(&self.pending).remove(&token);
        match reply {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(failure)) => {
                warn!(kind = ?failure.kind, "transform failed: {}", failure.error);
                Err(CoordinatorOutcome::Failed(failure.error))
            }
            Err(_) => {
                debug!(%token, "transform reply abandoned");
                Err(CoordinatorOutcome::Abandoned)
            }
        }
    }

    async fn transform_inline(
        &self,
        request: TransformRequest,
    ) -> std::result::Result<TransformResponse, CoordinatorOutcome> {
        if !self.ctx.inline_fallback {
            debug!(kind = ?request.kind(), "worker unavailable; refresh skipped");
            return Err(CoordinatorOutcome::WorkerUnavailable);
        }

        warn!(kind = ?request.kind(), "worker unavailable; converting inline");
        let message = crate::worker::WorkerMessage { request, correlation_token: None };
        match tokio::task::spawn_blocking(move || transform::handle(message)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(failure)) => Err(CoordinatorOutcome::Failed(failure.error)),
            Err(e) => {
                warn!("inline transform task failed: {}", e);
                Err(CoordinatorOutcome::Abandoned)
            }
        }
    }
}

impl<S: CacheStrategy> Drop for CacheCoordinator<S> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
