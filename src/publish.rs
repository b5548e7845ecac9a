//! Published data: the in-memory tier subscribers read from.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::currency::Currency;
use crate::merge::merge_into;
use crate::models::{CoinDetails, CoinOverview};
use crate::rates::ExchangeRateMatrix;
use crate::sync::lock;

/// One piece of data made visible to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishedUpdate {
    PopularCoins { currency: Currency, coins: Vec<CoinOverview> },
    CoinDetails { currency: Currency, details: CoinDetails },
    ExchangeRates(ExchangeRateMatrix),
}

/// Sink for published data.
pub trait Publisher: Send + Sync {
    fn publish(&self, update: PublishedUpdate);
}

#[derive(Default)]
struct Snapshot {
    popular_coins: HashMap<Currency, Vec<CoinOverview>>,
    coin_details: HashMap<(Currency, String), CoinDetails>,
    rates: Option<ExchangeRateMatrix>,
}

/// In-memory store of the latest published data, with broadcast fan-out.
///
/// Detail records are merged on publish, so a full record already held is
/// never replaced by a shallower one.
#[derive(Clone)]
pub struct MemoryStore {
    snapshot: Arc<Mutex<Snapshot>>,
    updates: broadcast::Sender<PublishedUpdate>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(256)
    }
}

impl MemoryStore {
    /// Create a store whose subscribers may lag by up to `capacity` updates.
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self { snapshot: Arc::new(Mutex::new(Snapshot::default())), updates }
    }

    /// Receive every update published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedUpdate> {
        self.updates.subscribe()
    }

    pub fn popular_coins(&self, currency: Currency) -> Option<Vec<CoinOverview>> {
        lock(&self.snapshot).popular_coins.get(&currency).cloned()
    }

    pub fn coin_details(&self, currency: Currency, coin_id: &str) -> Option<CoinDetails> {
        lock(&self.snapshot)
            .coin_details
            .get(&(currency, coin_id.to_string()))
            .cloned()
    }

    pub fn rates(&self) -> Option<ExchangeRateMatrix> {
        lock(&self.snapshot).rates.clone()
    }

    /// Drop the full details of a coin in every currency.
    pub fn remove_coin(&self, coin_id: &str) {
        lock(&self.snapshot).coin_details.retain(|(_, id), _| id != coin_id);
    }

    pub fn clear(&self) {
        *lock(&self.snapshot) = Snapshot::default();
    }
}

impl Publisher for MemoryStore {
    fn publish(&self, update: PublishedUpdate) {
        let update = {
            let mut snapshot = lock(&self.snapshot);
            match update {
                PublishedUpdate::PopularCoins { currency, coins } => {
                    snapshot.popular_coins.insert(currency, coins.clone());
                    PublishedUpdate::PopularCoins { currency, coins }
                }
                PublishedUpdate::CoinDetails { currency, details } => {
                    let key = (currency, details.id.clone());
                    let merged = merge_into(snapshot.coin_details.get(&key), details);
                    snapshot.coin_details.insert(key, merged.clone());
                    PublishedUpdate::CoinDetails { currency, details: merged }
                }
                PublishedUpdate::ExchangeRates(rates) => {
                    snapshot.rates = Some(rates.clone());
                    PublishedUpdate::ExchangeRates(rates)
                }
            }
        };
        // No subscribers is fine; the snapshot still holds the data.
        let _ = self.updates.send(update);
    }
}
