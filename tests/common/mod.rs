//! Shared test fixtures for the coin-cache integration tests.
//!
//! Provides a consistent CAD-based rate matrix, a couple of sample coins in
//! list and detail form, and helpers for building caches over in-memory or
//! temp-dir stores.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use coin_cache::models::{CoinDetails, CoinOverview, PriceHistory, PricePoint};
use coin_cache::{
    AsyncCacheStore, CoinCache, CoordinatorContext, Currency, ExchangeRateMatrix, MemoryStore,
    ValidityTracker, WorkerHandle,
};

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

// -- Rates --------------------------------------------------------------------

/// One CAD expressed in each other currency.
pub fn cad_quotes() -> BTreeMap<Currency, f64> {
    BTreeMap::from([
        (Currency::Usd, 0.74),
        (Currency::Aud, 1.10),
        (Currency::Gbp, 0.58),
    ])
}

/// A complete, consistent matrix built from [`cad_quotes`].
pub fn sample_rates() -> ExchangeRateMatrix {
    ExchangeRateMatrix::from_quotes(Currency::Cad, &cad_quotes())
}

/// A matrix missing every rate out of CAD except CAD -> USD.
pub fn incomplete_rates() -> ExchangeRateMatrix {
    let rates = sample_rates();
    let mut partial = ExchangeRateMatrix::new();
    for from in Currency::ALL {
        for to in Currency::ALL {
            let keep = from != Currency::Cad || to == Currency::Usd || to == Currency::Cad;
            if let (true, Some(rate)) = (keep, rates.get(from, to)) {
                partial.set(from, to, rate);
            }
        }
    }
    partial
}

// -- Coins --------------------------------------------------------------------

pub fn bitcoin_overview() -> CoinOverview {
    CoinOverview {
        id: "bitcoin".into(),
        symbol: "btc".into(),
        name: "Bitcoin".into(),
        image: "https://assets.example/btc.png".into(),
        current_price: 100_000.0,
        market_cap: 1_900_000_000_000.0,
        total_volume: 40_000_000_000.0,
        price_change_percentage_24h: 2.5,
    }
}

pub fn ethereum_overview() -> CoinOverview {
    CoinOverview {
        id: "ethereum".into(),
        symbol: "eth".into(),
        name: "Ethereum".into(),
        image: "https://assets.example/eth.png".into(),
        current_price: 4_000.0,
        market_cap: 480_000_000_000.0,
        total_volume: 20_000_000_000.0,
        price_change_percentage_24h: -1.25,
    }
}

pub fn sample_coins() -> Vec<CoinOverview> {
    vec![bitcoin_overview(), ethereum_overview()]
}

/// A full detail record for `id`, priced in CAD.
pub fn full_details(id: &str) -> CoinDetails {
    let history = PriceHistory {
        day: vec![
            PricePoint(1_000, 99_000.0),
            PricePoint(2_000, 101_000.0),
            PricePoint(3_000, 100_000.0),
        ],
        week: vec![PricePoint(1_000, 95_000.0), PricePoint(3_000, 100_000.0)],
        month: vec![PricePoint(1_000, 90_000.0)],
        year: vec![PricePoint(1_000, 60_000.0)],
    };
    CoinDetails {
        name: Some(format!("{id} coin")),
        image: Some(format!("https://assets.example/{id}.png")),
        current_price: Some(100_000.0),
        market_cap: Some(1_900_000_000_000.0),
        total_volume: Some(40_000_000_000.0),
        price_change_percentage_24h: Some(2.5),
        description: Some("A peer-to-peer electronic cash system.".into()),
        circulating_supply: Some(19_800_000.0),
        total_supply: Some(21_000_000.0),
        max_supply: Some(21_000_000.0),
        price_change_24h: Some(2_400.0),
        price_change_7d: Some(5_000.0),
        price_change_percentage_7d: Some(5.2),
        price_history: Some(history),
        ..CoinDetails::new(id, "btc")
    }
}

// -- Caches -------------------------------------------------------------------

/// A cache over an in-memory store with the background worker running.
pub async fn memory_cache() -> CoinCache {
    init_tracing();
    CoinCache::builder().in_memory(true).build().await.unwrap()
}

/// A coordinator context over fresh collaborators.
///
/// Returns the context together with the memory store it publishes into.
pub async fn context(
    worker: WorkerHandle,
    ttl: Duration,
    inline_fallback: bool,
) -> (CoordinatorContext, MemoryStore) {
    init_tracing();
    let memory = MemoryStore::default();
    let ctx = CoordinatorContext {
        worker,
        store: AsyncCacheStore::open_in_memory().await.unwrap(),
        validity: ValidityTracker::new(ttl),
        publisher: Arc::new(memory.clone()),
        inline_fallback,
    };
    (ctx, memory)
}

/// Assert two prices agree to within `1e-6` relative error.
pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = expected.abs().max(1.0) * 1e-6;
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}
