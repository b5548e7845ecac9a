//! End-to-end tests through the `CoinCache` facade.

mod common;

use coin_cache::models::CoinDetails;
use coin_cache::{
    CacheTable, CoinCache, CoinCacheError, CoordinatorOutcome, Currency, KnownData, PreloadOutcome,
};

fn known_coins() -> KnownData<Vec<coin_cache::models::CoinOverview>> {
    KnownData {
        currency: Currency::Cad,
        data: common::sample_coins(),
        rates: common::sample_rates(),
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn builder_starts_worker_by_default() {
    let cache = common::memory_cache().await;
    assert!(cache.worker().is_initialized());
    assert!(cache.to_string().contains("worker=running"));

    cache.shutdown();
    assert!(!cache.worker().is_initialized());
    assert!(cache.to_string().contains("worker=stopped"));
}

#[tokio::test]
async fn builder_opens_file_store() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("coins.duckdb");
    let cache = CoinCache::builder()
        .store_path(&path)
        .background_worker(false)
        .build()
        .await
        .unwrap();

    assert!(!cache.worker().is_initialized());
    cache.refresh_popular_coins(known_coins(), true).await;
    assert!(path.exists());
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_popular_coins_fills_every_currency() {
    let cache = common::memory_cache().await;
    let mut updates = cache.subscribe();

    let outcome = cache.refresh_popular_coins(known_coins(), true).await;
    assert!(outcome.is_settled());
    assert!(updates.recv().await.is_ok());
    for currency in Currency::ALL {
        assert!(cache.memory().popular_coins(currency).is_some(), "{currency} missing");
    }

    let again = cache.refresh_popular_coins(known_coins(), true).await;
    assert!(matches!(again, CoordinatorOutcome::CacheHit { .. }));
}

#[tokio::test]
async fn refresh_coin_details_uses_record_id() {
    let cache = common::memory_cache().await;
    let known = KnownData {
        currency: Currency::Usd,
        data: CoinDetails::shallow(&common::ethereum_overview()),
        rates: common::sample_rates(),
    };
    assert!(cache.refresh_coin_details(known, true).await.is_settled());

    let keys = cache.store().entries(CacheTable::CoinDetails).await.unwrap();
    assert!(keys.iter().all(|(key, _)| key.ends_with("/ethereum")));
    assert_eq!(keys.len(), Currency::ALL.len());
}

// ---------------------------------------------------------------------------
// Exchange rates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stored_rates_are_served_back() {
    let cache = common::memory_cache().await;
    assert_eq!(cache.cached_rates().await.unwrap(), None);

    let rates = common::sample_rates();
    cache.store_rates(&rates).await.unwrap();

    let cached = cache.cached_rates().await.unwrap().unwrap();
    for from in Currency::ALL {
        for to in Currency::ALL {
            common::assert_close(cached.get(from, to).unwrap(), rates.get(from, to).unwrap());
        }
    }
    assert_eq!(cache.memory().rates(), Some(rates));
}

#[tokio::test]
async fn invalidated_rates_are_not_served() {
    let cache = common::memory_cache().await;
    cache.store_rates(&common::sample_rates()).await.unwrap();
    cache.validity().invalidate(CacheTable::CurrencyRates, "GBP");
    assert_eq!(cache.cached_rates().await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Freshness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_check_resets_then_trusts() {
    let cache = common::memory_cache().await;
    assert!(!cache.check_freshness("v1").await.unwrap());
    assert!(cache.check_freshness("v1").await.unwrap());
}

#[tokio::test]
async fn new_server_version_clears_cached_data() {
    let cache = common::memory_cache().await;
    cache.check_freshness("v1").await.unwrap();
    cache.refresh_popular_coins(known_coins(), true).await;
    cache.store_rates(&common::sample_rates()).await.unwrap();

    assert!(!cache.check_freshness("v2").await.unwrap());
    assert!(cache.store().entries(CacheTable::PopularCoinsLists).await.unwrap().is_empty());
    assert!(cache.store().entries(CacheTable::CurrencyRates).await.unwrap().is_empty());
    assert!(!cache.validity().is_valid(CacheTable::PopularCoinsLists, "USD"));
    // Published data stays visible until the next refresh.
    assert!(cache.memory().popular_coins(Currency::Usd).is_some());

    assert!(cache.check_freshness("v2").await.unwrap());
}

// ---------------------------------------------------------------------------
// Preloading
// ---------------------------------------------------------------------------

#[tokio::test]
async fn preload_caches_details_in_every_currency() {
    let cache = common::memory_cache().await;
    let outcome = cache
        .preload_coin("bitcoin", Currency::Cad, common::sample_rates(), async {
            Ok::<_, CoinCacheError>(common::full_details("bitcoin"))
        })
        .await
        .unwrap();

    assert!(matches!(outcome, PreloadOutcome::Preloaded { evicted: None, .. }));
    assert!(cache.preload().is_preloaded("bitcoin"));
    for currency in Currency::ALL {
        assert!(cache.memory().coin_details(currency, "bitcoin").unwrap().is_full());
    }
}

#[tokio::test]
async fn concurrent_preload_of_same_coin_is_skipped() {
    let cache = common::memory_cache().await;
    let rates = common::sample_rates();

    let outcome = cache
        .preload_coin("bitcoin", Currency::Cad, rates.clone(), async {
            let nested = cache
                .preload_coin("bitcoin", Currency::Cad, rates.clone(), async {
                    Ok::<_, CoinCacheError>(common::full_details("bitcoin"))
                })
                .await
                .unwrap();
            assert_eq!(nested, PreloadOutcome::AlreadyInFlight);
            Ok::<_, CoinCacheError>(common::full_details("bitcoin"))
        })
        .await
        .unwrap();

    assert!(matches!(outcome, PreloadOutcome::Preloaded { .. }));
}

#[tokio::test]
async fn preload_over_capacity_evicts_oldest_coin() {
    common::init_tracing();
    let cache = CoinCache::builder()
        .in_memory(true)
        .max_preloaded_coins(2)
        .build()
        .await
        .unwrap();

    for coin in ["bitcoin", "ethereum"] {
        cache
            .preload_coin(coin, Currency::Cad, common::sample_rates(), async move {
                Ok::<_, CoinCacheError>(common::full_details(coin))
            })
            .await
            .unwrap();
    }

    let outcome = cache
        .preload_coin("solana", Currency::Cad, common::sample_rates(), async {
            Ok::<_, CoinCacheError>(common::full_details("solana"))
        })
        .await
        .unwrap();
    let PreloadOutcome::Preloaded { evicted, .. } = &outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(evicted.as_deref(), Some("bitcoin"));

    assert_eq!(
        cache.preload().preloaded_coins(),
        vec!["ethereum".to_string(), "solana".to_string()]
    );
    assert!(cache.memory().coin_details(Currency::Usd, "bitcoin").is_none());
    let keys = cache.store().entries(CacheTable::CoinDetails).await.unwrap();
    assert!(keys.iter().all(|(key, _)| !key.ends_with("/bitcoin")));
    assert!(cache.to_string().contains("preloaded=[ethereum, solana]"));
}

#[tokio::test]
async fn failed_fetch_releases_the_coin() {
    let cache = common::memory_cache().await;
    let err = cache
        .preload_coin("bitcoin", Currency::Cad, common::sample_rates(), async {
            Err::<CoinDetails, _>(CoinCacheError::InvalidArgument("upstream unavailable".into()))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CoinCacheError::InvalidArgument(_)));
    assert!(!cache.preload().is_in_flight("bitcoin"));
    assert!(!cache.preload().is_preloaded("bitcoin"));
}

#[tokio::test]
async fn incomplete_rates_leave_preload_unfinished() {
    let cache = common::memory_cache().await;
    let outcome = cache
        .preload_coin("bitcoin", Currency::Cad, common::incomplete_rates(), async {
            Ok::<_, CoinCacheError>(common::full_details("bitcoin"))
        })
        .await
        .unwrap();

    assert!(matches!(outcome, PreloadOutcome::Incomplete { .. }));
    assert!(!cache.preload().is_preloaded("bitcoin"));
}

#[tokio::test]
async fn failed_re_preload_still_evicts_earlier_details() {
    let cache = CoinCache::builder()
        .in_memory(true)
        .max_preloaded_coins(1)
        .build()
        .await
        .unwrap();

    cache
        .preload_coin("bitcoin", Currency::Cad, common::sample_rates(), async {
            Ok::<_, CoinCacheError>(common::full_details("bitcoin"))
        })
        .await
        .unwrap();
    let err = cache
        .preload_coin("bitcoin", Currency::Cad, common::sample_rates(), async {
            Err::<CoinDetails, _>(CoinCacheError::InvalidArgument("upstream unavailable".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoinCacheError::InvalidArgument(_)));
    assert!(cache.preload().is_preloaded("bitcoin"));

    let outcome = cache
        .preload_coin("ethereum", Currency::Cad, common::sample_rates(), async {
            Ok::<_, CoinCacheError>(common::full_details("ethereum"))
        })
        .await
        .unwrap();
    let PreloadOutcome::Preloaded { evicted, .. } = &outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(evicted.as_deref(), Some("bitcoin"));
    assert_eq!(cache.preload().preloaded_coins(), vec!["ethereum".to_string()]);
    let keys = cache.store().entries(CacheTable::CoinDetails).await.unwrap();
    assert!(keys.iter().all(|(key, _)| !key.ends_with("/bitcoin")));
}
