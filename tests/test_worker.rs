//! Worker handle tests: lifecycle, correlation and termination.

mod common;

use std::time::Duration;

use coin_cache::worker::{TransformRequest, TransformedData, WorkerReply};
use coin_cache::{Currency, WorkerHandle, WorkerUnavailable};
use tokio::sync::oneshot;

fn popular_single(to: Currency) -> TransformRequest {
    TransformRequest::PopularCoinsSingleCurrency {
        coins_to_transform: common::sample_coins(),
        from_currency: Currency::Cad,
        to_currency: to,
        currency_exchange_rates: common::sample_rates(),
    }
}

fn post(worker: &WorkerHandle, request: TransformRequest) -> oneshot::Receiver<WorkerReply> {
    let (tx, rx) = oneshot::channel();
    worker
        .post_with_callback(request, move |reply| {
            let _ = tx.send(reply);
        })
        .unwrap();
    rx
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn initialize_outside_runtime_reports_failure() {
    common::init_tracing();
    let worker = WorkerHandle::new();
    assert!(!worker.initialize());
    assert!(!worker.is_initialized());
}

#[tokio::test]
async fn posting_before_initialize_is_unavailable() {
    let worker = WorkerHandle::new();
    assert_eq!(worker.post_message(popular_single(Currency::Usd)), Err(WorkerUnavailable));
    let posted = worker.post_with_callback(popular_single(Currency::Usd), |_| {});
    assert_eq!(posted, Err(WorkerUnavailable));
    assert_eq!(worker.pending_callbacks(), 0);
}

#[tokio::test]
async fn initialize_is_idempotent() {
    common::init_tracing();
    let worker = WorkerHandle::new();
    assert!(worker.initialize());
    assert!(worker.initialize());
    assert!(worker.is_initialized());

    let clone = worker.clone();
    assert!(clone.is_initialized());
    worker.terminate();
}

#[tokio::test]
async fn post_message_is_fire_and_forget() {
    let worker = WorkerHandle::new();
    worker.initialize();
    assert!(worker.post_message(popular_single(Currency::Aud)).is_ok());
    assert_eq!(worker.pending_callbacks(), 0);
    worker.terminate();
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replies_reach_their_own_callbacks() {
    common::init_tracing();
    let worker = WorkerHandle::new();
    worker.initialize();

    let usd = post(&worker, popular_single(Currency::Usd));
    let gbp = post(&worker, popular_single(Currency::Gbp));

    let gbp_reply = gbp.await.unwrap().unwrap();
    let usd_reply = usd.await.unwrap().unwrap();

    assert_eq!(usd_reply.to_currency, Some(Currency::Usd));
    assert_eq!(gbp_reply.to_currency, Some(Currency::Gbp));
    let TransformedData::TransformedPopularCoinsSingleCurrency(coins) = usd_reply.data else {
        panic!("unexpected reply kind");
    };
    common::assert_close(coins[0].current_price, 74_000.0);
    assert_eq!(worker.pending_callbacks(), 0);
    worker.terminate();
}

#[tokio::test]
async fn failures_are_delivered_to_the_caller() {
    let worker = WorkerHandle::new();
    worker.initialize();

    let rx = post(
        &worker,
        TransformRequest::PopularCoinsSingleCurrency {
            coins_to_transform: common::sample_coins(),
            from_currency: Currency::Cad,
            to_currency: Currency::Usd,
            currency_exchange_rates: common::incomplete_rates(),
        },
    );
    let failure = rx.await.unwrap().unwrap_err();
    assert!(failure.correlation_token.is_some());
    worker.terminate();
}

#[tokio::test]
async fn cancelled_callback_is_never_invoked() {
    let worker = WorkerHandle::new();
    worker.initialize();

    let (tx, rx) = oneshot::channel::<WorkerReply>();
    let token = worker
        .post_with_callback(popular_single(Currency::Usd), move |reply| {
            let _ = tx.send(reply);
        })
        .unwrap();
    assert!(worker.cancel(&token));
    assert!(!worker.cancel(&token));

    // The sender was dropped with the cancelled callback.
    assert!(rx.await.is_err());
    worker.terminate();
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminate_drops_pending_callbacks() {
    let worker = WorkerHandle::new();
    worker.initialize();

    let rx = post(&worker, popular_single(Currency::Usd));
    assert!(worker.terminate());
    assert_eq!(worker.pending_callbacks(), 0);
    assert!(rx.await.is_err());

    assert!(!worker.is_initialized());
    assert!(worker.post_message(popular_single(Currency::Usd)).is_err());
    assert!(!worker.terminate());
}

#[tokio::test]
async fn worker_can_be_restarted_after_terminate() {
    let worker = WorkerHandle::new();
    worker.initialize();
    worker.terminate();

    assert!(worker.initialize());
    let posted = post(&worker, popular_single(Currency::Aud));
    let reply = tokio::time::timeout(Duration::from_secs(5), posted)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reply.to_currency, Some(Currency::Aud));
    worker.terminate();
}
