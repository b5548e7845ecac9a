//! Request processing performed inside the worker.
//!
//! Everything here is a pure function of the request: no state survives
//! between calls.

use std::collections::BTreeMap;

use crate::currency::Currency;
use crate::error::TransformError;
use crate::models::{ChartDataset, CoinDetails, CoinOverview, PriceHistory, PricePoint};
use crate::worker::protocol::{
    TransformFailure, TransformRequest, TransformResponse, TransformedData, WorkerMessage,
    WorkerReply,
};

/// Process one message and build the single reply it is owed.
pub fn handle(message: WorkerMessage) -> WorkerReply {
    let WorkerMessage { request, correlation_token } = message;
    let kind = request.kind();
    let to_currency = match &request {
        TransformRequest::CoinDetailsSingleCurrency { to_currency, .. }
        | TransformRequest::PopularCoinsSingleCurrency { to_currency, .. } => Some(*to_currency),
        _ => None,
    };

    match process(&request) {
        Ok(data) => Ok(TransformResponse { data, to_currency, correlation_token }),
        Err(error) => Err(TransformFailure { kind, error, correlation_token }),
    }
}

/// Convert the payload of a request.
///
/// The rate matrix is validated first, so a missing rate fails the whole
/// request rather than leaking NaN into any field.
pub fn process(request: &TransformRequest) -> Result<TransformedData, TransformError> {
    request.rates().validate()?;

    match request {
        TransformRequest::CoinDetailsSingleCurrency {
            coin_to_transform,
            from_currency,
            to_currency,
            currency_exchange_rates,
        } => {
            let rate = currency_exchange_rates.rate(*from_currency, *to_currency)?;
            Ok(TransformedData::TransformedCoinDetailsSingleCurrency(
                transform_details(coin_to_transform, rate),
            ))
        }
        TransformRequest::CoinDetailsAllCurrencies {
            coin_to_transform,
            from_currency,
            currencies_to_exclude,
            currency_exchange_rates,
        } => {
            let mut out = BTreeMap::new();
            for to in Currency::all_except(currencies_to_exclude) {
                let rate = currency_exchange_rates.rate(*from_currency, to)?;
                out.insert(to, transform_details(coin_to_transform, rate));
            }
            Ok(TransformedData::TransformedCoinDetailsAllCurrencies(out))
        }
        TransformRequest::PopularCoinsSingleCurrency {
            coins_to_transform,
            from_currency,
            to_currency,
            currency_exchange_rates,
        } => {
            let rate = currency_exchange_rates.rate(*from_currency, *to_currency)?;
            Ok(TransformedData::TransformedPopularCoinsSingleCurrency(
                transform_overviews(coins_to_transform, rate),
            ))
        }
        TransformRequest::PopularCoinsAllCurrencies {
            coins_to_transform,
            from_currency,
            currencies_to_exclude,
            currency_exchange_rates,
        } => {
            let mut out = BTreeMap::new();
            for to in Currency::all_except(currencies_to_exclude) {
                let rate = currency_exchange_rates.rate(*from_currency, to)?;
                out.insert(to, transform_overviews(coins_to_transform, rate));
            }
            Ok(TransformedData::TransformedPopularCoinsAllCurrencies(out))
        }
    }
}

fn transform_overviews(coins: &[CoinOverview], rate: f64) -> Vec<CoinOverview> {
    coins.iter().map(|coin| transform_overview(coin, rate)).collect()
}

fn transform_overview(coin: &CoinOverview, rate: f64) -> CoinOverview {
    CoinOverview {
        current_price: coin.current_price * rate,
        market_cap: coin.market_cap * rate,
        total_volume: coin.total_volume * rate,
        ..coin.clone()
    }
}

fn transform_details(coin: &CoinDetails, rate: f64) -> CoinDetails {
    let scale = |v: Option<f64>| v.map(|x| x * rate);
    let price_history = coin.price_history.as_ref().map(|h| transform_history(h, rate));
    // Chart follows the converted series; without a history the old chart is rescaled.
    let chart = match &price_history {
        Some(history) => Some(ChartDataset::from_series(&history.day)),
        None => coin.chart.as_ref().map(|c| rescale_chart(c, rate)),
    };

    CoinDetails {
        current_price: scale(coin.current_price),
        market_cap: scale(coin.market_cap),
        total_volume: scale(coin.total_volume),
        price_change_24h: scale(coin.price_change_24h),
        price_change_7d: scale(coin.price_change_7d),
        price_change_30d: scale(coin.price_change_30d),
        price_change_365d: scale(coin.price_change_365d),
        price_history,
        chart,
        ..coin.clone()
    }
}

fn transform_history(history: &PriceHistory, rate: f64) -> PriceHistory {
    let series = |s: &[PricePoint]| -> Vec<PricePoint> {
        s.iter().map(|p| PricePoint(p.timestamp(), p.price() * rate)).collect()
    };
    PriceHistory {
        day: series(&history.day),
        week: series(&history.week),
        month: series(&history.month),
        year: series(&history.year),
    }
}

fn rescale_chart(chart: &ChartDataset, rate: f64) -> ChartDataset {
    let mut out = chart.clone();
    for point in &mut out.points {
        point.y *= rate;
    }
    out.min_price = chart.min_price.map(|v| v * rate);
    out.max_price = chart.max_price.map(|v| v * rate);
    out
}
