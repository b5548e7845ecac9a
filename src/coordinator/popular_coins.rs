//! Strategy for the popular-coins list.

use serde_json::Value;

use crate::coordinator::{CacheStrategy, KnownData};
use crate::currency::Currency;
use crate::error::{Result, TransformError};
use crate::models::CoinOverview;
use crate::publish::PublishedUpdate;
use crate::store::CacheTable;
use crate::worker::{RequestKind, TransformRequest, TransformResponse, TransformedData};

/// Keeps one coin list per currency. A newer list replaces the old one.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopularCoinsStrategy;

impl CacheStrategy for PopularCoinsStrategy {
    type Data = Vec<CoinOverview>;

    fn table(&self) -> CacheTable {
        CacheTable::PopularCoinsLists
    }

    fn cache_key(&self, currency: Currency) -> String {
        currency.code().to_string()
    }

    fn dispatch_known(&self, currency: Currency, data: &Self::Data) -> PublishedUpdate {
        PublishedUpdate::PopularCoins { currency, coins: data.clone() }
    }

    fn get_from_cache(&self, payload: Value) -> Result<Self::Data> {
        Ok(serde_json::from_value(payload)?)
    }

    fn encode(&self, data: &Self::Data) -> Result<Value> {
        Ok(serde_json::to_value(data)?)
    }

    fn send_to_worker(
        &self,
        known: &KnownData<Self::Data>,
        exclude: Vec<Currency>,
    ) -> TransformRequest {
        TransformRequest::PopularCoinsAllCurrencies {
            coins_to_transform: known.data.clone(),
            from_currency: known.currency,
            currencies_to_exclude: exclude,
            currency_exchange_rates: known.rates.clone(),
        }
    }

    fn handle_transformed(
        &self,
        response: TransformResponse,
    ) -> std::result::Result<Vec<(Currency, Self::Data)>, TransformError> {
        match (response.data, response.to_currency) {
            (TransformedData::TransformedPopularCoinsAllCurrencies(by_currency), _) => {
                Ok(by_currency.into_iter().collect())
            }
            (TransformedData::TransformedPopularCoinsSingleCurrency(coins), Some(currency)) => {
                Ok(vec![(currency, coins)])
            }
            (other, _) => Err(TransformError::UnexpectedReply {
                expected: RequestKind::PopularCoinsAllCurrencies,
                actual: other.kind(),
            }),
        }
    }

    fn merge(&self, _existing: Option<Self::Data>, incoming: Self::Data) -> Self::Data {
        incoming
    }
}
