//! Strategy for a single coin's detail record.

use serde_json::Value;

use crate::coordinator::{CacheStrategy, KnownData};
use crate::currency::Currency;
use crate::error::{Result, TransformError};
use crate::merge::merge_into;
use crate::models::CoinDetails;
use crate::publish::PublishedUpdate;
use crate::store::{coin_details_key, CacheTable};
use crate::worker::{RequestKind, TransformRequest, TransformResponse, TransformedData};

/// Keeps one detail record per (coin, currency), merged field by field so a
/// shallow record never erases a full one.
#[derive(Debug, Clone)]
pub struct CoinDetailsStrategy {
    coin_id: String,
}

impl CoinDetailsStrategy {
    pub fn new(coin_id: &str) -> Self {
        Self { coin_id: coin_id.to_string() }
    }

    pub fn coin_id(&self) -> &str {
        &self.coin_id
    }
}

impl CacheStrategy for CoinDetailsStrategy {
    type Data = CoinDetails;

    fn table(&self) -> CacheTable {
        CacheTable::CoinDetails
    }

    fn cache_key(&self, currency: Currency) -> String {
        coin_details_key(currency, &self.coin_id)
    }

    fn dispatch_known(&self, currency: Currency, data: &Self::Data) -> PublishedUpdate {
        PublishedUpdate::CoinDetails { currency, details: data.clone() }
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
        TransformRequest::CoinDetailsAllCurrencies {
            coin_to_transform: known.data.clone(),
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
            (TransformedData::TransformedCoinDetailsAllCurrencies(by_currency), _) => {
                Ok(by_currency.into_iter().collect())
            }
            (TransformedData::TransformedCoinDetailsSingleCurrency(details), Some(currency)) => {
                Ok(vec![(currency, details)])
            }
            (other, _) => Err(TransformError::UnexpectedReply {
                expected: RequestKind::CoinDetailsAllCurrencies,
                actual: other.kind(),
            }),
        }
    }

    fn merge(&self, existing: Option<Self::Data>, incoming: Self::Data) -> Self::Data {
        merge_into(existing.as_ref(), incoming)
    }
}
