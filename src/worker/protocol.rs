//! Messages exchanged with the transform worker.
//!
//! The JSON form of a request is
//! `{"requestType": "...", "requestData": {...}}`; a response is
//! `{"responseType": "TRANSFORMED_...", "transformedData": ...}` with optional
//! `toCurrency` and `correlationToken` fields.
//! Inside the crate messages are moved to the worker as owned values.

use std::collections::BTreeMap;
use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::error::TransformError;
use crate::models::{CoinDetails, CoinOverview};
use crate::rates::ExchangeRateMatrix;

// ---------------------------------------------------------------------------
// CorrelationToken
// ---------------------------------------------------------------------------

/// Opaque token tying a worker response back to the request that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TransformRequest
// ---------------------------------------------------------------------------

/// A unit of conversion work for the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "requestType",
    content = "requestData",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum TransformRequest {
    CoinDetailsSingleCurrency {
        coin_to_transform: CoinDetails,
        from_currency: Currency,
        to_currency: Currency,
        currency_exchange_rates: ExchangeRateMatrix,
    },
    CoinDetailsAllCurrencies {
        coin_to_transform: CoinDetails,
        from_currency: Currency,
        #[serde(default)]
        currencies_to_exclude: Vec<Currency>,
        currency_exchange_rates: ExchangeRateMatrix,
    },
    PopularCoinsSingleCurrency {
        coins_to_transform: Vec<CoinOverview>,
        from_currency: Currency,
        to_currency: Currency,
        currency_exchange_rates: ExchangeRateMatrix,
    },
    PopularCoinsAllCurrencies {
        coins_to_transform: Vec<CoinOverview>,
        from_currency: Currency,
        #[serde(default)]
        currencies_to_exclude: Vec<Currency>,
        currency_exchange_rates: ExchangeRateMatrix,
    },
}

impl TransformRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            TransformRequest::CoinDetailsSingleCurrency { .. } => {
                RequestKind::CoinDetailsSingleCurrency
            }
            TransformRequest::CoinDetailsAllCurrencies { .. } => {
                RequestKind::CoinDetailsAllCurrencies
            }
            TransformRequest::PopularCoinsSingleCurrency { .. } => {
                RequestKind::PopularCoinsSingleCurrency
            }
            TransformRequest::PopularCoinsAllCurrencies { .. } => {
                RequestKind::PopularCoinsAllCurrencies
            }
        }
    }

    pub fn from_currency(&self) -> Currency {
        match self {
            TransformRequest::CoinDetailsSingleCurrency { from_currency, .. }
            | TransformRequest::CoinDetailsAllCurrencies { from_currency, .. }
            | TransformRequest::PopularCoinsSingleCurrency { from_currency, .. }
            | TransformRequest::PopularCoinsAllCurrencies { from_currency, .. } => *from_currency,
        }
    }

    pub fn rates(&self) -> &ExchangeRateMatrix {
        match self {
            TransformRequest::CoinDetailsSingleCurrency { currency_exchange_rates, .. }
            | TransformRequest::CoinDetailsAllCurrencies { currency_exchange_rates, .. }
            | TransformRequest::PopularCoinsSingleCurrency { currency_exchange_rates, .. }
            | TransformRequest::PopularCoinsAllCurrencies { currency_exchange_rates, .. } => {
                currency_exchange_rates
            }
        }
    }
}

/// Discriminant of a [`TransformRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    CoinDetailsSingleCurrency,
    CoinDetailsAllCurrencies,
    PopularCoinsSingleCurrency,
    PopularCoinsAllCurrencies,
}

// ---------------------------------------------------------------------------
// TransformedData / TransformResponse
// ---------------------------------------------------------------------------

/// The converted payload, mirroring the request variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "responseType",
    content = "transformedData",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum TransformedData {
    TransformedCoinDetailsSingleCurrency(CoinDetails),
    TransformedCoinDetailsAllCurrencies(BTreeMap<Currency, CoinDetails>),
    TransformedPopularCoinsSingleCurrency(Vec<CoinOverview>),
    TransformedPopularCoinsAllCurrencies(BTreeMap<Currency, Vec<CoinOverview>>),
}

impl TransformedData {
    pub fn kind(&self) -> RequestKind {
        match self {
            TransformedData::TransformedCoinDetailsSingleCurrency(_) => {
                RequestKind::CoinDetailsSingleCurrency
            }
            TransformedData::TransformedCoinDetailsAllCurrencies(_) => {
                RequestKind::CoinDetailsAllCurrencies
            }
            TransformedData::TransformedPopularCoinsSingleCurrency(_) => {
                RequestKind::PopularCoinsSingleCurrency
            }
            TransformedData::TransformedPopularCoinsAllCurrencies(_) => {
                RequestKind::PopularCoinsAllCurrencies
            }
        }
    }
}

/// A successful worker reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResponse {
    #[serde(flatten)]
    pub data: TransformedData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<CorrelationToken>,
}

/// A failed worker reply. Still carries the correlation token so the
/// waiting caller is released.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformFailure {
    pub kind: RequestKind,
    pub error: TransformError,
    pub correlation_token: Option<CorrelationToken>,
}

/// What the worker posts back for every request.
pub type WorkerReply = Result<TransformResponse, TransformFailure>;

/// A request together with the token of its pending callback, if any.
///
/// On the wire the token sits beside `requestType`/`requestData`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMessage {
    #[serde(flatten)]
    pub request: TransformRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<CorrelationToken>,
}

/// The correlation token of a reply, successful or not.
pub fn reply_token(reply: &WorkerReply) -> Option<&CorrelationToken> {
    match reply {
        Ok(response) => response.correlation_token.as_ref(),
        Err(failure) => failure.correlation_token.as_ref(),
    }
}
