//! Exchange-rate matrix and the conversion function.
//!
//! `rate(from, to)` is the multiplier that turns an amount in `from` into an
//! amount in `to`. A complete matrix has an entry for every ordered pair of
//! [`Currency::ALL`], with `rate(X, X) == 1`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::error::TransformError;

/// Mapping `from -> to -> multiplicative rate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRateMatrix {
    rates: BTreeMap<Currency, BTreeMap<Currency, f64>>,
}

impl ExchangeRateMatrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a consistent matrix from quotes against a single base currency.
    ///
    /// `quotes[C]` is the price of one unit of `base` expressed in `C`; the base
    /// itself is implicitly `1.0`. The resulting matrix satisfies
    /// `rate(A, B) * rate(B, C) == rate(A, C)` up to floating-point error.
    pub fn from_quotes(base: Currency, quotes: &BTreeMap<Currency, f64>) -> Self {
        let quote = |c: Currency| if c == base { Some(1.0) } else { quotes.get(&c).copied() };

        let mut matrix = Self::new();
        for from in Currency::ALL {
            for to in Currency::ALL {
                if let (Some(qf), Some(qt)) = (quote(from), quote(to)) {
                    let rate = if from == to { 1.0 } else { qt / qf };
                    matrix.set(from, to, rate);
                }
            }
        }
        matrix
    }

    /// Set a single rate.
    pub fn set(&mut self, from: Currency, to: Currency, rate: f64) -> &mut Self {
        self.rates.entry(from).or_default().insert(to, rate);
        self
    }

    /// Look up `rate(from, to)` without validation.
    pub fn get(&self, from: Currency, to: Currency) -> Option<f64> {
        self.rates.get(&from).and_then(|row| row.get(&to)).copied()
    }

    /// Look up `rate(from, to)`, failing on a missing or unusable entry.
    pub fn rate(&self, from: Currency, to: Currency) -> Result<f64, TransformError> {
        let rate = self
            .get(from, to)
            .ok_or(TransformError::MissingRate { from, to })?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(TransformError::NonFiniteRate { from, to, rate });
        }
        Ok(rate)
    }

    /// The row of rates out of `from`, if any.
    pub fn row(&self, from: Currency) -> Option<&BTreeMap<Currency, f64>> {
        self.rates.get(&from)
    }

    /// Check that every ordered pair of supported currencies has a usable rate.
    ///
    /// Conversions are only attempted against a validated matrix, so a
    /// missing entry surfaces as an error instead of a NaN price.
    pub fn validate(&self) -> Result<(), TransformError> {
        for from in Currency::ALL {
            for to in Currency::ALL {
                self.rate(from, to)?;
            }
        }
        Ok(())
    }

    /// Whether [`validate`](Self::validate) would succeed.
    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Convert `value` from one currency to another: `value * rate[from][to]`.
///
/// No rounding is applied; display formatting is left to the caller.
pub fn convert(
    value: f64,
    from: Currency,
    to: Currency,
    rates: &ExchangeRateMatrix,
) -> Result<f64, TransformError> {
    if from == to {
        return Ok(value);
    }
    Ok(value * rates.rate(from, to)?)
}
