//! The closed set of display currencies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoinCacheError;

/// A supported display currency.
///
/// The set is fixed: every cached table holds exactly one entry per currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Cad,
    Usd,
    Aud,
    Gbp,
}

impl Currency {
    /// Every supported currency, in canonical order.
    pub const ALL: [Currency; 4] = [Currency::Cad, Currency::Usd, Currency::Aud, Currency::Gbp];

    /// The ISO code used as a cache key and wire value (e.g. `"CAD"`).
    pub fn code(self) -> &'static str {
        match self {
            Currency::Cad => "CAD",
            Currency::Usd => "USD",
            Currency::Aud => "AUD",
            Currency::Gbp => "GBP",
        }
    }

    /// All currencies except the given ones, in canonical order.
    pub fn all_except(excluded: &[Currency]) -> Vec<Currency> {
        Self::ALL
            .into_iter()
            .filter(|c| !excluded.contains(c))
            .collect()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CoinCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CAD" => Ok(Currency::Cad),
            "USD" => Ok(Currency::Usd),
            "AUD" => Ok(Currency::Aud),
            "GBP" => Ok(Currency::Gbp),
            other => Err(CoinCacheError::InvalidArgument(format!(
                "Unsupported currency: {}",
                other
            ))),
        }
    }
}
