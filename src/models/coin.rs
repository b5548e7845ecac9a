use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CoinOverview: one row of the popular-coins list in a single currency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinOverview {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: String,
    pub current_price: f64,
    pub market_cap: f64,
    pub total_volume: f64,
    pub price_change_percentage_24h: f64,
}

// ---------------------------------------------------------------------------
// PricePoint / PriceHistory: time series used by the detail view
// ---------------------------------------------------------------------------

/// A `[timestamp_ms, price]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint(pub i64, pub f64);

impl PricePoint {
    pub fn timestamp(&self) -> i64 {
        self.0
    }

    pub fn price(&self) -> f64 {
        self.1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    #[serde(default)]
    pub day: Vec<PricePoint>,
    #[serde(default)]
    pub week: Vec<PricePoint>,
    #[serde(default)]
    pub month: Vec<PricePoint>,
    #[serde(default)]
    pub year: Vec<PricePoint>,
}

// ---------------------------------------------------------------------------
// ChartDataset: derived from the day series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: i64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub points: Vec<ChartPoint>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl ChartDataset {
    /// Derive a chart dataset from a price series.
    pub fn from_series(series: &[PricePoint]) -> Self {
        let points: Vec<ChartPoint> = series
            .iter()
            .map(|p| ChartPoint { x: p.timestamp(), y: p.price() })
            .collect();
        let min_price = points.iter().map(|p| p.y).reduce(f64::min);
        let max_price = points.iter().map(|p| p.y).reduce(f64::max);
        Self { points, min_price, max_price }
    }
}

// ---------------------------------------------------------------------------
// CoinDetails: shallow or full detail record in a single currency
// ---------------------------------------------------------------------------

/// Per-coin detail record.
///
/// Only `id` and `symbol` are mandatory. A *shallow* record carries just the
/// overview-level fields (built from a list row via [`CoinDetails::shallow`]);
/// a *full* record also has the description and price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinDetails {
    pub id: String,
    pub symbol: String,

    // -- Overview fields --
    pub name: Option<String>,
    pub image: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,

    // -- Detail fields --
    pub description: Option<String>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub price_change_7d: Option<f64>,
    pub price_change_30d: Option<f64>,
    pub price_change_365d: Option<f64>,
    pub price_change_percentage_7d: Option<f64>,
    pub price_change_percentage_30d: Option<f64>,
    pub price_change_percentage_365d: Option<f64>,
    pub price_history: Option<PriceHistory>,
    pub chart: Option<ChartDataset>,
}

impl CoinDetails {
    /// An empty record carrying only the identity fields.
    pub fn new(id: &str, symbol: &str) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: None,
            image: None,
            current_price: None,
            market_cap: None,
            total_volume: None,
            price_change_percentage_24h: None,
            description: None,
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            price_change_24h: None,
            price_change_7d: None,
            price_change_30d: None,
            price_change_365d: None,
            price_change_percentage_7d: None,
            price_change_percentage_30d: None,
            price_change_percentage_365d: None,
            price_history: None,
            chart: None,
        }
    }

    /// Build a shallow record from a list row.
    pub fn shallow(overview: &CoinOverview) -> Self {
        Self {
            name: Some(overview.name.clone()),
            image: Some(overview.image.clone()),
            current_price: Some(overview.current_price),
            market_cap: Some(overview.market_cap),
            total_volume: Some(overview.total_volume),
            price_change_percentage_24h: Some(overview.price_change_percentage_24h),
            ..Self::new(&overview.id, &overview.symbol)
        }
    }

    /// Whether the detail-only fields have been populated.
    pub fn is_full(&self) -> bool {
        self.description.is_some() && self.price_history.is_some()
    }
}
