//! Field-level merge of detail records.
//!
//! A shallow record from a list fetch and a full record from a detail fetch
//! are combined so that nothing already known is lost: every field present on
//! the incoming record wins, every absent field keeps the existing value.
//! Series and nested structures are replaced wholesale, never concatenated.

use crate::models::CoinDetails;

fn pick<T: Clone>(incoming: &Option<T>, existing: &Option<T>) -> Option<T> {
    incoming.as_ref().or(existing.as_ref()).cloned()
}

/// Merge `incoming` into `existing`, returning the combined record.
///
/// Identity fields (`id`, `symbol`) are taken from `existing`. Applying the
/// same incoming record twice yields the same result as applying it once.
pub fn merge_details(existing: &CoinDetails, incoming: &CoinDetails) -> CoinDetails {
    CoinDetails {
        id: existing.id.clone(),
        symbol: existing.symbol.clone(),
        name: pick(&incoming.name, &existing.name),
        image: pick(&incoming.image, &existing.image),
        current_price: pick(&incoming.current_price, &existing.current_price),
        market_cap: pick(&incoming.market_cap, &existing.market_cap),
        total_volume: pick(&incoming.total_volume, &existing.total_volume),
        price_change_percentage_24h: pick(
            &incoming.price_change_percentage_24h,
            &existing.price_change_percentage_24h,
        ),
        description: pick(&incoming.description, &existing.description),
        circulating_supply: pick(&incoming.circulating_supply, &existing.circulating_supply),
        total_supply: pick(&incoming.total_supply, &existing.total_supply),
        max_supply: pick(&incoming.max_supply, &existing.max_supply),
        price_change_24h: pick(&incoming.price_change_24h, &existing.price_change_24h),
        price_change_7d: pick(&incoming.price_change_7d, &existing.price_change_7d),
        price_change_30d: pick(&incoming.price_change_30d, &existing.price_change_30d),
        price_change_365d: pick(&incoming.price_change_365d, &existing.price_change_365d),
        price_change_percentage_7d: pick(
            &incoming.price_change_percentage_7d,
            &existing.price_change_percentage_7d,
        ),
        price_change_percentage_30d: pick(
            &incoming.price_change_percentage_30d,
            &existing.price_change_percentage_30d,
        ),
        price_change_percentage_365d: pick(
            &incoming.price_change_percentage_365d,
            &existing.price_change_percentage_365d,
        ),
        price_history: pick(&incoming.price_history, &existing.price_history),
        chart: pick(&incoming.chart, &existing.chart),
    }
}

/// Merge into an optional existing record.
pub fn merge_into(existing: Option<&CoinDetails>, incoming: CoinDetails) -> CoinDetails {
    match existing {
        Some(current) => merge_details(current, &incoming),
        None => incoming,
    }
}
