//! Derives campaign metadata from computed pricing.

use super::model::{CampaignMetadata, DateRange, PriceData, RouteEntry};
use std::collections::HashSet;

/// Number of distinct origin/destination pairs quoted.
#[must_use]
pub fn routes_analyzed(prices: &PriceData) -> u32 {
    let pairs: HashSet<(&str, &str)> = prices
        .routes
        .iter()
        .map(|route| (route.origin.as_str(), route.destination.as_str()))
        .collect();
    saturating_count(pairs.len())
}

/// Number of quotes carrying a usable price.
#[must_use]
pub fn prices_found(prices: &PriceData) -> u32 {
    saturating_count(prices.routes.iter().filter(|route| has_price(route)).count())
}

/// Travel windows covered by the quotes, in first-seen order.
///
/// One-way quotes yield a single-day window.
#[must_use]
pub fn date_ranges(prices: &PriceData) -> Vec<DateRange> {
    let mut ranges = Vec::new();
    for route in &prices.routes {
        let Some(start) = route.departure_date else {
            continue;
        };
        let end = route.return_date.unwrap_or(start).max(start);
        let range = DateRange { start, end };
        if !ranges.contains(&range) {
            ranges.push(range);
        }
    }
    ranges
}

/// Builds the metadata counters implied by `prices`.
#[must_use]
pub fn metadata_from_prices(prices: &PriceData) -> CampaignMetadata {
    CampaignMetadata {
        routes_analyzed: routes_analyzed(prices),
        prices_found: prices_found(prices),
        date_ranges: date_ranges(prices),
        ..CampaignMetadata::default()
    }
}

/// Fills counters the stage left at zero with values derived from `prices`.
pub fn fill_from_prices(metadata: &mut CampaignMetadata, prices: &PriceData) {
    let derived = metadata_from_prices(prices);
    if metadata.routes_analyzed == 0 {
        metadata.routes_analyzed = derived.routes_analyzed;
    }
    if metadata.prices_found == 0 {
        metadata.prices_found = derived.prices_found;
    }
    if metadata.date_ranges.is_empty() {
        metadata.date_ranges = derived.date_ranges;
    }
}

fn has_price(route: &RouteEntry) -> bool {
    route.price.is_finite() && route.price > 0.0
}

fn saturating_count(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
