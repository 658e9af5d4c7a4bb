use std::collections::BTreeMap;

use crate::models::{PriceRange, RatingBucket, ScoredCandidate};

/// Price figures derived from the similar set and the full pool
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceAggregate {
    pub market_average: Option<f64>,
    pub suggested_price: Option<f64>,
    pub price_range: Option<PriceRange>,
    pub rating_breakdown: Vec<RatingBucket>,
}

/// Arithmetic mean, `None` for an empty set
#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Min and max over a set of prices
pub fn min_max(prices: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    prices.into_iter().fold(None, |acc, price| match acc {
        None => Some((price, price)),
        Some((min, max)) => Some((min.min(price), max.max(price))),
    })
}

/// Similarity-weighted mean price
///
/// Falls back to the plain mean when every weight is zero.
pub fn similarity_weighted_price(similar: &[ScoredCandidate]) -> Option<f64> {
    let (weighted, weight_sum) = similar.iter().fold((0.0, 0.0), |(weighted, weight_sum), c| {
        let weight = c.similarity.weighted_score;
        (weighted + weight * c.price_per_hour, weight_sum + weight)
    });

    if weight_sum > 0.0 {
        Some(weighted / weight_sum)
    } else {
        let prices: Vec<f64> = similar.iter().map(|c| c.price_per_hour).collect();
        mean(&prices)
    }
}

/// Round a rating to the nearest half star
#[inline]
pub fn rating_bucket(rating: f64) -> f64 {
    (rating * 2.0).round() / 2.0
}

/// Count and average price per half-star rating bucket, lowest rating first
pub fn rating_breakdown(similar: &[ScoredCandidate]) -> Vec<RatingBucket> {
    // Keyed by half-stars so the map orders numerically
    let mut buckets: BTreeMap<i64, (usize, f64)> = BTreeMap::new();

    for candidate in similar {
        let key = (rating_bucket(candidate.rating) * 2.0) as i64;
        let entry = buckets.entry(key).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += candidate.price_per_hour;
    }

    buckets
        .into_iter()
        .map(|(half_stars, (count, total))| RatingBucket {
            rating: half_stars as f64 / 2.0,
            count,
            average_price: total / count as f64,
        })
        .collect()
}

/// Reduce the similar set and the pool prices into the final price figures
///
/// `pool_prices` spans the full candidate pool so the range reports the market
/// floor and ceiling, not just the similar providers.
pub fn aggregate_prices(
    similar: &[ScoredCandidate],
    pool_prices: impl IntoIterator<Item = f64>,
    tolerance: f64,
) -> PriceAggregate {
    let similar_prices: Vec<f64> = similar.iter().map(|c| c.price_per_hour).collect();
    let market_average = mean(&similar_prices);
    let bounds = min_max(pool_prices);

    let suggested_price = similarity_weighted_price(similar).map(|price| match bounds {
        Some((min, max)) => price.clamp(min, max),
        None => price,
    });

    let price_range = bounds.map(|(min, max)| PriceRange {
        min,
        max,
        suggested_min: suggested_price.map(|p| p * (1.0 - tolerance)),
        suggested_max: suggested_price.map(|p| p * (1.0 + tolerance)),
    });

    PriceAggregate {
        market_average,
        suggested_price,
        price_range,
        rating_breakdown: rating_breakdown(similar),
    }
}
