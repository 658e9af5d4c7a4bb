use chrono::{DateTime, Months, Utc};
use std::collections::HashSet;

use crate::core::normalizer::{normalize_profile, GradeScale};
use crate::models::{CandidatePool, CandidateRecord, Listing, PricePoint, PricingQuery};

/// Start of the trailing price window
pub fn window_start(now: DateTime<Utc>, time_period_months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(time_period_months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Check whether a provider has a listing satisfying the format and course filters
///
/// With neither filter set any provider qualifies, listed or not.
#[inline]
pub fn has_matching_listing(listings: &[Listing], query: &PricingQuery) -> bool {
    let format = query.filters.session_format.and_then(|f| f.as_filter());
    let courses = &query.filters.course_ids;

    if format.is_none() && courses.is_empty() {
        return true;
    }

    listings.iter().any(|listing| {
        listing.is_active
            && format.map_or(true, |f| listing.session_format == f)
            && (courses.is_empty() || courses.contains(&listing.course_id))
    })
}

/// Most recent positive price observed inside the window
#[inline]
pub fn latest_price_in_window(
    price_points: &[PricePoint],
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<&PricePoint> {
    price_points
        .iter()
        .filter(|p| p.price_per_hour.is_finite() && p.price_per_hour > 0.0)
        .filter(|p| p.observed_at >= since && p.observed_at <= now)
        .max_by(|a, b| {
            a.observed_at
                .cmp(&b.observed_at)
                .then_with(|| a.price_per_hour.total_cmp(&b.price_per_hour))
        })
}

/// Build the comparable population for a request
///
/// Excludes the requester, drops providers without an in-window price and
/// applies the listing filters. Returns an empty pool rather than failing.
pub fn select_population(
    records: Vec<CandidateRecord>,
    query: &PricingQuery,
    scale: &GradeScale,
    now: DateTime<Utc>,
) -> CandidatePool {
    let since = window_start(now, query.time_period_months);
    let mut seen: HashSet<String> = HashSet::new();

    let candidates = records
        .into_iter()
        // Exclude self
        .filter(|record| record.profile.provider_id != query.requester_id)
        .filter(|record| has_matching_listing(&record.listings, query))
        .filter_map(|record| {
            let price = latest_price_in_window(&record.price_points, since, now)?.price_per_hour;

            if !seen.insert(record.profile.provider_id.clone()) {
                tracing::debug!("Skipping duplicate candidate {}", record.profile.provider_id);
                return None;
            }

            let mut factors = normalize_profile(&record.profile, scale, now);
            factors.price_per_hour = Some(price);
            Some(factors)
        })
        .collect();

    CandidatePool::new(candidates)
}
