use std::collections::{BTreeMap, HashMap};

use crate::core::normalizer::MAX_GRADE_COMPLEXITY;
use crate::models::{Factor, FactorWeights, ProviderFactors, SimilarityResult};

/// Scale floors keep small populations from looking wildly dissimilar
const STUDENT_FLOOR: f64 = 100.0;
const EXPERIENCE_FLOOR: f64 = 100.0;
const CREDENTIALS_FLOOR: f64 = 20.0;
const ACCOUNT_AGE_FLOOR_DAYS: f64 = 1095.0;

const MAX_RATING: f64 = 5.0;
const SESSION_MISMATCH_SCORE: f64 = 0.5;

/// Country to broader-region lookup used for partial location credit
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTable {
    regions: HashMap<String, String>,
    same_region_score: f64,
}

impl RegionTable {
    pub fn new(regions: HashMap<String, String>, same_region_score: f64) -> Self {
        let regions = regions
            .iter()
            .map(|(country, region)| (fold_name(country), fold_name(region)))
            .collect();

        Self {
            regions,
            same_region_score,
        }
    }

    /// Layer extra country mappings on top; an override always beats a default
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        let mut entries: Vec<(&String, &String)> = overrides.iter().collect();
        entries.sort();

        for (country, region) in entries {
            self.regions.insert(fold_name(country), fold_name(region));
        }
        self
    }

    pub fn default_regions() -> HashMap<String, String> {
        let table: &[(&str, &[&str])] = &[
            ("north_america", &["us", "usa", "united states", "canada", "mexico"]),
            ("south_america", &["brazil", "argentina", "colombia", "chile", "peru"]),
            (
                "europe",
                &[
                    "uk", "united kingdom", "ireland", "germany", "france", "spain", "italy",
                    "netherlands", "portugal", "poland", "sweden",
                ],
            ),
            ("africa", &["nigeria", "ghana", "kenya", "south africa", "egypt", "ethiopia"]),
            (
                "asia",
                &["india", "pakistan", "china", "japan", "philippines", "singapore", "indonesia"],
            ),
            ("oceania", &["australia", "new zealand"]),
        ];

        table
            .iter()
            .flat_map(|(region, countries)| {
                countries
                    .iter()
                    .map(move |country| (country.to_string(), region.to_string()))
            })
            .collect()
    }

    pub fn same_region_score(&self) -> f64 {
        self.same_region_score
    }

    pub fn region_of(&self, country: &str) -> Option<&str> {
        self.regions.get(country).map(String::as_str)
    }
}

fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new(Self::default_regions(), 0.6)
    }
}

#[inline]
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// `1 - min(|a - b| / max(a, b, floor), 1)`
#[inline]
fn ratio_similarity(a: f64, b: f64, floor: f64) -> f64 {
    let scale = a.max(b).max(floor);
    clamp_unit(1.0 - ((a - b).abs() / scale).min(1.0))
}

#[inline]
pub fn rating_similarity(a: f64, b: f64) -> f64 {
    clamp_unit(1.0 - ((a - b).abs() / MAX_RATING).min(1.0))
}

#[inline]
pub fn completion_similarity(a: f64, b: f64) -> f64 {
    clamp_unit(1.0 - (a - b).abs())
}

#[inline]
pub fn student_similarity(a: u32, b: u32) -> f64 {
    ratio_similarity(f64::from(a), f64::from(b), STUDENT_FLOOR)
}

#[inline]
pub fn experience_similarity(a: f64, b: f64) -> f64 {
    ratio_similarity(a, b, EXPERIENCE_FLOOR)
}

#[inline]
pub fn account_age_similarity(a: u32, b: u32) -> f64 {
    ratio_similarity(f64::from(a), f64::from(b), ACCOUNT_AGE_FLOOR_DAYS)
}

#[inline]
pub fn credentials_similarity(a: u32, b: u32) -> f64 {
    ratio_similarity(f64::from(a), f64::from(b), CREDENTIALS_FLOOR)
}

#[inline]
pub fn grade_similarity(a: f64, b: f64) -> f64 {
    clamp_unit(1.0 - ((a - b).abs() / MAX_GRADE_COMPLEXITY).min(1.0))
}

#[inline]
pub fn session_similarity(a: crate::models::SessionFormat, b: crate::models::SessionFormat) -> f64 {
    if a == b {
        1.0
    } else {
        SESSION_MISMATCH_SCORE
    }
}

/// Location similarity, or `None` when either side has no country
///
/// A missing country removes the factor from the weighted score instead of
/// counting as a match or a mismatch.
pub fn location_similarity(a: Option<&str>, b: Option<&str>, regions: &RegionTable) -> Option<f64> {
    let (a, b) = (a?, b?);
    if a == b {
        return Some(1.0);
    }

    match (regions.region_of(a), regions.region_of(b)) {
        (Some(ra), Some(rb)) if ra == rb => Some(clamp_unit(regions.same_region_score())),
        _ => Some(0.0),
    }
}

/// Per-factor similarity of a candidate to the requester
pub fn factor_scores(
    requester: &ProviderFactors,
    candidate: &ProviderFactors,
    regions: &RegionTable,
) -> BTreeMap<Factor, f64> {
    let mut scores = BTreeMap::new();

    scores.insert(Factor::Rating, rating_similarity(requester.rating, candidate.rating));
    scores.insert(
        Factor::Completion,
        completion_similarity(requester.completion_rate, candidate.completion_rate),
    );
    scores.insert(
        Factor::StudentCount,
        student_similarity(requester.student_count, candidate.student_count),
    );
    scores.insert(
        Factor::Experience,
        experience_similarity(requester.experience_score, candidate.experience_score),
    );
    scores.insert(
        Factor::AccountAge,
        account_age_similarity(requester.account_age_days, candidate.account_age_days),
    );
    scores.insert(
        Factor::SessionFormat,
        session_similarity(requester.session_format, candidate.session_format),
    );
    if let Some(location) = location_similarity(
        requester.country.as_deref(),
        candidate.country.as_deref(),
        regions,
    ) {
        scores.insert(Factor::Location, location);
    }
    scores.insert(
        Factor::GradeLevel,
        grade_similarity(requester.grade_complexity, candidate.grade_complexity),
    );
    scores.insert(
        Factor::Credentials,
        credentials_similarity(requester.credentials_count, candidate.credentials_count),
    );

    scores
}

/// Weighted aggregate over the factors present
///
/// Weights of omitted factors are redistributed proportionally, so a full
/// set of perfect scores is always exactly 1.0.
pub fn weighted_score(scores: &BTreeMap<Factor, f64>, weights: &FactorWeights) -> f64 {
    let (total, weight_sum) = Factor::ALL
        .iter()
        .filter_map(|factor| scores.get(factor).map(|score| (weights.get(*factor), *score)))
        .fold((0.0, 0.0), |(total, weight_sum), (weight, score)| {
            (total + weight * score, weight_sum + weight)
        });

    if weight_sum <= 0.0 {
        return 0.0;
    }

    clamp_unit(total / weight_sum)
}

/// Score one candidate against the requester
pub fn calculate_similarity(
    requester: &ProviderFactors,
    candidate: &ProviderFactors,
    weights: &FactorWeights,
    regions: &RegionTable,
) -> SimilarityResult {
    let per_factor_scores = factor_scores(requester, candidate, regions);
    let weighted_score = weighted_score(&per_factor_scores, weights);

    SimilarityResult {
        provider_id: candidate.provider_id.clone(),
        per_factor_scores,
        weighted_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionFormat;

    fn provider(id: &str) -> ProviderFactors {
        ProviderFactors {
            provider_id: id.to_string(),
            rating: 4.2,
            completion_rate: 0.8,
            student_count: 40,
            credentials_count: 3,
            experience_score: 15.0,
            account_age_days: 500,
            location: Some("Toronto, Canada".to_string()),
            country: Some("canada".to_string()),
            grade_levels: vec!["high_school".to_string()],
            grade_complexity: 8.0,
            session_format: SessionFormat::Online,
            price_per_hour: Some(45.0),
        }
    }

    #[test]
    fn test_rating_similarity() {
        assert_eq!(rating_similarity(4.5, 4.5), 1.0);
        assert!((rating_similarity(4.5, 2.0) - 0.5).abs() < 1e-12);
        assert_eq!(rating_similarity(0.0, 5.0), 0.0);
    }

    #[test]
    fn test_ratio_similarity_uses_floor() {
        // 10 vs 30 students: difference 20 over floor 100
        assert!((student_similarity(10, 30) - 0.8).abs() < 1e-12);
        // 200 vs 400: difference 200 over 400
        assert!((student_similarity(200, 400) - 0.5).abs() < 1e-12);
        assert_eq!(student_similarity(0, 0), 1.0);
        assert!((credentials_similarity(0, 4) - 0.8).abs() < 1e-12);
        assert!((account_age_similarity(1, 1096) - (1.0 - 1095.0 / 1096.0)).abs() < 1e-12);
    }

    #[test]
    fn test_session_similarity() {
        assert_eq!(session_similarity(SessionFormat::Online, SessionFormat::Online), 1.0);
        assert_eq!(session_similarity(SessionFormat::Online, SessionFormat::Hybrid), 0.5);
        assert_eq!(session_similarity(SessionFormat::All, SessionFormat::InPerson), 0.5);
    }

    #[test]
    fn test_location_similarity() {
        let regions = RegionTable::default();
        assert_eq!(location_similarity(Some("canada"), Some("canada"), &regions), Some(1.0));
        assert_eq!(location_similarity(Some("canada"), Some("usa"), &regions), Some(0.6));
        assert_eq!(location_similarity(Some("canada"), Some("kenya"), &regions), Some(0.0));
        assert_eq!(location_similarity(Some("atlantis"), Some("lemuria"), &regions), Some(0.0));
        assert_eq!(location_similarity(None, Some("canada"), &regions), None);
    }

    #[test]
    fn test_self_similarity_is_one() {
        let p = provider("a");
        let result = calculate_similarity(&p, &p, &FactorWeights::default(), &RegionTable::default());

        assert_eq!(result.weighted_score, 1.0);
        assert_eq!(result.per_factor_scores.len(), 9);
    }

    #[test]
    fn test_missing_location_redistributes_weight() {
        let mut a = provider("a");
        let mut b = provider("b");
        a.country = None;
        b.rating = 3.2;

        let result = calculate_similarity(&a, &b, &FactorWeights::default(), &RegionTable::default());
        assert!(!result.per_factor_scores.contains_key(&Factor::Location));

        // Only rating differs; location drops out of both numerator and denominator
        let weights = FactorWeights::default();
        let rating_sim = rating_similarity(4.2, 3.2);
        let expected = (weights.sum() - weights.location - weights.rating + weights.rating * rating_sim)
            / (weights.sum() - weights.location);
        assert!((result.weighted_score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = provider("a");
        let mut b = provider("b");
        b.rating = 2.9;
        b.completion_rate = 0.35;
        b.student_count = 260;
        b.credentials_count = 12;
        b.experience_score = 60.0;
        b.account_age_days = 30;
        b.country = Some("usa".to_string());
        b.grade_complexity = 13.0;
        b.session_format = SessionFormat::InPerson;

        let weights = FactorWeights::default();
        let regions = RegionTable::default();
        let ab = calculate_similarity(&a, &b, &weights, &regions);
        let ba = calculate_similarity(&b, &a, &weights, &regions);

        assert_eq!(ab.per_factor_scores, ba.per_factor_scores);
        assert!((ab.weighted_score - ba.weighted_score).abs() < 1e-12);
    }

    #[test]
    fn test_scores_within_unit_interval() {
        let a = provider("a");
        let mut b = provider("b");
        b.rating = 0.0;
        b.completion_rate = 0.0;
        b.student_count = u32::MAX;
        b.credentials_count = u32::MAX;
        b.experience_score = 100.0;
        b.account_age_days = u32::MAX;
        b.grade_complexity = 1.0;
        b.country = Some("japan".to_string());

        let result = calculate_similarity(&a, &b, &FactorWeights::default(), &RegionTable::default());
        for score in result.per_factor_scores.values() {
            assert!((0.0..=1.0).contains(score), "score {} out of range", score);
        }
        assert!((0.0..=1.0).contains(&result.weighted_score));
    }
}
