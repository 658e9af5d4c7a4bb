use chrono::{DateTime, Utc};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::PricingSettings;
use crate::core::{
    confidence::{confidence_level, filter_similar, ConfidenceThresholds},
    normalizer::{normalize_requester, GradeScale},
    population::select_population,
    pricing::aggregate_prices,
    similarity::{calculate_similarity, RegionTable},
};
use crate::models::{
    CandidatePool, CandidateRecord, FactorWeights, PriceSuggestion, PricingQuery, ProviderFactors,
    RawProviderRecord, ScoredCandidate,
};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Bounds for the default trailing window, matching the request validator
pub const MIN_TIME_PERIOD_MONTHS: u32 = 1;
pub const MAX_TIME_PERIOD_MONTHS: u32 = 36;

/// Errors raised while validating engine configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigValidationError {
    #[error("Factor weights must sum to 1.0, got {0}")]
    WeightSum(f64),

    #[error("Factor weight for {0} must be a non-negative number")]
    InvalidWeight(&'static str),

    #[error("Similarity threshold must be within [0, 1], got {0}")]
    Threshold(f64),

    #[error("Medium confidence minimum ({medium}) exceeds high confidence minimum ({high})")]
    ConfidenceOrder { medium: usize, high: usize },

    #[error("Price tolerance must be within [0, 1), got {0}")]
    Tolerance(f64),

    #[error("Same-region score must be within [0, 1], got {0}")]
    RegionScore(f64),

    #[error("Default time period must be within 1-36 months, got {0}")]
    TimePeriod(u32),
}

/// Every constant the engine depends on, validated once at construction
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    version: String,
    weights: FactorWeights,
    similarity_threshold: f64,
    confidence: ConfidenceThresholds,
    price_tolerance: f64,
    grade_scale: GradeScale,
    regions: RegionTable,
    parallel_threshold: usize,
}

impl EngineConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: impl Into<String>,
        weights: FactorWeights,
        similarity_threshold: f64,
        confidence: ConfidenceThresholds,
        price_tolerance: f64,
        grade_scale: GradeScale,
        regions: RegionTable,
        parallel_threshold: usize,
    ) -> Result<Self, ConfigValidationError> {
        validate_weights(&weights)?;

        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(ConfigValidationError::Threshold(similarity_threshold));
        }
        if confidence.medium_min > confidence.high_min {
            return Err(ConfigValidationError::ConfidenceOrder {
                medium: confidence.medium_min,
                high: confidence.high_min,
            });
        }
        if !(0.0..1.0).contains(&price_tolerance) {
            return Err(ConfigValidationError::Tolerance(price_tolerance));
        }
        if !(0.0..=1.0).contains(&regions.same_region_score()) {
            return Err(ConfigValidationError::RegionScore(regions.same_region_score()));
        }

        Ok(Self {
            version: version.into(),
            weights,
            similarity_threshold,
            confidence,
            price_tolerance,
            grade_scale,
            regions,
            parallel_threshold,
        })
    }

    /// Build from the `[pricing]` settings section
    pub fn from_settings(settings: &PricingSettings) -> Result<Self, ConfigValidationError> {
        if !(MIN_TIME_PERIOD_MONTHS..=MAX_TIME_PERIOD_MONTHS)
            .contains(&settings.default_time_period_months)
        {
            return Err(ConfigValidationError::TimePeriod(
                settings.default_time_period_months,
            ));
        }

        let grade_scale = GradeScale::new(
            GradeScale::default_levels(),
            settings.grade_selection,
            settings.default_grade_complexity,
        )
        .with_overrides(&settings.grade_scale);

        let regions = RegionTable::new(RegionTable::default_regions(), settings.same_region_score)
            .with_overrides(&settings.regions);

        Self::new(
            settings.version.clone(),
            settings.weights.to_factor_weights(),
            settings.similarity_threshold,
            ConfidenceThresholds {
                high_min: settings.high_confidence_min,
                medium_min: settings.medium_confidence_min,
            },
            settings.price_tolerance,
            grade_scale,
            regions,
            settings.parallel_threshold,
        )
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn weights(&self) -> &FactorWeights {
        &self.weights
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn confidence(&self) -> &ConfidenceThresholds {
        &self.confidence
    }

    pub fn price_tolerance(&self) -> f64 {
        self.price_tolerance
    }

    pub fn grade_scale(&self) -> &GradeScale {
        &self.grade_scale
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "v2".to_string(),
            weights: FactorWeights::default(),
            similarity_threshold: 0.65,
            confidence: ConfidenceThresholds::default(),
            price_tolerance: 0.10,
            grade_scale: GradeScale::default(),
            regions: RegionTable::default(),
            parallel_threshold: 256,
        }
    }
}

fn validate_weights(weights: &FactorWeights) -> Result<(), ConfigValidationError> {
    let named = [
        ("rating", weights.rating),
        ("completion", weights.completion),
        ("student_count", weights.student_count),
        ("experience", weights.experience),
        ("account_age", weights.account_age),
        ("session_format", weights.session_format),
        ("location", weights.location),
        ("grade_level", weights.grade_level),
        ("credentials", weights.credentials),
    ];

    if let Some((name, _)) = named.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
        return Err(ConfigValidationError::InvalidWeight(*name));
    }

    let sum = weights.sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ConfigValidationError::WeightSum(sum));
    }

    Ok(())
}

/// Output of one engine run
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub suggestion: PriceSuggestion,
    /// Every candidate in the pool, best match first
    pub scored: Vec<ScoredCandidate>,
}

impl Recommendation {
    /// Candidates above the similarity threshold, best match first
    pub fn similar(&self, threshold: f64) -> impl Iterator<Item = &ScoredCandidate> {
        self.scored
            .iter()
            .filter(move |c| c.similarity.weighted_score > threshold)
    }
}

/// Pricing orchestrator
///
/// # Pipeline Stages
/// 1. Normalize the requester
/// 2. Select the comparable population
/// 3. Score every candidate
/// 4. Filter by similarity and derive confidence
/// 5. Aggregate prices
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: EngineConfig,
}

impl PricingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the whole pipeline from raw data-store records
    pub fn recommend(
        &self,
        requester: &RawProviderRecord,
        records: Vec<CandidateRecord>,
        query: &PricingQuery,
        now: DateTime<Utc>,
    ) -> Recommendation {
        let requester =
            normalize_requester(requester, &query.filters, &self.config.grade_scale, now);
        let pool = select_population(records, query, &self.config.grade_scale, now);

        tracing::debug!(
            "Selected {} candidates for {} over {} months",
            pool.len(),
            query.requester_id,
            query.time_period_months
        );

        self.suggest(requester, &pool)
    }

    /// Score a pool, best match first
    ///
    /// Large pools are scored on the rayon thread pool.
    pub fn score_pool(
        &self,
        requester: &ProviderFactors,
        pool: &CandidatePool,
    ) -> Vec<ScoredCandidate> {
        let score = |candidate: &ProviderFactors| {
            let price_per_hour = candidate.price_per_hour?;
            Some(ScoredCandidate {
                similarity: calculate_similarity(
                    requester,
                    candidate,
                    &self.config.weights,
                    &self.config.regions,
                ),
                price_per_hour,
                rating: candidate.rating,
            })
        };

        let mut scored: Vec<ScoredCandidate> = if pool.len() >= self.config.parallel_threshold {
            pool.candidates().par_iter().filter_map(score).collect()
        } else {
            pool.candidates().iter().filter_map(score).collect()
        };

        // Sort by score (descending) and then by id for a stable order
        scored.sort_by(|a, b| {
            b.similarity
                .weighted_score
                .total_cmp(&a.similarity.weighted_score)
                .then_with(|| a.similarity.provider_id.cmp(&b.similarity.provider_id))
        });

        scored
    }

    /// Price a normalized requester against an already selected pool
    pub fn suggest(&self, requester: ProviderFactors, pool: &CandidatePool) -> Recommendation {
        let scored = self.score_pool(&requester, pool);
        let similar = filter_similar(&scored, self.config.similarity_threshold);
        let confidence = confidence_level(similar.len(), &self.config.confidence);
        let aggregate = aggregate_prices(&similar, pool.prices(), self.config.price_tolerance);

        let suggestion = PriceSuggestion {
            suggested_price: aggregate.suggested_price,
            market_average: aggregate.market_average,
            price_range: aggregate.price_range,
            confidence_level: confidence,
            similar_count: similar.len(),
            total_candidates: pool.len(),
            factors_used: requester,
            weights: self.config.weights,
            rating_breakdown: aggregate.rating_breakdown,
            config_version: self.config.version.clone(),
        };

        Recommendation { suggestion, scored }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceLevel, SessionFormat};

    fn provider(id: &str, price: Option<f64>) -> ProviderFactors {
        ProviderFactors {
            provider_id: id.to_string(),
            rating: 4.5,
            completion_rate: 0.9,
            student_count: 50,
            credentials_count: 4,
            experience_score: 20.0,
            account_age_days: 400,
            location: None,
            country: None,
            grade_levels: vec!["high_school".to_string()],
            grade_complexity: 8.0,
            session_format: SessionFormat::Online,
            price_per_hour: price,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        let rebuilt = EngineConfig::new(
            config.version().to_string(),
            *config.weights(),
            config.similarity_threshold(),
            *config.confidence(),
            config.price_tolerance(),
            config.grade_scale().clone(),
            config.regions().clone(),
            256,
        );
        assert_eq!(rebuilt, Ok(config));
    }

    #[test]
    fn test_rejects_weights_not_summing_to_one() {
        let weights = FactorWeights {
            rating: 0.5,
            ..FactorWeights::default()
        };
        let result = EngineConfig::new(
            "bad",
            weights,
            0.65,
            ConfidenceThresholds::default(),
            0.1,
            GradeScale::default(),
            RegionTable::default(),
            256,
        );
        assert!(matches!(result, Err(ConfigValidationError::WeightSum(_))));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let weights = FactorWeights {
            rating: 0.40,
            location: -0.10,
            ..FactorWeights::default()
        };
        let result = EngineConfig::new(
            "bad",
            weights,
            0.65,
            ConfidenceThresholds::default(),
            0.1,
            GradeScale::default(),
            RegionTable::default(),
            256,
        );
        assert_eq!(result, Err(ConfigValidationError::InvalidWeight("location")));
    }

    #[test]
    fn test_rejects_inverted_confidence() {
        let result = EngineConfig::new(
            "bad",
            FactorWeights::default(),
            0.65,
            ConfidenceThresholds {
                high_min: 3,
                medium_min: 8,
            },
            0.1,
            GradeScale::default(),
            RegionTable::default(),
            256,
        );
        assert_eq!(
            result,
            Err(ConfigValidationError::ConfidenceOrder { medium: 8, high: 3 })
        );
    }

    #[test]
    fn test_empty_pool_is_low_confidence() {
        let engine = PricingEngine::with_default_config();
        let rec = engine.suggest(provider("me", None), &CandidatePool::default());

        assert_eq!(rec.suggestion.confidence_level, ConfidenceLevel::Low);
        assert_eq!(rec.suggestion.similar_count, 0);
        assert_eq!(rec.suggestion.total_candidates, 0);
        assert!(rec.suggestion.market_average.is_none());
        assert!(rec.suggestion.price_range.is_none());
        assert!(rec.scored.is_empty());
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let pool = CandidatePool::new(
            (0..40)
                .map(|i| {
                    let mut p = provider(&format!("c{:02}", i), Some(30.0 + i as f64));
                    p.rating = 2.0 + (i % 7) as f64 * 0.5;
                    p.student_count = (i * 13) as u32;
                    p
                })
                .collect(),
        );

        let sequential = PricingEngine::with_default_config();
        let parallel = PricingEngine::new(EngineConfig {
            parallel_threshold: 1,
            ..EngineConfig::default()
        });

        let a = sequential.suggest(provider("me", None), &pool);
        let b = parallel.suggest(provider("me", None), &pool);
        assert_eq!(a, b);
    }

    #[test]
    fn test_scored_sorted_best_first() {
        let mut far = provider("far", Some(90.0));
        far.rating = 1.0;
        far.completion_rate = 0.1;
        far.student_count = 500;
        far.session_format = SessionFormat::InPerson;
        far.grade_complexity = 2.0;
        let pool = CandidatePool::new(vec![far, provider("near", Some(60.0))]);

        let rec = PricingEngine::with_default_config().suggest(provider("me", None), &pool);
        assert_eq!(rec.scored[0].similarity.provider_id, "near");
        assert_eq!(rec.similar(0.65).count(), 1);
    }
}
