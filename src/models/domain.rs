use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw provider row as delivered by the data store
///
/// Every field except the id may be missing; the normalizer is the only
/// component that reads this shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProviderRecord {
    #[serde(rename = "providerId")]
    pub provider_id: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(rename = "reviewCount", default)]
    pub review_count: Option<i64>,
    #[serde(rename = "completionRate", default)]
    pub completion_rate: Option<f64>,
    #[serde(rename = "studentCount", default)]
    pub student_count: Option<i64>,
    #[serde(rename = "credentialsCount", default)]
    pub credentials_count: Option<i64>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(rename = "gradeLevels", default)]
    pub grade_levels: Vec<String>,
    #[serde(rename = "sessionFormat", default)]
    pub session_format: Option<String>,
}

/// Format a tutor offers sessions in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionFormat {
    Online,
    #[serde(rename = "In-Person")]
    InPerson,
    Hybrid,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl SessionFormat {
    /// Parse a loosely formatted session format name
    pub fn parse(value: &str) -> Option<Self> {
        let folded: String = value
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match folded.as_str() {
            "online" => Some(SessionFormat::Online),
            "inperson" => Some(SessionFormat::InPerson),
            "hybrid" => Some(SessionFormat::Hybrid),
            "all" | "any" => Some(SessionFormat::All),
            _ => None,
        }
    }

    /// `All` means "no constraint" when used as a filter
    pub fn as_filter(self) -> Option<Self> {
        match self {
            SessionFormat::All => None,
            other => Some(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionFormat::Online => "Online",
            SessionFormat::InPerson => "In-Person",
            SessionFormat::Hybrid => "Hybrid",
            SessionFormat::All => "all",
        }
    }
}

impl fmt::Display for SessionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully defaulted comparison factors for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFactors {
    #[serde(rename = "providerId")]
    pub provider_id: String,
    pub rating: f64,
    #[serde(rename = "completionRate")]
    pub completion_rate: f64,
    #[serde(rename = "studentCount")]
    pub student_count: u32,
    #[serde(rename = "credentialsCount")]
    pub credentials_count: u32,
    #[serde(rename = "experienceScore")]
    pub experience_score: f64,
    #[serde(rename = "accountAgeDays")]
    pub account_age_days: u32,
    pub location: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "gradeLevels")]
    pub grade_levels: Vec<String>,
    #[serde(rename = "gradeComplexity")]
    pub grade_complexity: f64,
    #[serde(rename = "sessionFormat")]
    pub session_format: SessionFormat,
    #[serde(rename = "pricePerHour", skip_serializing_if = "Option::is_none", default)]
    pub price_per_hour: Option<f64>,
}

/// A course a provider offers in a given format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub provider_id: String,
    pub course_id: String,
    pub session_format: SessionFormat,
    pub is_active: bool,
}

/// An externally observed hourly price, e.g. an agreed enrollment rate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub provider_id: String,
    pub price_per_hour: f64,
    pub observed_at: DateTime<Utc>,
}

/// Everything the data store knows about one potential candidate
#[derive(Debug, Clone, Default)]
pub struct CandidateRecord {
    pub profile: RawProviderRecord,
    pub listings: Vec<Listing>,
    pub price_points: Vec<PricePoint>,
}

/// Requester-side filter parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequesterFilters {
    pub course_ids: Vec<String>,
    pub grade_levels: Vec<String>,
    pub session_format: Option<SessionFormat>,
}

/// Validated pricing request handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct PricingQuery {
    pub requester_id: String,
    pub time_period_months: u32,
    pub filters: RequesterFilters,
}

/// Comparable providers, each paired with exactly one observed price
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    candidates: Vec<ProviderFactors>,
}

impl CandidatePool {
    /// Build a pool, dropping entries without a usable price
    pub fn new(candidates: Vec<ProviderFactors>) -> Self {
        let candidates = candidates
            .into_iter()
            .filter(|c| matches!(c.price_per_hour, Some(p) if p.is_finite() && p > 0.0))
            .collect();
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[ProviderFactors] {
        &self.candidates
    }

    /// Observed prices across the whole pool
    pub fn prices(&self) -> impl Iterator<Item = f64> + '_ {
        self.candidates.iter().filter_map(|c| c.price_per_hour)
    }
}

/// The nine comparison factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Rating,
    Completion,
    StudentCount,
    Experience,
    AccountAge,
    SessionFormat,
    Location,
    GradeLevel,
    Credentials,
}

impl Factor {
    pub const ALL: [Factor; 9] = [
        Factor::Rating,
        Factor::Completion,
        Factor::StudentCount,
        Factor::Experience,
        Factor::AccountAge,
        Factor::SessionFormat,
        Factor::Location,
        Factor::GradeLevel,
        Factor::Credentials,
    ];
}

/// Factor weights, expected to sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub rating: f64,
    pub completion: f64,
    pub student_count: f64,
    pub experience: f64,
    pub account_age: f64,
    pub session_format: f64,
    pub location: f64,
    pub grade_level: f64,
    pub credentials: f64,
}

impl FactorWeights {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Rating => self.rating,
            Factor::Completion => self.completion,
            Factor::StudentCount => self.student_count,
            Factor::Experience => self.experience,
            Factor::AccountAge => self.account_age,
            Factor::SessionFormat => self.session_format,
            Factor::Location => self.location,
            Factor::GradeLevel => self.grade_level,
            Factor::Credentials => self.credentials,
        }
    }

    pub fn sum(&self) -> f64 {
        Factor::ALL.iter().map(|f| self.get(*f)).sum()
    }
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            rating: 0.20,
            completion: 0.15,
            student_count: 0.12,
            experience: 0.08,
            account_age: 0.05,
            session_format: 0.12,
            location: 0.10,
            grade_level: 0.10,
            credentials: 0.08,
        }
    }
}

/// Similarity of one candidate to the requester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    #[serde(rename = "providerId")]
    pub provider_id: String,
    #[serde(rename = "perFactorScores")]
    pub per_factor_scores: BTreeMap<Factor, f64>,
    #[serde(rename = "weightedScore")]
    pub weighted_score: f64,
}

/// Similarity plus the candidate data the aggregator needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub similarity: SimilarityResult,
    #[serde(rename = "pricePerHour")]
    pub price_per_hour: f64,
    pub rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    #[serde(rename = "suggestedMin")]
    pub suggested_min: Option<f64>,
    #[serde(rename = "suggestedMax")]
    pub suggested_max: Option<f64>,
}

/// Similar candidates sharing a rating rounded to the nearest half star
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingBucket {
    pub rating: f64,
    pub count: usize,
    #[serde(rename = "averagePrice")]
    pub average_price: f64,
}

/// The engine's externally visible output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSuggestion {
    #[serde(rename = "suggestedPrice")]
    pub suggested_price: Option<f64>,
    #[serde(rename = "marketAverage")]
    pub market_average: Option<f64>,
    #[serde(rename = "priceRange")]
    pub price_range: Option<PriceRange>,
    #[serde(rename = "confidenceLevel")]
    pub confidence_level: ConfidenceLevel,
    #[serde(rename = "similarCount")]
    pub similar_count: usize,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    #[serde(rename = "factorsUsed")]
    pub factors_used: ProviderFactors,
    pub weights: FactorWeights,
    #[serde(rename = "ratingBreakdown")]
    pub rating_breakdown: Vec<RatingBucket>,
    #[serde(rename = "configVersion")]
    pub config_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(id: &str, price: Option<f64>) -> ProviderFactors {
        ProviderFactors {
            provider_id: id.to_string(),
            rating: 4.0,
            completion_rate: 0.8,
            student_count: 10,
            credentials_count: 2,
            experience_score: 10.0,
            account_age_days: 100,
            location: None,
            country: None,
            grade_levels: vec![],
            grade_complexity: 7.0,
            session_format: SessionFormat::Online,
            price_per_hour: price,
        }
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((FactorWeights::default().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_session_format_parse() {
        assert_eq!(SessionFormat::parse("online"), Some(SessionFormat::Online));
        assert_eq!(SessionFormat::parse("In-Person"), Some(SessionFormat::InPerson));
        assert_eq!(SessionFormat::parse("in person"), Some(SessionFormat::InPerson));
        assert_eq!(SessionFormat::parse("HYBRID"), Some(SessionFormat::Hybrid));
        assert_eq!(SessionFormat::parse("all"), Some(SessionFormat::All));
        assert_eq!(SessionFormat::parse("carrier pigeon"), None);
    }

    #[test]
    fn test_session_format_serde_names() {
        let json = serde_json::to_string(&SessionFormat::InPerson).unwrap();
        assert_eq!(json, "\"In-Person\"");
        let all: SessionFormat = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, SessionFormat::All);
        assert_eq!(SessionFormat::All.as_filter(), None);
    }

    #[test]
    fn test_pool_drops_unpriced_candidates() {
        let pool = CandidatePool::new(vec![
            factors("a", Some(50.0)),
            factors("b", None),
            factors("c", Some(0.0)),
            factors("d", Some(f64::NAN)),
        ]);

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.prices().collect::<Vec<_>>(), vec![50.0]);
    }

    #[test]
    fn test_factor_keys_serialize_snake_case() {
        let mut scores = BTreeMap::new();
        scores.insert(Factor::StudentCount, 0.5);
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"student_count":0.5}"#);
    }
}
