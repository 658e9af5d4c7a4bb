use serde::{Deserialize, Serialize};
use crate::models::domain::{FactorWeights, PriceSuggestion, ScoredCandidate};

/// Response for the suggest endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestPriceResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "generatedAt")]
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub suggestion: PriceSuggestion,
    #[serde(rename = "similarProviders")]
    pub similar_providers: Vec<ScoredCandidate>,
}

impl SuggestPriceResponse {
    /// Wrap a suggestion with a fresh request id and timestamp
    pub fn new(suggestion: PriceSuggestion, similar_providers: Vec<ScoredCandidate>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            generated_at: chrono::Utc::now(),
            suggestion,
            similar_providers,
        }
    }
}

/// Every scored candidate for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScoresResponse {
    #[serde(rename = "requesterId")]
    pub requester_id: String,
    #[serde(rename = "similarityThreshold")]
    pub similarity_threshold: f64,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    pub candidates: Vec<ScoredCandidate>,
}

/// Active engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigResponse {
    pub version: String,
    pub weights: FactorWeights,
    #[serde(rename = "similarityThreshold")]
    pub similarity_threshold: f64,
    #[serde(rename = "highConfidenceMin")]
    pub high_confidence_min: usize,
    #[serde(rename = "mediumConfidenceMin")]
    pub medium_confidence_min: usize,
    #[serde(rename = "priceTolerance")]
    pub price_tolerance: f64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PricingEngine;
    use crate::models::{CandidatePool, ProviderFactors, SessionFormat};

    fn suggestion() -> PriceSuggestion {
        let requester = ProviderFactors {
            provider_id: "me".to_string(),
            rating: 4.0,
            completion_rate: 0.8,
            student_count: 10,
            credentials_count: 1,
            experience_score: 5.0,
            account_age_days: 100,
            location: None,
            country: None,
            grade_levels: vec![],
            grade_complexity: 7.0,
            session_format: SessionFormat::Online,
            price_per_hour: None,
        };
        PricingEngine::with_default_config()
            .suggest(requester, &CandidatePool::default())
            .suggestion
    }

    #[test]
    fn test_rewrapped_suggestion_gets_new_request_id() {
        let first = SuggestPriceResponse::new(suggestion(), vec![]);
        let stored: SuggestPriceResponse =
            serde_json::from_str(&serde_json::to_string(&first).unwrap()).unwrap();

        let served = SuggestPriceResponse::new(stored.suggestion, stored.similar_providers);
        assert_ne!(served.request_id, first.request_id);
        assert!(served.generated_at >= first.generated_at);
        assert_eq!(served.suggestion, first.suggestion);
    }
}
