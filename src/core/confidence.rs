use serde::{Deserialize, Serialize};

use crate::models::{ConfidenceLevel, ScoredCandidate};

/// Similar-candidate counts at which confidence steps up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub high_min: usize,
    pub medium_min: usize,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high_min: 10,
            medium_min: 5,
        }
    }
}

/// Keep candidates scoring strictly above the similarity threshold
#[inline]
pub fn filter_similar(scored: &[ScoredCandidate], threshold: f64) -> Vec<ScoredCandidate> {
    scored
        .iter()
        .filter(|c| c.similarity.weighted_score > threshold)
        .cloned()
        .collect()
}

/// Confidence label for a number of similar candidates
#[inline]
pub fn confidence_level(similar_count: usize, thresholds: &ConfidenceThresholds) -> ConfidenceLevel {
    if similar_count >= thresholds.high_min {
        ConfidenceLevel::High
    } else if similar_count >= thresholds.medium_min {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}
