//! Tutor Pricing - hourly rate recommendations for tutors
//!
//! Compares a tutor against peers who charged in a recent window, weighting
//! nine profile factors, and suggests a market-consistent hourly price with a
//! confidence label.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{calculate_similarity, EngineConfig, PricingEngine, Recommendation};
pub use crate::models::{
    CandidatePool, CandidateRecord, ConfidenceLevel, FactorWeights, PriceSuggestion, PricingQuery,
    ProviderFactors, RawProviderRecord, SuggestPriceRequest,
};
