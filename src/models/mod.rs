// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CandidatePool, CandidateRecord, ConfidenceLevel, Factor, FactorWeights, Listing, PricePoint,
    PriceRange, PriceSuggestion, PricingQuery, ProviderFactors, RatingBucket, RawProviderRecord,
    RequesterFilters, ScoredCandidate, SessionFormat, SimilarityResult,
};
pub use requests::{RequestError, SuggestPriceRequest};
pub use responses::{
    CandidateScoresResponse, EngineConfigResponse, ErrorResponse, HealthResponse,
    SuggestPriceResponse,
};
