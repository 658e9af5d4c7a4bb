// Core algorithm exports
pub mod confidence;
pub mod engine;
pub mod normalizer;
pub mod population;
pub mod pricing;
pub mod similarity;

pub use confidence::{confidence_level, filter_similar, ConfidenceThresholds};
pub use engine::{ConfigValidationError, EngineConfig, PricingEngine, Recommendation};
pub use normalizer::{normalize_profile, normalize_requester, GradeScale, GradeSelection};
pub use population::select_population;
pub use pricing::{aggregate_prices, PriceAggregate};
pub use similarity::{calculate_similarity, RegionTable};
