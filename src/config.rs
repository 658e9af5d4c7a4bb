use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::core::normalizer::GradeSelection;
use crate::models::FactorWeights;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub pricing: PricingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub enabled: bool,
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

/// Engine constants: weights, thresholds, scales
#[derive(Debug, Clone, Deserialize)]
pub struct PricingSettings {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_high_confidence_min")]
    pub high_confidence_min: usize,
    #[serde(default = "default_medium_confidence_min")]
    pub medium_confidence_min: usize,
    #[serde(default = "default_price_tolerance")]
    pub price_tolerance: f64,
    #[serde(default = "default_time_period_months")]
    pub default_time_period_months: u32,
    /// Extra or overriding grade-level complexities
    #[serde(default)]
    pub grade_scale: HashMap<String, f64>,
    #[serde(default)]
    pub grade_selection: GradeSelection,
    #[serde(default = "default_grade_complexity")]
    pub default_grade_complexity: f64,
    /// Extra or overriding country to region mappings
    #[serde(default)]
    pub regions: HashMap<String, String>,
    #[serde(default = "default_same_region_score")]
    pub same_region_score: f64,
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
    #[serde(default = "default_max_listed_similar")]
    pub max_listed_similar: usize,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            weights: WeightsConfig::default(),
            similarity_threshold: default_similarity_threshold(),
            high_confidence_min: default_high_confidence_min(),
            medium_confidence_min: default_medium_confidence_min(),
            price_tolerance: default_price_tolerance(),
            default_time_period_months: default_time_period_months(),
            grade_scale: HashMap::new(),
            grade_selection: GradeSelection::default(),
            default_grade_complexity: default_grade_complexity(),
            regions: HashMap::new(),
            same_region_score: default_same_region_score(),
            parallel_threshold: default_parallel_threshold(),
            max_listed_similar: default_max_listed_similar(),
        }
    }
}

fn default_version() -> String { "v2".to_string() }
fn default_similarity_threshold() -> f64 { 0.65 }
fn default_high_confidence_min() -> usize { 10 }
fn default_medium_confidence_min() -> usize { 5 }
fn default_price_tolerance() -> f64 { 0.10 }
fn default_time_period_months() -> u32 { 3 }
fn default_grade_complexity() -> f64 { 7.0 }
fn default_same_region_score() -> f64 { 0.6 }
fn default_parallel_threshold() -> usize { 256 }
fn default_max_listed_similar() -> usize { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_rating_weight")]
    pub rating: f64,
    #[serde(default = "default_completion_weight")]
    pub completion: f64,
    #[serde(default = "default_student_count_weight")]
    pub student_count: f64,
    #[serde(default = "default_experience_weight")]
    pub experience: f64,
    #[serde(default = "default_account_age_weight")]
    pub account_age: f64,
    #[serde(default = "default_session_format_weight")]
    pub session_format: f64,
    #[serde(default = "default_location_weight")]
    pub location: f64,
    #[serde(default = "default_grade_level_weight")]
    pub grade_level: f64,
    #[serde(default = "default_credentials_weight")]
    pub credentials: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            rating: default_rating_weight(),
            completion: default_completion_weight(),
            student_count: default_student_count_weight(),
            experience: default_experience_weight(),
            account_age: default_account_age_weight(),
            session_format: default_session_format_weight(),
            location: default_location_weight(),
            grade_level: default_grade_level_weight(),
            credentials: default_credentials_weight(),
        }
    }
}

impl WeightsConfig {
    pub fn to_factor_weights(&self) -> FactorWeights {
        FactorWeights {
            rating: self.rating,
            completion: self.completion,
            student_count: self.student_count,
            experience: self.experience,
            account_age: self.account_age,
            session_format: self.session_format,
            location: self.location,
            grade_level: self.grade_level,
            credentials: self.credentials,
        }
    }
}

fn default_rating_weight() -> f64 { 0.20 }
fn default_completion_weight() -> f64 { 0.15 }
fn default_student_count_weight() -> f64 { 0.12 }
fn default_experience_weight() -> f64 { 0.08 }
fn default_account_age_weight() -> f64 { 0.05 }
fn default_session_format_weight() -> f64 { 0.12 }
fn default_location_weight() -> f64 { 0.10 }
fn default_grade_level_weight() -> f64 { 0.10 }
fn default_credentials_weight() -> f64 { 0.08 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with PRICING__)
    /// 5. DATABASE_URL, if set
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., PRICING__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("PRICING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("PRICING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConfigValidationError, EngineConfig};

    #[test]
    fn test_default_weights() {
        let weights = WeightsConfig::default();
        assert_eq!(weights.rating, 0.20);
        assert_eq!(weights.completion, 0.15);
        assert_eq!(weights.student_count, 0.12);
        assert_eq!(weights.session_format, 0.12);
        assert_eq!(weights.credentials, 0.08);
        assert_eq!(weights.to_factor_weights(), FactorWeights::default());
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }

    #[test]
    fn test_pricing_section_from_toml() {
        let pricing: PricingSettings = toml::from_str(
            r#"
            version = "v2-test"
            similarity_threshold = 0.7
            grade_selection = "mean"

            [weights]
            rating = 0.30
            completion = 0.05

            [grade_scale]
            "adult education" = 6.0

            [regions]
            morocco = "africa"
            "#,
        )
        .unwrap();

        assert_eq!(pricing.version, "v2-test");
        assert_eq!(pricing.similarity_threshold, 0.7);
        assert_eq!(pricing.grade_selection, GradeSelection::Mean);
        assert_eq!(pricing.weights.rating, 0.30);
        assert_eq!(pricing.weights.location, 0.10);
        assert_eq!(pricing.high_confidence_min, 10);

        // 0.30 + 0.05 still sums to 1.0 with the remaining defaults
        let config = EngineConfig::from_settings(&pricing).unwrap();
        assert_eq!(config.grade_scale().complexity_of("Adult Education"), Some(6.0));
        assert_eq!(config.regions().region_of("morocco"), Some("africa"));
    }

    #[test]
    fn test_unbalanced_weights_rejected() {
        let pricing: PricingSettings = toml::from_str(
            r#"
            [weights]
            rating = 0.50
            "#,
        )
        .unwrap();

        assert!(EngineConfig::from_settings(&pricing).is_err());
    }

    #[test]
    fn test_respelled_overrides_replace_defaults() {
        let source = r#"
            [grade_scale]
            "High School" = 9.0

            [regions]
            "USA" = "Europe"
            "#;

        for _ in 0..100 {
            let pricing: PricingSettings = toml::from_str(source).unwrap();
            let config = EngineConfig::from_settings(&pricing).unwrap();

            assert_eq!(config.grade_scale().complexity_of("high_school"), Some(9.0));
            assert_eq!(config.grade_scale().complexity_of("secondary"), Some(8.0));
            assert_eq!(config.regions().region_of("usa"), Some("europe"));
            assert_eq!(config.regions().region_of("canada"), Some("north_america"));
        }
    }

    #[test]
    fn test_default_time_period_out_of_range_rejected() {
        for months in [0, 37, 100] {
            let pricing = PricingSettings {
                default_time_period_months: months,
                ..PricingSettings::default()
            };
            assert_eq!(
                EngineConfig::from_settings(&pricing),
                Err(ConfigValidationError::TimePeriod(months))
            );
        }

        let pricing = PricingSettings {
            default_time_period_months: 36,
            ..PricingSettings::default()
        };
        assert!(EngineConfig::from_settings(&pricing).is_ok());
    }

    #[test]
    fn test_default_pricing_settings_build() {
        let config = EngineConfig::from_settings(&PricingSettings::default()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
