use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{ProviderFactors, RawProviderRecord, RequesterFilters, SessionFormat};

/// Rating assumed for providers nobody has reviewed yet
pub const DEFAULT_RATING: f64 = 3.5;

/// Upper bound of the grade complexity scale
pub const MAX_GRADE_COMPLEXITY: f64 = 14.0;

/// How a provider's taught levels collapse into one complexity value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeSelection {
    #[default]
    Max,
    Mean,
    Min,
}

/// Maps grade-level names onto the 1-14 complexity scale
#[derive(Debug, Clone, PartialEq)]
pub struct GradeScale {
    levels: HashMap<String, f64>,
    selection: GradeSelection,
    default_complexity: f64,
}

impl GradeScale {
    pub fn new(
        levels: HashMap<String, f64>,
        selection: GradeSelection,
        default_complexity: f64,
    ) -> Self {
        let levels = levels
            .into_iter()
            .map(|(name, value)| (fold_level_name(&name), value.clamp(1.0, MAX_GRADE_COMPLEXITY)))
            .collect();

        Self {
            levels,
            selection,
            default_complexity: default_complexity.clamp(1.0, MAX_GRADE_COMPLEXITY),
        }
    }

    /// Layer extra levels on top, replacing any level with the same folded name
    ///
    /// Applied in key order so two spellings of one level resolve the same way
    /// on every start.
    pub fn with_overrides(mut self, overrides: &HashMap<String, f64>) -> Self {
        let mut entries: Vec<(&String, &f64)> = overrides.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        for (name, value) in entries {
            self.levels
                .insert(fold_level_name(name), value.clamp(1.0, MAX_GRADE_COMPLEXITY));
        }
        self
    }

    pub fn default_levels() -> HashMap<String, f64> {
        [
            ("preschool", 1.0),
            ("kindergarten", 1.0),
            ("elementary", 2.0),
            ("primary", 2.0),
            ("middle_school", 5.0),
            ("junior_high", 5.0),
            ("high_school", 8.0),
            ("secondary", 8.0),
            ("ap", 10.0),
            ("ib", 10.0),
            ("college_prep", 10.0),
            ("college", 12.0),
            ("undergraduate", 12.0),
            ("university", 13.0),
            ("graduate", 13.0),
            ("postgraduate", 13.0),
            ("professional", 13.0),
            ("certification", 14.0),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }

    pub fn selection(&self) -> GradeSelection {
        self.selection
    }

    /// Complexity of a single grade level, if it is known
    pub fn complexity_of(&self, level: &str) -> Option<f64> {
        let key = fold_level_name(level);
        if let Some(value) = self.levels.get(&key) {
            return Some(*value);
        }

        // "grade_7", "grade7", "7"
        let digits = key.strip_prefix("grade").unwrap_or(&key).trim_start_matches('_');
        digits
            .parse::<u32>()
            .ok()
            .map(|n| f64::from(n.clamp(1, 12)))
    }

    /// Representative complexity for a set of taught levels
    pub fn resolve(&self, levels: &[String]) -> f64 {
        let values: Vec<f64> = levels.iter().filter_map(|l| self.complexity_of(l)).collect();
        if values.is_empty() {
            return self.default_complexity;
        }

        match self.selection {
            GradeSelection::Max => values.iter().copied().fold(f64::MIN, f64::max),
            GradeSelection::Min => values.iter().copied().fold(f64::MAX, f64::min),
            GradeSelection::Mean => values.iter().sum::<f64>() / values.len() as f64,
        }
    }
}

impl Default for GradeScale {
    fn default() -> Self {
        Self::new(Self::default_levels(), GradeSelection::Max, 7.0)
    }
}

fn fold_level_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Lowercased country, falling back to the last segment of a "City, Country" location
fn resolve_country(country: Option<&str>, location: Option<&str>) -> Option<String> {
    let explicit = country.map(str::trim).filter(|c| !c.is_empty());
    let derived = || {
        location
            .and_then(|l| l.rsplit(',').next())
            .map(str::trim)
            .filter(|c| !c.is_empty())
    };

    explicit.or_else(derived).map(str::to_lowercase)
}

fn non_negative(value: Option<i64>) -> u32 {
    value
        .unwrap_or(0)
        .clamp(0, i64::from(u32::MAX)) as u32
}

/// Convert a raw record into fully defaulted comparison factors
///
/// `price_per_hour` is left empty; the population selector attaches the
/// observed price for candidates.
pub fn normalize_profile(
    raw: &RawProviderRecord,
    scale: &GradeScale,
    now: DateTime<Utc>,
) -> ProviderFactors {
    let reviewed = raw.review_count.map_or(true, |count| count > 0);
    let rating = match raw.rating {
        Some(r) if reviewed && r.is_finite() => r.clamp(0.0, 5.0),
        _ => DEFAULT_RATING,
    };

    let completion_rate = raw
        .completion_rate
        .filter(|c| c.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    let student_count = non_negative(raw.student_count);
    let credentials_count = non_negative(raw.credentials_count);
    let experience_score = (f64::from(credentials_count) * 5.0).min(100.0);

    let account_age_days = raw
        .created_at
        .map(|created| (now - created).num_days())
        .unwrap_or(1)
        .clamp(1, i64::from(u32::MAX)) as u32;

    let session_format = raw
        .session_format
        .as_deref()
        .and_then(SessionFormat::parse)
        .unwrap_or_default();

    ProviderFactors {
        provider_id: raw.provider_id.clone(),
        rating,
        completion_rate,
        student_count,
        credentials_count,
        experience_score,
        account_age_days,
        location: raw.location.clone(),
        country: resolve_country(raw.country.as_deref(), raw.location.as_deref()),
        grade_levels: raw.grade_levels.clone(),
        grade_complexity: scale.resolve(&raw.grade_levels),
        session_format,
        price_per_hour: None,
    }
}

/// Normalize the requester, letting request filters override their profile
pub fn normalize_requester(
    raw: &RawProviderRecord,
    filters: &RequesterFilters,
    scale: &GradeScale,
    now: DateTime<Utc>,
) -> ProviderFactors {
    let mut factors = normalize_profile(raw, scale, now);

    if !filters.grade_levels.is_empty() {
        factors.grade_complexity = scale.resolve(&filters.grade_levels);
        factors.grade_levels = filters.grade_levels.clone();
    }

    if let Some(format) = filters.session_format.and_then(SessionFormat::as_filter) {
        factors.session_format = format;
    }

    factors
}
