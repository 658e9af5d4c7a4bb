use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::models::domain::{PricingQuery, RequesterFilters, SessionFormat};

/// Request a suggested hourly price
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SuggestPriceRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "requester_id", rename = "requesterId")]
    pub requester_id: String,
    #[validate(range(min = 1, max = 36))]
    #[serde(default)]
    #[serde(alias = "time_period_months", rename = "timePeriodMonths")]
    pub time_period_months: Option<u32>,
    #[serde(default)]
    #[serde(alias = "course_ids", rename = "courseIds")]
    pub course_ids: Vec<String>,
    #[serde(default)]
    #[serde(alias = "grade_level", rename = "gradeLevel")]
    pub grade_level: Vec<String>,
    #[serde(default)]
    #[serde(alias = "session_format", rename = "sessionFormat")]
    pub session_format: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("Unknown session format: {0}")]
    UnknownSessionFormat(String),
}

impl SuggestPriceRequest {
    /// Convert into the engine's query, resolving the session format filter
    pub fn to_query(&self, default_time_period_months: u32) -> Result<PricingQuery, RequestError> {
        let session_format = match self.session_format.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                SessionFormat::parse(raw)
                    .ok_or_else(|| RequestError::UnknownSessionFormat(raw.to_string()))?,
            ),
        };

        let mut course_ids: Vec<String> = self
            .course_ids
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        course_ids.sort();
        course_ids.dedup();

        let grade_levels: Vec<String> = self
            .grade_level
            .iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();

        Ok(PricingQuery {
            requester_id: self.requester_id.trim().to_string(),
            time_period_months: self.time_period_months.unwrap_or(default_time_period_months),
            filters: RequesterFilters {
                course_ids,
                grade_levels,
                session_format,
            },
        })
    }
}
