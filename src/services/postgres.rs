use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::models::{
    CandidateRecord, Listing, PricePoint, PricingQuery, RawProviderRecord, SessionFormat,
};

/// Errors that can occur when reading from PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

const PROFILE_COLUMNS: &str = r#"
    t.id AS provider_id,
    t.created_at,
    t.location,
    t.country,
    t.grade_levels,
    t.session_format,
    a.average_rating::float8 AS average_rating,
    a.review_count::int8 AS review_count,
    a.completion_rate::float8 AS completion_rate,
    a.student_count::int8 AS student_count,
    (SELECT COUNT(*) FROM tutor_credentials c WHERE c.tutor_id = t.id) AS credentials_count
"#;

/// Read-only PostgreSQL client for provider profiles, listings and prices
///
/// The schema is owned elsewhere; this client only runs SELECTs.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Fetch one provider's raw profile
    pub async fn get_provider(&self, provider_id: &str) -> Result<RawProviderRecord, PostgresError> {
        let query = format!(
            r#"
            SELECT {}
            FROM tutors t
            LEFT JOIN tutor_analytics a ON a.tutor_id = t.id
            WHERE t.id = $1
            "#,
            PROFILE_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("Provider {}", provider_id)))?;

        raw_record_from_row(&row)
    }

    /// Fetch every provider that could belong to the comparable population
    ///
    /// Pre-applies the window, exclusion and listing constraints in SQL; the
    /// engine re-checks them in memory.
    pub async fn get_candidates(
        &self,
        query: &PricingQuery,
        since: DateTime<Utc>,
    ) -> Result<Vec<CandidateRecord>, PostgresError> {
        let format = query
            .filters
            .session_format
            .and_then(|f| f.as_filter())
            .map(folded_format);
        let courses = &query.filters.course_ids;

        let profile_query = format!(
            r#"
            SELECT {}
            FROM tutors t
            LEFT JOIN tutor_analytics a ON a.tutor_id = t.id
            WHERE t.id <> $1
              AND EXISTS (
                  SELECT 1 FROM enrollments e
                  WHERE e.tutor_id = t.id
                    AND e.price_per_hour > 0
                    AND e.created_at >= $2
              )
              AND (
                  ($3::text IS NULL AND cardinality($4::text[]) = 0)
                  OR EXISTS (
                      SELECT 1 FROM tutor_listings l
                      WHERE l.tutor_id = t.id
                        AND l.is_active
                        AND ($3::text IS NULL OR lower(regexp_replace(l.session_format, '[^A-Za-z0-9]', '', 'g')) = $3)
                        AND (cardinality($4::text[]) = 0 OR l.course_id = ANY($4))
                  )
              )
            "#,
            PROFILE_COLUMNS
        );

        let rows = sqlx::query(&profile_query)
            .bind(&query.requester_id)
            .bind(since)
            .bind(&format)
            .bind(courses)
            .fetch_all(&self.pool)
            .await?;

        let mut records: Vec<CandidateRecord> = rows
            .iter()
            .map(|row| {
                Ok(CandidateRecord {
                    profile: raw_record_from_row(row)?,
                    ..Default::default()
                })
            })
            .collect::<Result<_, PostgresError>>()?;

        if records.is_empty() {
            return Ok(records);
        }

        let ids: Vec<String> = records.iter().map(|r| r.profile.provider_id.clone()).collect();
        let mut prices = self.get_price_points(&ids, since).await?;
        let mut listings = self.get_listings(&ids).await?;

        for record in &mut records {
            let id = &record.profile.provider_id;
            record.price_points = prices.remove(id).unwrap_or_default();
            record.listings = listings.remove(id).unwrap_or_default();
        }

        tracing::debug!(
            "Loaded {} candidate records for {}",
            records.len(),
            query.requester_id
        );

        Ok(records)
    }

    /// Observed prices per provider since a point in time
    async fn get_price_points(
        &self,
        provider_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<PricePoint>>, PostgresError> {
        let query = r#"
            SELECT tutor_id, price_per_hour::float8 AS price_per_hour, created_at
            FROM enrollments
            WHERE tutor_id = ANY($1)
              AND price_per_hour > 0
              AND created_at >= $2
        "#;

        let rows = sqlx::query(query)
            .bind(provider_ids)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        let mut by_provider: HashMap<String, Vec<PricePoint>> = HashMap::new();
        for row in &rows {
            let point = PricePoint {
                provider_id: row.try_get("tutor_id")?,
                price_per_hour: row.try_get("price_per_hour")?,
                observed_at: row.try_get("created_at")?,
            };
            by_provider.entry(point.provider_id.clone()).or_default().push(point);
        }

        Ok(by_provider)
    }

    /// Listings per provider
    async fn get_listings(
        &self,
        provider_ids: &[String],
    ) -> Result<HashMap<String, Vec<Listing>>, PostgresError> {
        let query = r#"
            SELECT tutor_id, course_id, session_format, is_active
            FROM tutor_listings
            WHERE tutor_id = ANY($1)
        "#;

        let rows = sqlx::query(query).bind(provider_ids).fetch_all(&self.pool).await?;

        let mut by_provider: HashMap<String, Vec<Listing>> = HashMap::new();
        for row in &rows {
            let format: Option<String> = row.try_get("session_format")?;
            let listing = Listing {
                provider_id: row.try_get("tutor_id")?,
                course_id: row.try_get("course_id")?,
                session_format: format
                    .as_deref()
                    .and_then(SessionFormat::parse)
                    .unwrap_or_default(),
                is_active: row.try_get("is_active")?,
            };
            by_provider.entry(listing.provider_id.clone()).or_default().push(listing);
        }

        Ok(by_provider)
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Session format as compared in SQL: lowercase, alphanumerics only
///
/// Mirrors `SessionFormat::parse`, so "In-Person", "in_person" and "inperson"
/// rows all match the in-person filter.
fn folded_format(format: SessionFormat) -> String {
    format
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn raw_record_from_row(row: &PgRow) -> Result<RawProviderRecord, PostgresError> {
    Ok(RawProviderRecord {
        provider_id: row.try_get("provider_id")?,
        rating: row.try_get("average_rating")?,
        review_count: row.try_get("review_count")?,
        completion_rate: row.try_get("completion_rate")?,
        student_count: row.try_get("student_count")?,
        credentials_count: row.try_get("credentials_count")?,
        created_at: row.try_get("created_at")?,
        location: row.try_get("location")?,
        country: row.try_get("country")?,
        grade_levels: row
            .try_get::<Option<Vec<String>>, _>("grade_levels")?
            .unwrap_or_default(),
        session_format: row.try_get("session_format")?,
    })
}
