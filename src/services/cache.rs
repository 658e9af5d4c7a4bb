use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::PricingQuery;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// Two-tier response cache
///
/// L1 is an in-process moka cache, L2 is Redis and shared across instances.
/// Only the HTTP layer uses it; the engine itself never stores results.
pub struct CacheManager {
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
}

impl CacheManager {
    /// Create a new cache manager
    pub async fn new(redis_url: &str, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
            l1_cache,
            ttl_secs,
        })
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        if let Some(json) = value {
            tracing::trace!("L2 cache hit: {}", key);

            // Populate L1 cache
            self.l1_cache.insert(key.to_string(), json.as_bytes().to_vec()).await;

            return Ok(serde_json::from_str(&json)?);
        }

        tracing::trace!("Cache miss: {}", key);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value in cache (both L1 and L2)
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;

        self.l1_cache.insert(key.to_string(), json.as_bytes().to_vec()).await;

        let mut conn = self.redis.lock().await;
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_secs)
            .arg(json)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a price suggestion
    ///
    /// Every part of the query that changes the result is encoded, so two
    /// requests share a key only when the engine would answer them identically.
    pub fn suggestion(query: &PricingQuery, config_version: &str) -> String {
        let mut grades: Vec<String> = query
            .filters
            .grade_levels
            .iter()
            .map(|g| g.trim().to_lowercase())
            .collect();
        grades.sort();

        let format = query
            .filters
            .session_format
            .map(|f| f.as_str())
            .unwrap_or("-");

        // JSON lists keep ids containing separators distinct
        let courses = serde_json::to_string(&query.filters.course_ids).unwrap_or_default();
        let grades = serde_json::to_string(&grades).unwrap_or_default();

        format!(
            "suggestion:{}:{}:{}:{}:{}:{}",
            config_version,
            serde_json::to_string(&query.requester_id).unwrap_or_default(),
            query.time_period_months,
            format,
            courses,
            grades,
        )
    }
}
