use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use crate::core::{engine::Recommendation, population::window_start, PricingEngine};
use crate::models::{
    CandidateScoresResponse, EngineConfigResponse, ErrorResponse, HealthResponse, PricingQuery,
    SuggestPriceRequest, SuggestPriceResponse,
};
use crate::services::{CacheKey, CacheManager, PostgresClient, PostgresError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub postgres: Arc<PostgresClient>,
    pub cache: Option<Arc<CacheManager>>,
    pub engine: Arc<PricingEngine>,
    pub default_time_period_months: u32,
    pub max_listed_similar: usize,
}

/// Configure all pricing routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/pricing/suggest", web::post().to(suggest_price))
        .route("/pricing/candidates", web::post().to(candidate_scores))
        .route("/pricing/config", web::get().to(engine_config));
}

fn error_response(status: u16, error: &str, message: String) -> HttpResponse {
    let body = ErrorResponse {
        error: error.to_string(),
        message,
        status_code: status,
    };

    match status {
        400 => HttpResponse::BadRequest().json(body),
        404 => HttpResponse::NotFound().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let pg_healthy = state.postgres.health_check().await.unwrap_or(false);

    let status = if pg_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Validate the body and turn it into an engine query
fn parse_request(state: &AppState, req: &SuggestPriceRequest) -> Result<PricingQuery, HttpResponse> {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for pricing request: {:?}", errors);
        return Err(error_response(400, "Validation failed", errors.to_string()));
    }

    req.to_query(state.default_time_period_months).map_err(|e| {
        tracing::info!("Rejected pricing request for {}: {}", req.requester_id, e);
        error_response(400, "Invalid filter", e.to_string())
    })
}

/// Load the requester and candidate records, then run the engine
async fn run_engine(state: &AppState, query: &PricingQuery) -> Result<Recommendation, HttpResponse> {
    let requester = match state.postgres.get_provider(&query.requester_id).await {
        Ok(record) => record,
        Err(PostgresError::NotFound(message)) => {
            return Err(error_response(404, "Requester not found", message));
        }
        Err(e) => {
            tracing::error!("Failed to fetch provider {}: {}", query.requester_id, e);
            return Err(error_response(500, "Failed to fetch provider", e.to_string()));
        }
    };

    let now = Utc::now();
    let since = window_start(now, query.time_period_months);

    let records = match state.postgres.get_candidates(query, since).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Failed to query candidates for {}: {}", query.requester_id, e);
            return Err(error_response(500, "Failed to query candidates", e.to_string()));
        }
    };

    Ok(state.engine.recommend(&requester, records, query, now))
}

/// Suggest a price
///
/// POST /api/v1/pricing/suggest
///
/// Request body:
/// ```json
/// {
///   "requesterId": "string",
///   "timePeriodMonths": 3,
///   "courseIds": ["string"],
///   "gradeLevel": ["high_school"],
///   "sessionFormat": "Online|In-Person|Hybrid|all"
/// }
/// ```
async fn suggest_price(
    state: web::Data<AppState>,
    req: web::Json<SuggestPriceRequest>,
) -> impl Responder {
    let query = match parse_request(&state, &req) {
        Ok(query) => query,
        Err(response) => return response,
    };

    let cache_key = CacheKey::suggestion(&query, state.engine.config().version());

    if let Some(cache) = &state.cache {
        if let Ok(cached) = cache.get::<SuggestPriceResponse>(&cache_key).await {
            tracing::debug!("Serving cached suggestion for {}", query.requester_id);
            let response = SuggestPriceResponse::new(cached.suggestion, cached.similar_providers);
            return HttpResponse::Ok().json(response);
        }
    }

    let recommendation = match run_engine(&state, &query).await {
        Ok(recommendation) => recommendation,
        Err(response) => return response,
    };

    let threshold = state.engine.config().similarity_threshold();
    let similar_providers = recommendation
        .similar(threshold)
        .take(state.max_listed_similar)
        .cloned()
        .collect();

    let response = SuggestPriceResponse::new(recommendation.suggestion, similar_providers);

    tracing::info!(
        "Suggested {:?} for {} ({} similar of {}, {:?} confidence)",
        response.suggestion.suggested_price,
        query.requester_id,
        response.suggestion.similar_count,
        response.suggestion.total_candidates,
        response.suggestion.confidence_level
    );

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&cache_key, &response).await {
            tracing::warn!("Failed to cache suggestion for {}: {}", query.requester_id, e);
        }
    }

    HttpResponse::Ok().json(response)
}

/// Every scored candidate for a request, best match first
///
/// POST /api/v1/pricing/candidates
async fn candidate_scores(
    state: web::Data<AppState>,
    req: web::Json<SuggestPriceRequest>,
) -> impl Responder {
    let query = match parse_request(&state, &req) {
        Ok(query) => query,
        Err(response) => return response,
    };

    let recommendation = match run_engine(&state, &query).await {
        Ok(recommendation) => recommendation,
        Err(response) => return response,
    };

    HttpResponse::Ok().json(CandidateScoresResponse {
        requester_id: query.requester_id,
        similarity_threshold: state.engine.config().similarity_threshold(),
        total_candidates: recommendation.suggestion.total_candidates,
        candidates: recommendation.scored,
    })
}

/// Active engine configuration
///
/// GET /api/v1/pricing/config
async fn engine_config(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(config_response(&state.engine))
}

fn config_response(engine: &PricingEngine) -> EngineConfigResponse {
    let config = engine.config();
    EngineConfigResponse {
        version: config.version().to_string(),
        weights: *config.weights(),
        similarity_threshold: config.similarity_threshold(),
        high_confidence_min: config.confidence().high_min,
        medium_confidence_min: config.confidence().medium_min,
        price_tolerance: config.price_tolerance(),
    }
}
