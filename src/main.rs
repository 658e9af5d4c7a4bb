use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tutor_pricing::config::{LoggingSettings, Settings};
use tutor_pricing::core::{EngineConfig, PricingEngine};
use tutor_pricing::routes::{self, pricing::AppState};
use tutor_pricing::services::{CacheManager, PostgresClient};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// RUST_LOG wins over the configured level when set
fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(&LoggingSettings::default());
            error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
        }
    };

    init_logging(&settings.logging);

    info!("Starting tutor pricing service...");

    let engine_config = EngineConfig::from_settings(&settings.pricing).map_err(|e| {
        error!("Invalid pricing configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    info!(
        "Pricing engine {} initialized with weights: {:?}",
        engine_config.version(),
        engine_config.weights()
    );

    let engine = Arc::new(PricingEngine::new(engine_config));

    // Initialize PostgreSQL client
    let db_max_conn = settings.database.max_connections.unwrap_or(10);
    let db_min_conn = settings.database.min_connections.unwrap_or(1);

    let postgres = PostgresClient::from_settings(
        &settings.database.url,
        Some(db_max_conn),
        Some(db_min_conn),
        settings.database.acquire_timeout_secs,
        settings.database.idle_timeout_secs,
    )
    .await
    .map_err(|e| {
        error!("Failed to connect to PostgreSQL: {}", e);
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e)
    })?;

    let postgres = Arc::new(postgres);

    info!("PostgreSQL client initialized (max: {} connections)", db_max_conn);

    // Initialize cache manager (optional - the service works without it)
    let cache = match (&settings.cache.redis_url, settings.cache.enabled) {
        (Some(redis_url), true) => {
            let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
            let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);

            match CacheManager::new(redis_url, l1_cache_size, cache_ttl).await {
                Ok(c) => {
                    info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
                    Some(Arc::new(c))
                }
                Err(e) => {
                    warn!("Failed to connect to Redis ({}), running without cache", e);
                    None
                }
            }
        }
        _ => {
            info!("Caching disabled");
            None
        }
    };

    let app_state = AppState {
        postgres,
        cache,
        engine,
        default_time_period_months: settings.pricing.default_time_period_months,
        max_listed_similar: settings.pricing.max_listed_similar,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
