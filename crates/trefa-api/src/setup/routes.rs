//! Route configuration and setup

use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use trefa_core::Config;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    // Server-level concurrency limit to protect against resource exhaustion under extreme load
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let app = Router::new()
        .route("/health", get(handlers::health::liveness_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route(
            "/sync/images",
            get(handlers::sync::run_image_sync).post(handlers::sync::run_image_sync),
        )
        .route("/vehicles", get(handlers::vehicles::list_vehicles))
        .route("/vehicles/{slug}", get(handlers::vehicles::get_vehicle))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trefa_core::{AppConfig, BaseConfig, InventoryConfig, PipelineConfig, SourceConfig};
    use trefa_core::{StorageBackend, StorageConfig};

    fn config_with_origins(origins: &[&str]) -> Config {
        Config(Box::new(AppConfig {
            base: BaseConfig {
                server_port: 4000,
                cors_origins: origins.iter().map(|s| s.to_string()).collect(),
                db_max_connections: 1,
                db_timeout_seconds: 1,
                environment: "test".to_string(),
            },
            database_url: "postgres://localhost/test".to_string(),
            source: SourceConfig {
                api_url: "http://localhost".to_string(),
                api_key: None,
                base_id: "app".to_string(),
                table_id: "tbl".to_string(),
                view_id: "viw".to_string(),
                page_size: 100,
                status_filter: "Comprado".to_string(),
            },
            storage: StorageConfig {
                backend: StorageBackend::Local,
                bucket: "fotos_airtable".to_string(),
                region: None,
                endpoint: None,
                public_base_url: None,
                local_path: Some("/tmp".to_string()),
                local_base_url: Some("http://localhost/media".to_string()),
            },
            pipeline: PipelineConfig::default(),
            inventory: InventoryConfig {
                cache_ttl_secs: 60,
                cache_max_entries: 1000,
                public_base_url: None,
            },
        }))
    }

    #[test]
    fn rejects_unparsable_origin() {
        assert!(setup_cors(&config_with_origins(&["https://ok.mx", "bad\norigin"])).is_err());
        assert!(setup_cors(&config_with_origins(&["https://ok.mx"])).is_ok());
        assert!(setup_cors(&config_with_origins(&["*"])).is_ok());
    }
}
