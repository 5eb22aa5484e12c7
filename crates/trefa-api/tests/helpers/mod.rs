//! Test helpers: build AppState and router over in-memory repositories.
//!
//! Run with: `cargo test -p trefa-api`. No database or network access is needed.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trefa_api::setup::routes::setup_routes;
use trefa_api::{AppState, InventoryService, SyncHandle};
use trefa_core::models::{VehicleFilters, LISTED_STATUS};
use trefa_core::{
    AppConfig, AppError, BaseConfig, Config, InventoryConfig, PipelineConfig, SourceConfig,
    StorageBackend, StorageConfig,
};
use trefa_db::{InventoryRepository, VehicleRow};
use trefa_sync::SyncRunner;

pub const PUBLIC_BASE: &str = "https://cdn.test/storage/v1/object/public/fotos_airtable";

pub fn test_config() -> Config {
    Config(Box::new(AppConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            db_max_connections: 1,
            db_timeout_seconds: 1,
            environment: "test".to_string(),
        },
        database_url: "postgres://localhost/trefa_test".to_string(),
        source: SourceConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            api_key: None,
            base_id: "appTest".to_string(),
            table_id: "tblTest".to_string(),
            view_id: "viwTest".to_string(),
            page_size: 100,
            status_filter: LISTED_STATUS.to_string(),
        },
        storage: StorageConfig {
            backend: StorageBackend::Local,
            bucket: "fotos_airtable".to_string(),
            region: None,
            endpoint: None,
            public_base_url: Some(PUBLIC_BASE.to_string()),
            local_path: Some("/tmp/trefa-test".to_string()),
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

/// Inventory rows held in memory; `ping` fails when `healthy` is false.
pub struct StaticInventory {
    pub rows: Vec<VehicleRow>,
    pub healthy: bool,
    pub reads: AtomicUsize,
}

impl StaticInventory {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .filter_map(|v| v.as_object().cloned())
                .collect(),
            healthy: true,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn text<'a>(row: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
        row.get(key).and_then(Value::as_str)
    }
}

#[async_trait]
impl InventoryRepository for StaticInventory {
    async fn list_listed(&self) -> Result<Vec<VehicleRow>, AppError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .iter()
            .filter(|r| Self::text(r, "ordenstatus") == Some(LISTED_STATUS))
            .cloned()
            .collect())
    }

    async fn list_filtered(
        &self,
        filters: &VehicleFilters,
    ) -> Result<(Vec<VehicleRow>, i64), AppError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let matching: Vec<VehicleRow> = self
            .rows
            .iter()
            .filter(|r| Self::text(r, "ordenstatus") == Some(LISTED_STATUS))
            .filter(|r| {
                filters.marca.is_empty()
                    || Self::text(r, "marca").is_some_and(|m| filters.marca.iter().any(|f| f == m))
            })
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filters.offset() as usize)
            .take(filters.page_size as usize)
            .collect();
        Ok((page, total))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<VehicleRow>, AppError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .iter()
            .find(|r| Self::text(r, "slug") == Some(slug))
            .cloned())
    }

    async fn ping(&self) -> Result<(), AppError> {
        if self.healthy {
            Ok(())
        } else {
            Err(AppError::Internal("connection refused".to_string()))
        }
    }
}

pub fn vehicle(record_id: &str, slug: &str, marca: &str, status: &str) -> Value {
    json!({
        "id": 1,
        "record_id": record_id,
        "slug": slug,
        "marca": marca,
        "ordenstatus": status,
        "feature_image": format!("{}/front.webp", record_id),
        "fotos_exterior_url": [format!("{}/side.webp", record_id)],
        "fotos_interior_url": null,
    })
}

pub fn test_server(inventory: Arc<StaticInventory>, sync: SyncHandle) -> TestServer {
    let config = test_config();
    let service = InventoryService::new(
        inventory,
        config.inventory_public_base_url().map(String::from),
        Duration::from_secs(60),
        config.inventory().cache_max_entries,
    );
    let state = Arc::new(AppState::new(service, sync));
    let router = setup_routes(&config, state).expect("Failed to build router");
    TestServer::new(router.into_make_service()).expect("Failed to create test server")
}

pub fn ready(runner: SyncRunner) -> SyncHandle {
    SyncHandle::Ready(Arc::new(runner))
}
