//! Cached inventory reads.
//!
//! Each listing shape has its own bounded TTL cache; entries expire after the configured
//! TTL and are never invalidated by the image sync.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use trefa_core::models::{transform_vehicle, VehicleFilters, VehiclePage};
use trefa_core::{AppError, Clock, SystemClock, TtlCache};
use trefa_db::InventoryRepository;

#[derive(Clone)]
pub struct InventoryService {
    repository: Arc<dyn InventoryRepository>,
    public_base_url: Option<String>,
    listed: Arc<TtlCache<(), Arc<Vec<Value>>>>,
    pages: Arc<TtlCache<String, VehiclePage>>,
    by_slug: Arc<TtlCache<String, Value>>,
}

impl InventoryService {
    pub fn new(
        repository: Arc<dyn InventoryRepository>,
        public_base_url: Option<String>,
        ttl: Duration,
        max_entries: usize,
    ) -> Self {
        Self::with_clock(
            repository,
            public_base_url,
            ttl,
            max_entries,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        repository: Arc<dyn InventoryRepository>,
        public_base_url: Option<String>,
        ttl: Duration,
        max_entries: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            public_base_url,
            listed: Arc::new(TtlCache::with_clock(ttl, 1, clock.clone())),
            pages: Arc::new(TtlCache::with_clock(ttl, max_entries, clock.clone())),
            by_slug: Arc::new(TtlCache::with_clock(ttl, max_entries, clock)),
        }
    }

    fn enrich(&self, row: trefa_db::VehicleRow) -> Value {
        transform_vehicle(row, self.public_base_url.as_deref())
    }

    /// Every listed vehicle, enriched.
    pub async fn list_listed(&self) -> Result<Arc<Vec<Value>>, AppError> {
        if let Some(cached) = self.listed.get(&()) {
            tracing::debug!(count = cached.len(), "Serving listed vehicles from cache");
            return Ok(cached);
        }

        let rows = self.repository.list_listed().await?;
        let vehicles: Arc<Vec<Value>> =
            Arc::new(rows.into_iter().map(|row| self.enrich(row)).collect());
        self.listed.insert((), vehicles.clone());

        tracing::info!(count = vehicles.len(), "Fetched listed vehicles");
        Ok(vehicles)
    }

    pub async fn list_filtered(&self, filters: &VehicleFilters) -> Result<VehiclePage, AppError> {
        let key = filters.cache_key();
        if let Some(cached) = self.pages.get(&key) {
            tracing::debug!(page = filters.page, "Serving filtered vehicles from cache");
            return Ok(cached);
        }

        let (rows, total_count) = self.repository.list_filtered(filters).await?;
        let page = VehiclePage {
            vehicles: rows.into_iter().map(|row| self.enrich(row)).collect(),
            total_count,
            page: filters.page,
            page_size: filters.page_size,
            total_pages: filters.total_pages(total_count),
        };
        self.pages.insert(key, page.clone());

        tracing::info!(
            count = page.vehicles.len(),
            total_count = total_count,
            page = filters.page,
            "Fetched filtered vehicles"
        );
        Ok(page)
    }

    /// One vehicle by slug. Misses are not cached.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Value>, AppError> {
        let key = slug.to_string();
        if let Some(cached) = self.by_slug.get(&key) {
            return Ok(Some(cached));
        }

        let Some(row) = self.repository.find_by_slug(slug).await? else {
            return Ok(None);
        };
        let vehicle = self.enrich(row);
        self.by_slug.insert(key, vehicle.clone());
        Ok(Some(vehicle))
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.repository.ping().await
    }
}
