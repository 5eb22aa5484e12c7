//! Service and repository wiring

use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use trefa_core::Config;
use trefa_db::{PgImageCacheRepository, PgInventoryRepository};
use trefa_storage::Storage;
use trefa_sync::SyncRunner;

use crate::services::InventoryService;
use crate::state::{AppState, SyncHandle};

/// Build the application state from the pool and storage.
///
/// A missing Airtable key leaves the sync unavailable instead of failing startup, so the
/// read API keeps serving.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let inventory = InventoryService::new(
        Arc::new(PgInventoryRepository::new(pool.clone())),
        config.inventory_public_base_url().map(String::from),
        Duration::from_secs(config.inventory().cache_ttl_secs),
        config.inventory().cache_max_entries,
    );

    let sync = match SyncRunner::from_config(
        config,
        storage,
        Arc::new(PgImageCacheRepository::new(pool)),
    ) {
        Ok(runner) => {
            let settings = runner.settings();
            tracing::info!(
                status_filter = %settings.status_filter,
                max_concurrent_uploads = settings.max_concurrent_uploads,
                record_concurrency = settings.record_concurrency,
                "Image sync ready"
            );
            SyncHandle::Ready(Arc::new(runner))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Image sync unavailable");
            SyncHandle::Unavailable(e.to_string())
        }
    };

    Ok(Arc::new(AppState::new(inventory, sync)))
}
