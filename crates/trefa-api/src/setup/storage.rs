//! Storage setup and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use trefa_core::Config;
use trefa_storage::{create_storage, Storage};

/// Setup the object storage the image sync uploads into.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage abstraction...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(
        backend = ?storage.backend_type(),
        public_base_url = ?config.storage_public_base_url(),
        "Storage abstraction initialized successfully"
    );
    Ok(storage)
}
