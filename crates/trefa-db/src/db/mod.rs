//! Database repositories for data access layer
//!
//! Each repository exposes a trait (so the sync and the API can be exercised with
//! in-memory fakes) and a PostgreSQL implementation.
//
// Image URL upsert via the cache's stored procedure
pub mod images;
//
// Inventory read queries
pub mod inventory;

pub use images::{ImageCacheRepository, ImageUpdate, PgImageCacheRepository};
pub use inventory::{InventoryRepository, PgInventoryRepository, VehicleRow};
