//! TREFA API Library
//!
//! HTTP surface over the inventory cache: the image sync trigger, the vehicle listing
//! and health checks, plus the application setup that wires them.

mod handlers;
mod telemetry;

pub mod error;
pub mod services;
pub mod setup;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use services::InventoryService;
pub use state::{AppState, SyncHandle};
