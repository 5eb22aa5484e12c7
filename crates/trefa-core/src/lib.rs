//! TREFA Core Library
//!
//! This crate provides core domain models, error types, configuration, and small
//! shared utilities (retry policy, TTL cache, path classification) used by every
//! TREFA component.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod path_like;
pub mod retry;
pub mod storage_types;

// Re-export commonly used types
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use config::{
    AppConfig, BaseConfig, Config, InventoryConfig, PipelineConfig, SourceConfig, StorageConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{ErrorEntry, RunReport, Stage};
pub use path_like::{build_public_url, PathLike};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use storage_types::StorageBackend;
