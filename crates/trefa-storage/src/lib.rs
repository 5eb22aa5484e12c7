//! TREFA Storage Library
//!
//! This crate provides the storage abstraction used by the image sync, with an
//! S3-compatible backend (Supabase Storage, MinIO, AWS) and a local filesystem backend.
//!
//! # Storage key format
//!
//! Every transcoded image lives at `{business_key}/{sanitized_filename}.webp`. Keys
//! are deterministic so re-running a sync overwrites instead of duplicating. Key
//! generation is centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{image_key, sanitize_filename};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use trefa_core::StorageBackend;
pub use traits::{Storage, StorageError, StorageResult};
