//! TREFA image sync
//!
//! Pulls inventory records from Airtable, downloads their photo attachments, transcodes
//! them to width-capped WebP, uploads them under deterministic keys, and upserts the
//! resulting public URLs into the inventory cache.
//!
//! The pipeline is assembled from trait seams ([`RecordSource`], [`AttachmentFetcher`],
//! `Storage`, `ImageCacheRepository`) so every stage can be swapped for an in-memory
//! fake.

pub mod committer;
pub mod error;
pub mod fetch;
pub mod pool;
pub mod processor;
pub mod runner;
pub mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use committer::{build_update, ResultCommitter};
pub use error::{FetchError, SourceError, SyncError, SyncFailure};
pub use fetch::{AttachmentFetcher, HttpFetcher};
pub use pool::{ConcurrencyPool, TaskGroup, TaskPanic};
pub use processor::{AttachmentProcessor, UploadedImage};
pub use runner::{RecordOutcome, SyncRunner, SyncSettings};
pub use source::{enumerate_records, AirtableSource, RecordSource, SourceItem, SourcePage};
