//! In-memory fakes for the pipeline seams.
//!
//! Used by this crate's tests and, through the `testing` feature, by the API tests.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use trefa_core::models::SourceRecord;
use trefa_core::{AppError, RetryPolicy, StorageBackend};
use trefa_db::{ImageCacheRepository, ImageUpdate};
use trefa_processing::WebpTranscoder;
use trefa_storage::{Storage, StorageError, StorageResult};

use crate::committer::ResultCommitter;
use crate::error::{FetchError, SourceError};
use crate::fetch::AttachmentFetcher;
use crate::processor::AttachmentProcessor;
use crate::runner::{SyncRunner, SyncSettings};
use crate::source::{RecordSource, SourcePage};

/// Encode a solid-colour PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([20, 120, 200, 255]));
    let mut buffer = Vec::new();
    if let Err(e) = image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
    {
        panic!("failed to encode test PNG: {e}");
    }
    buffer
}

/// Source serving fixed pages, linked by numeric offsets.
pub struct FakeSource {
    pages: Vec<Vec<SourceRecord>>,
    unreachable: bool,
    calls: AtomicUsize,
}

impl FakeSource {
    /// Each inner vector is one page of `{ "id": .., "fields": {..} }` objects.
    pub fn paged(pages: Vec<Vec<Value>>) -> Self {
        let pages = pages
            .into_iter()
            .map(|page| page.iter().map(record_from_json).collect())
            .collect();
        Self {
            pages,
            unreachable: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn single_page(records: Vec<Value>) -> Self {
        Self::paged(vec![records])
    }

    /// Every page request fails.
    pub fn unreachable() -> Self {
        Self {
            pages: Vec::new(),
            unreachable: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn record_from_json(value: &Value) -> SourceRecord {
    let id = value.get("id").and_then(Value::as_str).unwrap_or_default();
    let fields = value
        .get("fields")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    SourceRecord::from_fields(id, &fields)
}

#[async_trait::async_trait]
impl RecordSource for FakeSource {
    async fn fetch_page(&self, offset: Option<&str>) -> Result<SourcePage, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(SourceError::Status {
                status: 503,
                body: "source down".to_string(),
            });
        }

        let index = match offset {
            Some(offset) => offset
                .parse::<usize>()
                .map_err(|e| SourceError::Decode(e.to_string()))?,
            None => 0,
        };
        let records = self.pages.get(index).cloned().unwrap_or_default();
        let next = index + 1;
        Ok(SourcePage {
            records,
            offset: (next < self.pages.len()).then(|| next.to_string()),
        })
    }
}

#[derive(Clone)]
enum FakeResponse {
    Body(Bytes),
    Status(u16),
}

/// Fetcher answering from a URL table, with optional per-URL latency.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, (FakeResponse, Duration)>,
    calls: Mutex<HashMap<String, usize>>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, url: &str, body: Vec<u8>) -> Self {
        self.with_delayed_image(url, body, Duration::ZERO)
    }

    pub fn with_delayed_image(mut self, url: &str, body: Vec<u8>, delay: Duration) -> Self {
        self.responses
            .insert(url.to_string(), (FakeResponse::Body(Bytes::from(body)), delay));
        self
    }

    /// `url` always answers with `status`.
    pub fn with_failure(mut self, url: &str, status: u16) -> Self {
        self.responses
            .insert(url.to_string(), (FakeResponse::Status(status), Duration::ZERO));
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of fetches observed in progress at once.
    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AttachmentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(url.to_string())
            .or_insert(0) += 1;

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);

        let (response, delay) = self
            .responses
            .get(url)
            .cloned()
            .unwrap_or((FakeResponse::Status(404), Duration::ZERO));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        match response {
            FakeResponse::Body(body) => Ok(body),
            FakeResponse::Status(status) => Err(FetchError::Status(status)),
        }
    }
}

/// Object store kept in a map; URLs are `{base_url}/{key}`.
pub struct MemoryStorage {
    base_url: String,
    objects: Mutex<BTreeMap<String, Bytes>>,
    fail_uploads: bool,
    upload_attempts: AtomicUsize,
}

impl MemoryStorage {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            objects: Mutex::new(BTreeMap::new()),
            fail_uploads: false,
            upload_attempts: AtomicUsize::new(0),
        }
    }

    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn upload_attempts(&self) -> usize {
        self.upload_attempts.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Bytes>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<String> {
        self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads {
            return Err(StorageError::UploadFailed("bucket unavailable".to_string()));
        }
        self.lock().insert(storage_key.to_string(), data);
        Ok(self.public_url(storage_key))
    }

    fn public_url(&self, storage_key: &str) -> String {
        if self.base_url.is_empty() {
            return String::new();
        }
        format!("{}/{}", self.base_url.trim_end_matches('/'), storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Records every upsert; rows are keyed by `ordencompra` like the real table.
#[derive(Default)]
pub struct MemoryRepository {
    upserts: Mutex<Vec<ImageUpdate>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upsert fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn upserts(&self) -> Vec<ImageUpdate> {
        self.upserts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Latest update per business key.
    pub fn rows(&self) -> BTreeMap<String, ImageUpdate> {
        self.upserts()
            .into_iter()
            .map(|update| (update.ordencompra.clone(), update))
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ImageCacheRepository for MemoryRepository {
    async fn upsert_images(&self, update: &ImageUpdate) -> Result<(), AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Internal("connection refused".to_string()));
        }
        self.upserts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(update.clone());
        Ok(())
    }
}

/// Runner over the given fakes with millisecond backoff.
pub fn runner(
    source: Arc<dyn RecordSource>,
    fetcher: Arc<dyn AttachmentFetcher>,
    storage: Arc<dyn Storage>,
    repository: Arc<dyn ImageCacheRepository>,
    settings: SyncSettings,
) -> SyncRunner {
    let retry = RetryPolicy::new(3, Duration::from_millis(1));
    let processor =
        AttachmentProcessor::new(fetcher, storage, WebpTranscoder::new(1920, 85.0), retry);
    let committer = ResultCommitter::new(repository, RetryPolicy::new(2, Duration::from_millis(1)));
    SyncRunner::new(source, processor, committer, settings)
}

/// Settings suitable for tests: `Comprado` filter, fast retries.
pub fn test_settings(max_concurrent_uploads: usize) -> SyncSettings {
    SyncSettings {
        status_filter: "Comprado".to_string(),
        source_retry: RetryPolicy::new(1, Duration::from_millis(1)),
        max_concurrent_uploads,
        record_concurrency: max_concurrent_uploads,
        run_timeout: None,
    }
}
