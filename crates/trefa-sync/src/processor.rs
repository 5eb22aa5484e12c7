//! Per-attachment work: fetch, transcode to WebP, upload.
//!
//! Each stage's terminal failure becomes exactly one [`ErrorEntry`] tagged with that
//! stage, and the attachment contributes nothing to the commit.

use std::sync::Arc;

use trefa_core::models::{AttachmentGroup, AttachmentTask, ErrorEntry, Stage};
use trefa_core::{retry_with_backoff, RetryPolicy};
use trefa_processing::{WebpTranscoder, WEBP_CONTENT_TYPE};
use trefa_storage::{image_key, Storage};

use crate::fetch::AttachmentFetcher;

/// A successfully uploaded attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub group: AttachmentGroup,
    pub index: usize,
    pub storage_key: String,
    pub public_url: String,
}

#[derive(Clone)]
pub struct AttachmentProcessor {
    fetcher: Arc<dyn AttachmentFetcher>,
    storage: Arc<dyn Storage>,
    transcoder: WebpTranscoder,
    retry: RetryPolicy,
}

impl AttachmentProcessor {
    pub fn new(
        fetcher: Arc<dyn AttachmentFetcher>,
        storage: Arc<dyn Storage>,
        transcoder: WebpTranscoder,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            storage,
            transcoder,
            retry,
        }
    }

    #[tracing::instrument(skip(self, task), fields(
        ordencompra = %task.business_key,
        filename = %task.filename,
        group = ?task.group
    ))]
    pub async fn process(&self, task: AttachmentTask) -> Result<UploadedImage, ErrorEntry> {
        let fail = |stage: Stage, error: String| {
            tracing::warn!(stage = %stage, error = %error, "Attachment failed");
            ErrorEntry::new(&task.business_key, &task.filename, error, stage)
        };

        let fetcher = &self.fetcher;
        let original = retry_with_backoff(self.retry, "attachment_fetch", || {
            fetcher.fetch(&task.url)
        })
        .await
        .map_err(|e| fail(Stage::Fetch, e.to_string()))?;

        // Decoding failures are permanent; no retry.
        let processed = self
            .transcoder
            .transcode_blocking(original)
            .await
            .map_err(|e| fail(Stage::Transcode, e.to_string()))?;

        let storage_key = image_key(&task.business_key, &task.filename);
        let storage = &self.storage;
        let public_url = retry_with_backoff(self.retry, "attachment_upload", || {
            storage.upload_with_key(&storage_key, processed.data.clone(), WEBP_CONTENT_TYPE)
        })
        .await
        .map_err(|e| fail(Stage::Upload, e.to_string()))?;

        if public_url.trim().is_empty() {
            return Err(fail(
                Stage::Upload,
                "No public URL generated".to_string(),
            ));
        }

        tracing::debug!(
            storage_key = %storage_key,
            width = processed.width,
            height = processed.height,
            size_bytes = processed.data.len(),
            "Attachment uploaded"
        );

        Ok(UploadedImage {
            group: task.group,
            index: task.index,
            storage_key,
            public_url,
        })
    }
}
