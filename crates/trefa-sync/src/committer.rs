//! Turn one record's drained uploads into a single cache upsert.

use std::sync::Arc;

use trefa_core::models::{AttachmentGroup, ErrorEntry};
use trefa_core::{retry_with_backoff, RetryPolicy};
use trefa_db::{ImageCacheRepository, ImageUpdate};

use crate::processor::UploadedImage;

/// Build the URL set for a record.
///
/// `uploads` must be in submission order; the feature image is the first successful
/// feature upload.
pub fn build_update(
    business_key: &str,
    record_id: &str,
    uploads: &[UploadedImage],
) -> ImageUpdate {
    let urls = |group: AttachmentGroup| {
        uploads
            .iter()
            .filter(move |u| u.group == group)
            .map(|u| u.public_url.clone())
    };

    ImageUpdate {
        ordencompra: business_key.to_string(),
        feature_image: urls(AttachmentGroup::Feature).next(),
        fotos_exterior: urls(AttachmentGroup::Exterior).collect(),
        fotos_interior: urls(AttachmentGroup::Interior).collect(),
        record_id: Some(record_id.to_string()).filter(|id| !id.is_empty()),
    }
}

#[derive(Clone)]
pub struct ResultCommitter {
    repository: Arc<dyn ImageCacheRepository>,
    retry: RetryPolicy,
}

impl ResultCommitter {
    pub fn new(repository: Arc<dyn ImageCacheRepository>, retry: RetryPolicy) -> Self {
        Self { repository, retry }
    }

    /// Upsert `update`; on exhaustion returns the commit-stage error entry.
    pub async fn commit(&self, update: &ImageUpdate) -> Result<(), ErrorEntry> {
        let repository = &self.repository;
        retry_with_backoff(self.retry, "cache_upsert", || {
            repository.upsert_images(update)
        })
        .await
        .map_err(|e| {
            tracing::error!(
                ordencompra = %update.ordencompra,
                error = %e,
                "Failed to commit image URLs"
            );
            ErrorEntry::commit(&update.ordencompra, e.to_string())
        })?;

        tracing::info!(
            ordencompra = %update.ordencompra,
            feature = update.feature_image.is_some(),
            exterior = update.fotos_exterior.len(),
            interior = update.fotos_interior.len(),
            "Committed image URLs"
        );
        Ok(())
    }
}
