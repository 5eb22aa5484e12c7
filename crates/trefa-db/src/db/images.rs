//! Image cache repository: writes synced image URLs into `inventario_cache`.

use sqlx::types::Json;
use sqlx::PgPool;
use trefa_core::AppError;

/// URL set for one record, as committed after its attachments drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageUpdate {
    pub ordencompra: String,
    pub feature_image: Option<String>,
    pub fotos_exterior: Vec<String>,
    pub fotos_interior: Vec<String>,
    pub record_id: Option<String>,
}

impl ImageUpdate {
    pub fn is_empty(&self) -> bool {
        self.feature_image.is_none() && self.fotos_exterior.is_empty() && self.fotos_interior.is_empty()
    }
}

/// Trait for the image cache write
/// This abstracts the database implementation (PostgreSQL)
#[async_trait::async_trait]
pub trait ImageCacheRepository: Send + Sync {
    /// Insert or overwrite the image columns of the row keyed by `ordencompra`.
    async fn upsert_images(&self, update: &ImageUpdate) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct PgImageCacheRepository {
    pool: PgPool,
}

impl PgImageCacheRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Empty lists are sent as SQL NULL so the procedure leaves the column untouched.
fn json_list(list: &[String]) -> Option<Json<&[String]>> {
    (!list.is_empty()).then_some(Json(list))
}

#[async_trait::async_trait]
impl ImageCacheRepository for PgImageCacheRepository {
    #[tracing::instrument(skip(self, update), fields(
        db.system = "postgresql",
        db.table = "inventario_cache",
        db.operation = "svc_sync_upsert_images",
        ordencompra = %update.ordencompra
    ))]
    async fn upsert_images(&self, update: &ImageUpdate) -> Result<(), AppError> {
        sqlx::query("SELECT public.svc_sync_upsert_images($1, $2, $3::jsonb, $4::jsonb, $5)")
            .bind(&update.ordencompra)
            .bind(&update.feature_image)
            .bind(json_list(&update.fotos_exterior))
            .bind(json_list(&update.fotos_interior))
            .bind(&update.record_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lists_become_null() {
        assert!(json_list(&[]).is_none());
        let urls = vec!["https://a/1.webp".to_string()];
        assert_eq!(json_list(&urls).map(|j| j.0.len()), Some(1));
    }

    #[test]
    fn update_emptiness() {
        let mut update = ImageUpdate {
            ordencompra: "PO-1".to_string(),
            ..Default::default()
        };
        assert!(update.is_empty());
        update.fotos_interior.push("https://a/i.webp".to_string());
        assert!(!update.is_empty());
    }
}
