use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{
    Attribute, Attributes, ObjectStore, PutOptions, PutPayload, Result as ObjectResult,
};
use std::sync::Arc;
use trefa_core::build_public_url;

/// S3-compatible object storage (Supabase Storage, MinIO, AWS S3)
#[derive(Clone)]
pub struct S3Storage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    public_base_url: Option<String>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// Credentials are read from the standard `AWS_*` environment variables.
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `region` - Region identifier (any value the provider accepts)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "https://<project>.supabase.co/storage/v1/s3" for Supabase)
    /// * `public_base_url` - Optional base under which objects are publicly readable
    ///   (e.g., "https://<project>.supabase.co/storage/v1/object/public/<bucket>")
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http)
                .with_virtual_hosted_style_request(false);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store: Arc::new(store),
            bucket,
            region,
            endpoint_url,
            public_base_url,
        })
    }

    /// Wrap an already-built object store (e.g. `object_store::memory::InMemory` in tests).
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        public_base_url: Option<String>,
    ) -> Self {
        S3Storage {
            store,
            bucket: bucket.into(),
            region: String::new(),
            endpoint_url: None,
            public_base_url,
        }
    }

    /// Generate public URL for an object
    ///
    /// Prefers the configured public base (with per-segment encoding). Otherwise uses
    /// path-style `{endpoint}/{bucket}/{key}` for custom endpoints, or the AWS
    /// virtual-hosted format.
    fn generate_url(&self, key: &str) -> String {
        if let Some(ref base) = self.public_base_url {
            return build_public_url(base, key).unwrap_or_default();
        }
        if let Some(ref endpoint) = self.endpoint_url {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String> {
        let size = data.len() as u64;
        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        // Plain puts overwrite, which is what re-runs rely on.
        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(data), opts)
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload_with_key failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        let url = self.generate_url(storage_key);

        tracing::debug!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload_with_key successful"
        );

        Ok(url)
    }

    fn public_url(&self, storage_key: &str) -> String {
        self.generate_url(storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use object_store::ObjectStoreExt;

    const PUBLIC_BASE: &str = "https://x.supabase.co/storage/v1/object/public/fotos_airtable";

    fn storage() -> (S3Storage, Arc<InMemory>) {
        let store = Arc::new(InMemory::new());
        let storage = S3Storage::with_store(
            store.clone(),
            "fotos_airtable",
            Some(PUBLIC_BASE.to_string()),
        );
        (storage, store)
    }

    async fn stored(store: &InMemory, key: &str) -> Bytes {
        store
            .get(&Path::from(key))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_overwrites_and_returns_public_url() {
        let (storage, store) = storage();

        let url = storage
            .upload_with_key("PO-1/front.webp", Bytes::from_static(b"one"), "image/webp")
            .await
            .unwrap();
        assert_eq!(url, format!("{}/PO-1/front.webp", PUBLIC_BASE));

        storage
            .upload_with_key("PO-1/front.webp", Bytes::from_static(b"two"), "image/webp")
            .await
            .unwrap();
        assert_eq!(stored(&store, "PO-1/front.webp").await, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_upload_sets_content_type() {
        let (storage, store) = storage();
        storage
            .upload_with_key("PO-1/x.webp", Bytes::from_static(b"x"), "image/webp")
            .await
            .unwrap();

        let result = store.get(&Path::from("PO-1/x.webp")).await.unwrap();
        assert_eq!(
            result
                .attributes
                .get(&Attribute::ContentType)
                .map(|v| AsRef::<str>::as_ref(v)),
            Some("image/webp")
        );
    }

    #[test]
    fn test_public_url_encodes_segments() {
        let (storage, _) = storage();
        assert_eq!(
            storage.public_url("PO 1/front view.webp"),
            format!("{}/PO%201/front%20view.webp", PUBLIC_BASE)
        );
    }
}
