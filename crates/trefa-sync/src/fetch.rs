use std::time::Duration;

use bytes::Bytes;

use crate::error::FetchError;

/// Trait for downloading attachment bytes
/// This abstracts the HTTP client so the pipeline can be exercised without a network
#[async_trait::async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Plain HTTP GET; any non-2xx status is a failure.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl AttachmentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let data = response.bytes().await?;
        tracing::debug!(url = %url, size_bytes = data.len(), "Fetched attachment");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn fetches_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/att/front.jpg")
            .with_status(200)
            .with_body(b"jpeg-bytes")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let data = fetcher
            .fetch(&format!("{}/att/front.jpg", server.url()))
            .await
            .unwrap();
        assert_eq!(&data[..], b"jpeg-bytes");
    }

    #[tokio::test]
    async fn non_success_is_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/att/gone.jpg")
            .with_status(410)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let result = fetcher
            .fetch(&format!("{}/att/gone.jpg", server.url()))
            .await;
        assert!(matches!(result, Err(FetchError::Status(410))));
    }
}
