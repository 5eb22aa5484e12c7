//! Tabular source (Airtable) reader and the record enumerator built on top of it.
//!
//! The enumerator is a lazy stream that follows the page cursor until the source stops
//! returning one. It holds no counters: records that fail the status filter come out as
//! [`SourceItem::Filtered`] so the orchestrator can count them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use trefa_core::models::SourceRecord;
use trefa_core::{retry_with_backoff, RetryPolicy, SourceConfig};

use crate::error::{SourceError, SyncError};

/// One page of source records plus the cursor for the next page, if any.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub records: Vec<SourceRecord>,
    pub offset: Option<String>,
}

/// Trait for paged access to the tabular source
/// This abstracts the upstream provider (Airtable)
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch the page starting at `offset` (`None` for the first page).
    async fn fetch_page(&self, offset: Option<&str>) -> Result<SourcePage, SourceError>;
}

#[derive(Debug, Deserialize)]
struct AirtablePage {
    #[serde(default)]
    records: Vec<AirtableRecord>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Airtable REST reader: `GET {api_url}/v0/{base}/{table}?view=..&pageSize=..[&offset=..]`.
#[derive(Clone)]
pub struct AirtableSource {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    base_id: String,
    table_id: String,
    view_id: String,
    page_size: u32,
}

impl AirtableSource {
    /// Build a reader from configuration. Fails when no API key is configured.
    pub fn from_config(config: &SourceConfig, timeout: Duration) -> Result<Self, SyncError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SyncError::NotConfigured("Missing AIRTABLE_API_KEY".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::NotConfigured(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            base_id: config.base_id.clone(),
            table_id: config.table_id.clone(),
            view_id: config.view_id.clone(),
            page_size: config.page_size,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/v0/{}/{}", self.api_url, self.base_id, self.table_id)
    }
}

#[async_trait::async_trait]
impl RecordSource for AirtableSource {
    async fn fetch_page(&self, offset: Option<&str>) -> Result<SourcePage, SourceError> {
        let mut query = vec![
            ("view", self.view_id.clone()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.table_url())
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let page: AirtablePage = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        tracing::debug!(
            records = page.records.len(),
            has_more = page.offset.is_some(),
            "Fetched source page"
        );

        Ok(SourcePage {
            records: page
                .records
                .into_iter()
                .map(|record| SourceRecord::from_fields(record.id, &record.fields))
                .collect(),
            offset: page.offset,
        })
    }
}

/// Item produced by [`enumerate_records`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    /// Record whose status matches the filter; may still lack a business key.
    Candidate(SourceRecord),
    /// Record excluded by the status filter.
    Filtered { record_id: String },
}

struct EnumeratorState {
    source: Arc<dyn RecordSource>,
    status_filter: String,
    retry: RetryPolicy,
    buffered: VecDeque<SourceRecord>,
    cursor: Option<String>,
    exhausted: bool,
}

/// Lazy, finite stream over every source record.
///
/// Each page fetch is retried under `retry`; once retries are exhausted the stream
/// yields the error and ends.
pub fn enumerate_records(
    source: Arc<dyn RecordSource>,
    status_filter: impl Into<String>,
    retry: RetryPolicy,
) -> BoxStream<'static, Result<SourceItem, SourceError>> {
    let state = EnumeratorState {
        source,
        status_filter: status_filter.into(),
        retry,
        buffered: VecDeque::new(),
        cursor: None,
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(record) = state.buffered.pop_front() {
                let item = if record.has_status(&state.status_filter) {
                    SourceItem::Candidate(record)
                } else {
                    SourceItem::Filtered {
                        record_id: record.id,
                    }
                };
                return Some((Ok(item), state));
            }

            if state.exhausted {
                return None;
            }

            let source = state.source.clone();
            let cursor = state.cursor.clone();
            let page = retry_with_backoff(state.retry, "source_page", || {
                let source = source.clone();
                let cursor = cursor.clone();
                async move { source.fetch_page(cursor.as_deref()).await }
            })
            .await;

            match page {
                Ok(page) => {
                    state.buffered.extend(page.records);
                    state.exhausted = page.offset.is_none();
                    state.cursor = page.offset;
                }
                Err(e) => {
                    state.exhausted = true;
                    state.buffered.clear();
                    return Some((Err(e), state));
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn source_config(api_url: &str) -> SourceConfig {
        SourceConfig {
            api_url: api_url.to_string(),
            api_key: Some("key-123".to_string()),
            base_id: "appBase".to_string(),
            table_id: "tblCars".to_string(),
            view_id: "viwAll".to_string(),
            page_size: 100,
            status_filter: "Comprado".to_string(),
        }
    }

    fn record(id: &str, ordencompra: &str, status: &str) -> Value {
        json!({ "id": id, "fields": { "OrdenCompra": ordencompra, "OrdenStatus": status } })
    }

    #[test]
    fn missing_api_key_is_not_configured() {
        let mut config = source_config("http://localhost");
        config.api_key = None;
        let result = AirtableSource::from_config(&config, Duration::from_secs(5));
        assert!(matches!(result, Err(SyncError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn follows_offset_cursor() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/v0/appBase/tblCars")
            .match_header("authorization", "Bearer key-123")
            .match_query(Matcher::Exact("view=viwAll&pageSize=100".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "records": [record("rec1", "PO-1", "Comprado"), record("rec2", "PO-2", "Pendiente")],
                    "offset": "itr1"
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v0/appBase/tblCars")
            .match_query(Matcher::Exact(
                "view=viwAll&pageSize=100&offset=itr1".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "records": [record("rec3", "PO-3", "Comprado")] }).to_string())
            .create_async()
            .await;

        let source =
            AirtableSource::from_config(&source_config(&server.url()), Duration::from_secs(5))
                .unwrap();
        let items: Vec<SourceItem> =
            enumerate_records(Arc::new(source), "Comprado", RetryPolicy::none())
                .try_collect()
                .await
                .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], SourceItem::Candidate(r) if r.business_key.as_deref() == Some("PO-1")));
        assert_eq!(
            items[1],
            SourceItem::Filtered {
                record_id: "rec2".to_string()
            }
        );
        assert!(matches!(&items[2], SourceItem::Candidate(r) if r.id == "rec3"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v0/appBase/tblCars")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .expect(2)
            .create_async()
            .await;

        let source =
            AirtableSource::from_config(&source_config(&server.url()), Duration::from_secs(5))
                .unwrap();
        let retry = RetryPolicy::new(1, Duration::from_millis(1));
        let items: Vec<_> = enumerate_records(Arc::new(source), "Comprado", retry)
            .collect()
            .await;

        mock.assert_async().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0],
            Err(SourceError::Status { status: 503, body }) if body == "unavailable"
        ));
    }

    #[tokio::test]
    async fn undecodable_page_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v0/appBase/tblCars")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let source =
            AirtableSource::from_config(&source_config(&server.url()), Duration::from_secs(5))
                .unwrap();
        let result: Result<Vec<_>, _> =
            enumerate_records(Arc::new(source), "Comprado", RetryPolicy::none())
                .try_collect()
                .await;
        assert!(matches!(result, Err(SourceError::Decode(_))));
    }

    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RecordSource for FlakySource {
        async fn fetch_page(&self, _offset: Option<&str>) -> Result<SourcePage, SourceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(SourceError::Decode("truncated".to_string()));
            }
            let fields = json!({ "ordencompra": "PO-9", "OrdenStatus": "Comprado" });
            Ok(SourcePage {
                records: vec![SourceRecord::from_fields(
                    "rec9",
                    fields.as_object().unwrap(),
                )],
                offset: None,
            })
        }
    }

    #[tokio::test]
    async fn page_fetch_is_retried() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        });
        let retry = RetryPolicy::new(2, Duration::from_millis(1));
        let items: Vec<SourceItem> = enumerate_records(source.clone(), "Comprado", retry)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(items.len(), 1);
    }
}
