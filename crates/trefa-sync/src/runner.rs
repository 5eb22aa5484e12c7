//! Run orchestrator: enumerate, fan out, drain per record, commit, and fold the report.
//!
//! Records run concurrently up to `record_concurrency`; their attachment tasks share a
//! single run-wide [`ConcurrencyPool`]. Only the loop in [`SyncRunner::drive`] touches
//! the [`RunReport`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use trefa_core::models::{ErrorEntry, SourceRecord, Stage};
use trefa_core::{Config, RetryPolicy, RunReport};
use trefa_db::ImageCacheRepository;
use trefa_processing::WebpTranscoder;
use trefa_storage::Storage;

use crate::committer::{build_update, ResultCommitter};
use crate::error::{SyncError, SyncFailure};
use crate::fetch::HttpFetcher;
use crate::pool::ConcurrencyPool;
use crate::processor::{AttachmentProcessor, UploadedImage};
use crate::source::{enumerate_records, AirtableSource, RecordSource, SourceItem};

/// Run-level tuning.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub status_filter: String,
    pub source_retry: RetryPolicy,
    pub max_concurrent_uploads: usize,
    pub record_concurrency: usize,
    pub run_timeout: Option<Duration>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            status_filter: "Comprado".to_string(),
            source_retry: RetryPolicy::new(3, Duration::from_secs(1)),
            max_concurrent_uploads: 4,
            record_concurrency: 4,
            run_timeout: None,
        }
    }
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        let pipeline = config.pipeline();
        Self {
            status_filter: config.source().status_filter.clone(),
            source_retry: pipeline.network_retry(),
            max_concurrent_uploads: pipeline.max_concurrent_uploads,
            record_concurrency: pipeline.record_concurrency,
            run_timeout: pipeline.run_timeout(),
        }
    }
}

/// What happened to one enumerated record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Status mismatch or missing business key.
    Skipped,
    /// Committed; `errors` holds the attachments that did not make it.
    Processed { errors: Vec<ErrorEntry> },
    /// Every attachment failed (or there were none), so nothing was committed.
    NoContribution { errors: Vec<ErrorEntry> },
    /// Uploads succeeded but the cache upsert did not; `errors` ends with the commit error.
    CommitFailed { errors: Vec<ErrorEntry> },
}

impl RecordOutcome {
    fn fold_into(self, report: &mut RunReport) {
        match self {
            RecordOutcome::Skipped => report.skipped += 1,
            RecordOutcome::Processed { errors } => {
                report.processed += 1;
                report.errors.extend(errors);
            }
            RecordOutcome::NoContribution { errors } => {
                report.no_contribution += 1;
                report.errors.extend(errors);
            }
            RecordOutcome::CommitFailed { errors } => report.errors.extend(errors),
        }
    }
}

pub struct SyncRunner {
    source: Arc<dyn RecordSource>,
    processor: AttachmentProcessor,
    committer: ResultCommitter,
    settings: SyncSettings,
}

impl SyncRunner {
    pub fn new(
        source: Arc<dyn RecordSource>,
        processor: AttachmentProcessor,
        committer: ResultCommitter,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            processor,
            committer,
            settings,
        }
    }

    /// Wire the production pipeline: Airtable source, HTTP fetcher, WebP transcoder.
    ///
    /// Fails with [`SyncError::NotConfigured`] when the source API key is missing.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn Storage>,
        repository: Arc<dyn ImageCacheRepository>,
    ) -> Result<Self, SyncError> {
        let pipeline = config.pipeline();
        let timeout = Duration::from_secs(pipeline.fetch_timeout_secs);

        let source = AirtableSource::from_config(config.source(), timeout)?;
        let fetcher = HttpFetcher::new(timeout)
            .map_err(|e| SyncError::NotConfigured(format!("Failed to create HTTP client: {}", e)))?;
        let processor = AttachmentProcessor::new(
            Arc::new(fetcher),
            storage,
            WebpTranscoder::new(pipeline.max_image_width, pipeline.webp_quality),
            pipeline.network_retry(),
        );
        let committer = ResultCommitter::new(repository, pipeline.commit_retry());

        Ok(Self::new(
            Arc::new(source),
            processor,
            committer,
            SyncSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Execute one full run with a fresh pool.
    pub async fn run(&self) -> Result<RunReport, SyncFailure> {
        let pool = ConcurrencyPool::new(self.settings.max_concurrent_uploads);
        self.run_with_pool(&pool).await
    }

    /// Execute one full run scheduling attachment work on `pool`.
    ///
    /// On a fatal error the partial report is returned inside [`SyncFailure`]. When the
    /// run deadline passes, in-flight records are dropped, which aborts their tasks.
    #[tracing::instrument(skip(self, pool), fields(
        status_filter = %self.settings.status_filter,
        max_concurrent_uploads = pool.limit(),
        record_concurrency = self.settings.record_concurrency
    ))]
    pub async fn run_with_pool(&self, pool: &ConcurrencyPool) -> Result<RunReport, SyncFailure> {
        let started = Instant::now();
        let seen = AtomicU64::new(0);
        let mut report = RunReport::new();

        tracing::info!("Image sync started");

        let result = match self.settings.run_timeout {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.drive(pool, &seen, &mut report)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::DeadlineExceeded(deadline)),
                }
            }
            None => self.drive(pool, &seen, &mut report).await,
        };
        report.total_records = seen.load(Ordering::SeqCst);

        match result {
            Ok(()) => {
                tracing::info!(
                    processed = report.processed,
                    skipped = report.skipped,
                    no_contribution = report.no_contribution,
                    errors = report.errors.len(),
                    total_records = report.total_records,
                    peak_in_flight = pool.peak_in_flight(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Image sync finished"
                );
                Ok(report)
            }
            Err(error) => {
                tracing::error!(
                    error = %error,
                    processed = report.processed,
                    total_records = report.total_records,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Image sync aborted"
                );
                Err(SyncFailure::new(error, report))
            }
        }
    }

    async fn drive(
        &self,
        pool: &ConcurrencyPool,
        seen: &AtomicU64,
        report: &mut RunReport,
    ) -> Result<(), SyncError> {
        let items = enumerate_records(
            self.source.clone(),
            self.settings.status_filter.clone(),
            self.settings.source_retry,
        );

        let mut outcomes = items
            .map(|item| async move {
                match item {
                    Ok(SourceItem::Filtered { record_id }) => {
                        seen.fetch_add(1, Ordering::SeqCst);
                        tracing::debug!(record_id = %record_id, "Skipping record: status mismatch");
                        Ok(RecordOutcome::Skipped)
                    }
                    Ok(SourceItem::Candidate(record)) => {
                        seen.fetch_add(1, Ordering::SeqCst);
                        Ok(self.process_record(pool, record).await)
                    }
                    Err(e) => Err(SyncError::SourceUnreachable(e)),
                }
            })
            .buffer_unordered(self.settings.record_concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            outcome?.fold_into(report);
        }
        Ok(())
    }

    async fn process_record(&self, pool: &ConcurrencyPool, record: SourceRecord) -> RecordOutcome {
        let Some(business_key) = record.business_key.clone() else {
            tracing::warn!(record_id = %record.id, "Skipping record: missing ordencompra");
            return RecordOutcome::Skipped;
        };

        let tasks = record.tasks();
        let filenames: Vec<String> = tasks.iter().map(|t| t.filename.clone()).collect();

        let mut group = pool.group();
        for task in tasks {
            let processor = self.processor.clone();
            group.schedule(async move { processor.process(task).await }).await;
        }

        let mut uploads: Vec<UploadedImage> = Vec::new();
        let mut errors = Vec::new();
        for (index, outcome) in group.drain().await.into_iter().enumerate() {
            match outcome {
                Ok(Ok(upload)) => uploads.push(upload),
                Ok(Err(entry)) => errors.push(entry),
                Err(panic) => {
                    tracing::error!(
                        ordencompra = %business_key,
                        message = %panic.message,
                        "Attachment task panicked"
                    );
                    let filename = filenames.get(index).cloned().unwrap_or_default();
                    errors.push(ErrorEntry::new(
                        &business_key,
                        filename,
                        format!("Attachment task panicked: {}", panic.message),
                        Stage::Upload,
                    ));
                }
            }
        }

        let update = build_update(&business_key, &record.id, &uploads);
        if update.is_empty() {
            tracing::warn!(
                ordencompra = %business_key,
                attachments = filenames.len(),
                "No attachment succeeded, nothing to commit"
            );
            return RecordOutcome::NoContribution { errors };
        }

        match self.committer.commit(&update).await {
            Ok(()) => RecordOutcome::Processed { errors },
            Err(entry) => {
                errors.push(entry);
                RecordOutcome::CommitFailed { errors }
            }
        }
    }
}
