use std::time::Duration;
use thiserror::Error;
use trefa_core::RunReport;

/// Failure reading one page of the tabular source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Source returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Source page could not be decoded: {0}")]
    Decode(String),
}

/// Failure downloading one attachment.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Fetch returned HTTP {0}")]
    Status(u16),
}

/// Run-level failures. Everything else is recorded in the report and the run continues.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Source unreachable: {0}")]
    SourceUnreachable(#[source] SourceError),

    #[error("Sync not configured: {0}")]
    NotConfigured(String),

    #[error("Sync run exceeded its deadline of {}s", .0.as_secs())]
    DeadlineExceeded(Duration),
}

/// A fatal run error together with whatever the run had accumulated before it stopped.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SyncFailure {
    #[source]
    pub error: SyncError,
    pub report: RunReport,
}

impl SyncFailure {
    pub fn new(error: SyncError, report: RunReport) -> Self {
        Self { error, report }
    }
}
