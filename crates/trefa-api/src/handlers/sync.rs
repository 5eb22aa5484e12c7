//! Image sync trigger.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use trefa_core::models::RunReport;

use crate::state::SyncHandle;

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub report: RunReport,
}

impl SyncResponse {
    fn ok(report: RunReport) -> Self {
        Self {
            status: "ok",
            message: None,
            report,
        }
    }

    fn error(message: String, report: RunReport) -> Self {
        Self {
            status: "error",
            message: Some(message),
            report,
        }
    }
}

/// Run one full image sync and report its outcome.
///
/// Per-attachment failures are part of a successful report; only run-fatal errors
/// (unreachable source, missing configuration, deadline) produce a 500.
pub async fn run_image_sync(State(sync): State<SyncHandle>) -> impl IntoResponse {
    let runner = match sync {
        SyncHandle::Ready(runner) => runner,
        SyncHandle::Unavailable(reason) => {
            tracing::warn!(reason = %reason, "Image sync requested but not configured");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SyncResponse::error(reason, RunReport::new())),
            );
        }
    };

    match runner.run().await {
        Ok(report) => (StatusCode::OK, Json(SyncResponse::ok(report))),
        Err(failure) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SyncResponse::error(failure.error.to_string(), failure.report)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trefa_core::models::{ErrorEntry, Stage};

    #[test]
    fn ok_response_flattens_report() {
        let report = RunReport {
            processed: 1,
            skipped: 2,
            no_contribution: 0,
            errors: vec![ErrorEntry::new("PO-1", "a.jpg", "HTTP 404", Stage::Fetch)],
            total_records: 3,
        };
        let body = serde_json::to_value(SyncResponse::ok(report)).unwrap();

        assert_eq!(body["status"], "ok");
        assert!(body.get("message").is_none());
        assert_eq!(body["processed"], 1);
        assert_eq!(body["skipped"], 2);
        assert_eq!(body["total_records"], 3);
        assert_eq!(body["errors"][0]["stage"], "fetch");
        assert_eq!(body["errors"][0]["ordencompra"], "PO-1");
    }

    #[test]
    fn error_response_carries_message_and_partial_counts() {
        let body = serde_json::to_value(SyncResponse::error(
            "Airtable unreachable".to_string(),
            RunReport {
                skipped: 4,
                ..RunReport::default()
            },
        ))
        .unwrap();

        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Airtable unreachable");
        assert_eq!(body["skipped"], 4);
        assert_eq!(body["errors"], serde_json::json!([]));
    }
}
