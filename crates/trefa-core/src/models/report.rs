use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Transcode,
    Upload,
    /// Relational cache upsert; reported as `"db"` to existing consumers.
    #[serde(rename = "db")]
    Commit,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Stage::Fetch => write!(f, "fetch"),
            Stage::Transcode => write!(f, "transcode"),
            Stage::Upload => write!(f, "upload"),
            Stage::Commit => write!(f, "db"),
        }
    }
}

/// Filename reported for commit-stage errors.
pub const COMMIT_ERROR_FILENAME: &str = "database";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEntry {
    pub ordencompra: String,
    pub filename: String,
    pub error: String,
    pub stage: Stage,
}

impl ErrorEntry {
    pub fn new(
        ordencompra: impl Into<String>,
        filename: impl Into<String>,
        error: impl Into<String>,
        stage: Stage,
    ) -> Self {
        Self {
            ordencompra: ordencompra.into(),
            filename: filename.into(),
            error: error.into(),
            stage,
        }
    }

    pub fn commit(ordencompra: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(ordencompra, COMMIT_ERROR_FILENAME, error, Stage::Commit)
    }
}

/// Aggregate outcome of one sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub processed: u64,
    pub skipped: u64,
    /// Eligible records for which every attachment failed, so nothing was committed.
    pub no_contribution: u64,
    pub errors: Vec<ErrorEntry>,
    pub total_records: u64,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors_for_stage(&self, stage: Stage) -> impl Iterator<Item = &ErrorEntry> {
        self.errors.iter().filter(move |e| e.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stage_wire_names() {
        assert_eq!(serde_json::to_value(Stage::Fetch).unwrap(), json!("fetch"));
        assert_eq!(
            serde_json::to_value(Stage::Transcode).unwrap(),
            json!("transcode")
        );
        assert_eq!(serde_json::to_value(Stage::Commit).unwrap(), json!("db"));
        assert_eq!(Stage::Commit.to_string(), "db");
    }

    #[test]
    fn report_serializes_flat() {
        let mut report = RunReport::new();
        report.processed = 1;
        report.skipped = 1;
        report.total_records = 2;
        report
            .errors
            .push(ErrorEntry::new("PO-1", "ext.jpg", "HTTP 404", Stage::Fetch));

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["processed"], 1);
        assert_eq!(value["no_contribution"], 0);
        assert_eq!(value["errors"][0]["ordencompra"], "PO-1");
        assert_eq!(value["errors"][0]["stage"], "fetch");
        assert_eq!(report.errors_for_stage(Stage::Fetch).count(), 1);
    }

    #[test]
    fn commit_error_uses_database_filename() {
        let entry = ErrorEntry::commit("PO-9", "connection reset");
        assert_eq!(entry.filename, "database");
        assert_eq!(entry.stage, Stage::Commit);
    }
}
