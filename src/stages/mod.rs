pub mod history;
pub mod metadata;
pub mod recovery;

pub use history::{HistoryExtractor, ListingDiff, ListingSnapshot, OutputDiscovery};
pub use metadata::{find_scan_directories, MetadataExtractor, MetadataRecord};
pub use recovery::RecoveryInvoker;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Recovery,
    Metadata,
    History,
    Consolidation,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Recovery,
        Stage::Metadata,
        Stage::History,
        Stage::Consolidation,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Stage::Recovery => "File recovery",
            Stage::Metadata => "Metadata extraction",
            Stage::History => "Execution history extraction",
            Stage::Consolidation => "Artifact consolidation",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// How a stage ended. Only `Failed` counts against the run; the pipeline carries on
/// after every status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    /// Tool unavailable or run cancelled
    Skipped,
    /// Input missing, process failure, or unusable output
    Failed,
    /// Ran, but produced nothing new
    NoData,
}

#[derive(Debug, Clone)]
pub struct StageOutcome<T> {
    pub status: StageStatus,
    pub message: String,
    pub stderr: Option<String>,
    pub value: T,
}

impl<T> StageOutcome<T> {
    pub fn completed<S: Into<String>>(value: T, message: S) -> Self {
        Self {
            status: StageStatus::Completed,
            message: message.into(),
            stderr: None,
            value,
        }
    }
}

impl<T: Default> StageOutcome<T> {
    pub fn skipped<S: Into<String>>(message: S) -> Self {
        Self::empty(StageStatus::Skipped, message, None)
    }

    pub fn failed<S: Into<String>>(message: S, stderr: Option<String>) -> Self {
        let stderr = stderr
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self::empty(StageStatus::Failed, message, stderr)
    }

    pub fn no_data<S: Into<String>>(message: S) -> Self {
        Self::empty(StageStatus::NoData, message, None)
    }

    fn empty<S: Into<String>>(status: StageStatus, message: S, stderr: Option<String>) -> Self {
        Self {
            status,
            message: message.into(),
            stderr,
            value: T::default(),
        }
    }
}
