use crate::error::Result;
use crate::session::SessionWorkspace;
use crate::stages::{Stage, StageOutcome, StageStatus};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Files recovered, records extracted, tables produced or rows written
    pub items: usize,
    pub duration: Duration,
}

/// Summary of one pipeline run, persisted next to the session's artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub session_id: String,
    pub session_dir: PathBuf,
    pub recovery_dir: PathBuf,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub stages: Vec<StageReport>,
    pub consolidated_report: Option<PathBuf>,
    pub cancelled: bool,
}

impl PipelineReport {
    pub fn new(session: &SessionWorkspace) -> Self {
        Self {
            session_id: session.id().to_string(),
            session_dir: session.session_dir().to_path_buf(),
            recovery_dir: session.recovery_dir().to_path_buf(),
            started_at: Local::now(),
            finished_at: None,
            stages: Vec::new(),
            consolidated_report: None,
            cancelled: false,
        }
    }

    pub fn record<T>(
        &mut self,
        stage: Stage,
        outcome: &StageOutcome<T>,
        items: usize,
        duration: Duration,
    ) {
        self.stages.push(StageReport {
            stage,
            status: outcome.status,
            message: outcome.message.clone(),
            stderr: outcome.stderr.clone(),
            items,
            duration,
        });
    }

    /// Mark every stage not yet recorded as skipped
    pub fn skip_remaining(&mut self, reason: &str) {
        for stage in Stage::ALL {
            if self.stage(stage).is_none() {
                self.stages.push(StageReport {
                    stage,
                    status: StageStatus::Skipped,
                    message: reason.to_string(),
                    stderr: None,
                    items: 0,
                    duration: Duration::ZERO,
                });
            }
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn has_failures(&self) -> bool {
        self.stages.iter().any(|s| s.status == StageStatus::Failed)
    }

    pub fn failed_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Failed)
            .map(|s| s.stage)
            .collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;

        serde_json::to_writer_pretty(&mut staged, self)?;
        staged.write_all(b"\n")?;
        staged.flush()?;

        staged.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use tempfile::TempDir;

    fn workspace(temp_dir: &TempDir) -> SessionWorkspace {
        let workspace = SessionWorkspace::new(
            temp_dir.path(),
            temp_dir.path().join("RecoveredFiles"),
            SessionId::new("report").unwrap(),
        );
        workspace.initialize().unwrap();
        workspace
    }

    #[test]
    fn test_failures_are_tracked() {
        let temp_dir = TempDir::new().unwrap();
        let mut report = PipelineReport::new(&workspace(&temp_dir));

        report.record(
            Stage::Recovery,
            &StageOutcome::<usize>::skipped("no carver"),
            0,
            Duration::ZERO,
        );
        assert!(!report.has_failures());

        report.record(
            Stage::History,
            &StageOutcome::<usize>::failed("hive missing", Some("denied".to_string())),
            0,
            Duration::from_millis(5),
        );
        assert!(report.has_failures());
        assert_eq!(report.failed_stages(), vec![Stage::History]);
        assert_eq!(report.stage(Stage::History).unwrap().stderr.as_deref(), Some("denied"));
    }

    #[test]
    fn test_skip_remaining_fills_missing_stages() {
        let temp_dir = TempDir::new().unwrap();
        let mut report = PipelineReport::new(&workspace(&temp_dir));
        report.record(
            Stage::Recovery,
            &StageOutcome::completed(3usize, "done"),
            3,
            Duration::from_secs(1),
        );

        report.skip_remaining("cancelled");

        assert_eq!(report.stages.len(), 4);
        assert_eq!(report.stage(Stage::Recovery).unwrap().status, StageStatus::Completed);
        for stage in [Stage::Metadata, Stage::History, Stage::Consolidation] {
            let entry = report.stage(stage).unwrap();
            assert_eq!(entry.status, StageStatus::Skipped);
            assert_eq!(entry.message, "cancelled");
        }
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let session = workspace(&temp_dir);
        let mut report = PipelineReport::new(&session);
        report.record(
            Stage::Metadata,
            &StageOutcome::<usize>::no_data("nothing"),
            0,
            Duration::ZERO,
        );
        report.finish();

        let path = session.pipeline_report_file();
        report.save_json(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"no_data\""));
        assert!(content.contains("\"session_id\": \"report\""));

        let loaded = PipelineReport::load_json(&path).unwrap();
        assert_eq!(loaded.stages.len(), 1);
        assert!(loaded.finished_at.is_some());
    }
}
