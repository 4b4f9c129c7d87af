pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod session;
pub mod stages;
pub mod tools;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config};
pub use error::{Result, SweepError, UserFriendlyError};

// Core functionality re-exports
pub use report::{ArtifactConsolidator, ConsolidatedReport, PipelineReport, StageReport};
pub use session::{SessionId, SessionWorkspace};
pub use stages::{
    HistoryExtractor, ListingDiff, MetadataExtractor, MetadataRecord, RecoveryInvoker, Stage,
    StageOutcome, StageStatus,
};
pub use tools::{DirectoryToolResolver, StaticToolResolver, ToolKind, ToolResolver, ToolRunner};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const CANCELLED_MESSAGE: &str = "cancelled";

/// Runs recovery, metadata extraction, execution-history extraction and
/// consolidation for one session, in that order.
pub struct ForensicSweep {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
    resolver: Box<dyn ToolResolver>,
}

impl ForensicSweep {
    /// Create an instance that installs the process Ctrl+C handler
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let shutdown = GracefulShutdown::new()?;
        Ok(Self::with_shutdown(config, output_mode, verbose, quiet, shutdown))
    }

    /// Create an instance without a signal handler, for embedding and tests
    pub fn detached(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self::with_shutdown(config, output_mode, verbose, quiet, GracefulShutdown::detached())
    }

    fn with_shutdown(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        // Spinners would interleave with JSON on stdout
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);
        let resolver = Box::new(DirectoryToolResolver::from_config(&config.tools));

        Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
            resolver,
        }
    }

    /// Create an instance from CLI arguments
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Self::new(config, output_mode, cli_args.verbose, cli_args.quiet)
    }

    /// Replace the directory-based tool lookup
    pub fn with_resolver<R: ToolResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Execute every stage for one session and write `pipeline_report.json`.
    ///
    /// Stage problems are reported through [`StageStatus`] and never returned as
    /// `Err`. Errors are limited to the session directories being uncreatable and
    /// to cancellation before anything was created.
    ///
    /// Without `session_id` a timestamped id is allocated that does not collide
    /// with existing session directories. An explicit id reuses its directories.
    pub async fn run_pipeline(&self, session_id: Option<SessionId>) -> Result<PipelineReport> {
        self.shutdown.check_shutdown()?;

        let base = &self.config.output.base_directory;
        let recovery_root = &self.config.output.recovery_root;
        let workspace = match session_id {
            Some(id) => SessionWorkspace::new(base, recovery_root, id),
            None => SessionWorkspace::allocate(base, recovery_root, SessionId::now())?,
        };
        workspace.initialize()?;

        info!(session = %workspace.id(), "session initialized");
        self.output_formatter
            .start_operation(&format!("Starting forensic sweep (session {})", workspace.id()));
        self.output_formatter.debug(&workspace.display_summary());

        let runner = ToolRunner::new().with_timeout(self.config.process_timeout());
        let mut report = PipelineReport::new(&workspace);

        self.run_stages(&runner, &workspace, &mut report).await;

        report.finish();
        if let Err(e) = report.save_json(&workspace.pipeline_report_file()) {
            warn!(error = %e, "could not save pipeline report");
            self.output_formatter
                .warning(&format!("Could not save pipeline report: {}", e.user_message()));
        }

        Ok(report)
    }

    async fn run_stages(
        &self,
        runner: &ToolRunner,
        workspace: &SessionWorkspace,
        report: &mut PipelineReport,
    ) {
        if self.stop_if_cancelled(report) {
            return;
        }

        let started = Instant::now();
        let spinner = self.progress_manager.stage_spinner(Stage::Recovery, 1);
        let outcome = RecoveryInvoker::new(
            runner,
            self.resolver.resolve(ToolKind::Carver),
            workspace.recovery_dir(),
        )
        .recover(&self.config.recovery.disk_target, &self.config.recovery.file_types)
        .await;
        spinner.finish_and_clear();
        self.finish_stage(report, Stage::Recovery, &outcome, outcome.value, started.elapsed());

        if self.stop_if_cancelled(report) {
            return;
        }

        let started = Instant::now();
        let spinner = self.progress_manager.stage_spinner(Stage::Metadata, 2);
        let search_root = if self.config.metadata.scan_all_recoveries {
            workspace.recovery_root()
        } else {
            workspace.recovery_dir()
        };
        let metadata_tool = self.resolver.resolve(ToolKind::Metadata);
        let outcome = MetadataExtractor::new(runner, workspace.metadata_file())
            .extract_metadata(
                metadata_tool.as_deref(),
                search_root,
                &self.config.metadata.extensions,
            )
            .await;
        spinner.finish_and_clear();
        let items = outcome.value.len();
        self.finish_stage(report, Stage::Metadata, &outcome, items, started.elapsed());
        let records = outcome.value;

        if self.stop_if_cancelled(report) {
            return;
        }

        let started = Instant::now();
        let spinner = self.progress_manager.stage_spinner(Stage::History, 3);
        let history_tool = self.resolver.resolve(ToolKind::History);
        let outcome = HistoryExtractor::new(runner, &self.config.history.hive_path)
            .with_discovery(ListingDiff::new(&self.config.history.table_extension))
            .extract_history(history_tool.as_deref(), &workspace.history_dir())
            .await;
        spinner.finish_and_clear();
        let items = outcome.value.len();
        self.finish_stage(report, Stage::History, &outcome, items, started.elapsed());

        if self.stop_if_cancelled(report) {
            return;
        }

        let started = Instant::now();
        let consolidator = ArtifactConsolidator::new(&self.config.output.placeholder)
            .with_table_extension(&self.config.history.table_extension);
        let outcome = match consolidator.consolidate(&records, workspace) {
            Ok(Some(summary)) => {
                let message = format!(
                    "Wrote {} row(s) x {} column(s) ({} metadata, {} execution history) to {}",
                    summary.rows,
                    summary.columns,
                    summary.metadata_rows,
                    summary.history_rows,
                    summary.path.display()
                );
                report.consolidated_report = Some(summary.path.clone());
                StageOutcome::completed(summary.rows, message)
            }
            Ok(None) => StageOutcome::no_data("No artifacts to consolidate, no report written"),
            Err(e) => StageOutcome::failed(format!("Consolidation failed: {}", e), None),
        };
        self.finish_stage(report, Stage::Consolidation, &outcome, outcome.value, started.elapsed());
    }

    fn finish_stage<T>(
        &self,
        report: &mut PipelineReport,
        stage: Stage,
        outcome: &StageOutcome<T>,
        items: usize,
        elapsed: Duration,
    ) {
        info!(stage = ?stage, status = ?outcome.status, items, "stage finished");
        self.progress_manager.suspend(|| {
            self.output_formatter.stage_result(
                stage,
                outcome.status,
                &outcome.message,
                outcome.stderr.as_deref(),
            )
        });
        report.record(stage, outcome, items, elapsed);
    }

    fn stop_if_cancelled(&self, report: &mut PipelineReport) -> bool {
        if self.shutdown.is_running() {
            return false;
        }

        warn!("cancellation requested, skipping remaining stages");
        report.cancelled = true;
        report.skip_remaining(CANCELLED_MESSAGE);
        true
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    /// Where each tool kind resolves to, if anywhere
    pub fn resolve_tool(&self, kind: ToolKind) -> Option<std::path::PathBuf> {
        self.resolver.resolve(kind)
    }

    /// Handle that can request cancellation from another task
    pub fn shutdown_handle(&self) -> GracefulShutdown {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &SweepError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// Get version information
pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Get build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "forensic-sweep {} ({}) built on {} for {}",
            self.version, self.git_hash, self.build_date, self.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.output.base_directory = temp_dir.path().to_path_buf();
        config.output.recovery_root = temp_dir.path().join("RecoveredFiles");
        config.history.hive_path = temp_dir.path().join("Amcache.hve");
        config
    }

    #[tokio::test]
    async fn test_run_without_tools_skips_and_reports() {
        let temp_dir = TempDir::new().unwrap();
        let sweep = ForensicSweep::detached(config_in(&temp_dir), OutputMode::Plain, 0, true)
            .with_resolver(StaticToolResolver::new());

        let report = sweep
            .run_pipeline(Some(SessionId::new("empty").unwrap()))
            .await
            .unwrap();

        assert_eq!(report.stages.len(), 4);
        assert_eq!(report.stage(Stage::Recovery).unwrap().status, StageStatus::Skipped);
        assert_eq!(report.stage(Stage::Metadata).unwrap().status, StageStatus::Skipped);
        assert_eq!(report.stage(Stage::History).unwrap().status, StageStatus::Skipped);
        assert_eq!(report.stage(Stage::Consolidation).unwrap().status, StageStatus::NoData);
        assert!(!report.has_failures());
        assert!(report.consolidated_report.is_none());

        let session_dir = temp_dir.path().join("ForensicSession_empty");
        assert!(session_dir.join("AmcacheAnalysis").is_dir());
        assert!(session_dir.join("pipeline_report.json").is_file());
        assert!(!session_dir.join("consolidated_artifacts.csv").exists());
        assert!(temp_dir.path().join("RecoveredFiles/Recovery_empty").is_dir());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let temp_dir = TempDir::new().unwrap();
        let sweep = ForensicSweep::detached(config_in(&temp_dir), OutputMode::Plain, 0, true)
            .with_resolver(StaticToolResolver::new());
        sweep.request_shutdown();

        let result = sweep.run_pipeline(None).await;

        assert!(matches!(result, Err(SweepError::Cancelled)));
        assert!(!temp_dir.path().join("RecoveredFiles").exists());
    }

    #[tokio::test]
    async fn test_leftover_tables_are_consolidated() {
        let temp_dir = TempDir::new().unwrap();
        let session = SessionWorkspace::new(
            temp_dir.path(),
            temp_dir.path().join("RecoveredFiles"),
            SessionId::new("rerun").unwrap(),
        );
        session.initialize().unwrap();
        std::fs::write(session.history_dir().join("Manual.csv"), "Key\nvalue\n").unwrap();

        let sweep = ForensicSweep::detached(config_in(&temp_dir), OutputMode::Plain, 0, true)
            .with_resolver(StaticToolResolver::new());
        let report = sweep
            .run_pipeline(Some(SessionId::new("rerun").unwrap()))
            .await
            .unwrap();

        let consolidation = report.stage(Stage::Consolidation).unwrap();
        assert_eq!(consolidation.status, StageStatus::Completed);
        assert_eq!(consolidation.items, 1);
        assert_eq!(report.consolidated_report.as_deref(), Some(session.report_file().as_path()));
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        ForensicSweep::generate_sample_config(&config_path).unwrap();

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[recovery]"));
        assert!(content.contains("[tools]"));
        assert!(content.contains("[output]"));
    }

    #[test]
    fn test_version_info() {
        assert!(!version_info().is_empty());
        assert!(build_info().to_string().starts_with("forensic-sweep"));
    }
}
