use crate::stages::StageOutcome;
use crate::tools::ToolRunner;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Drives the carving tool: restricts it to the requested file-type signatures,
/// then runs a single search into the session's recovery directory.
pub struct RecoveryInvoker<'a> {
    runner: &'a ToolRunner,
    tool: Option<PathBuf>,
    output_dir: PathBuf,
}

impl<'a> RecoveryInvoker<'a> {
    pub fn new<P: Into<PathBuf>>(
        runner: &'a ToolRunner,
        tool: Option<PathBuf>,
        output_dir: P,
    ) -> Self {
        Self {
            runner,
            tool,
            output_dir: output_dir.into(),
        }
    }

    /// The disk target is passed through untouched; an invalid device is for the
    /// tool to reject. The value is the number of files found under the
    /// recovery directory afterwards.
    pub async fn recover(&self, disk_target: &str, file_types: &[String]) -> StageOutcome<usize> {
        let tool = match self.tool {
            Some(ref tool) => tool,
            None => return StageOutcome::skipped("Carving tool not found, skipping recovery"),
        };

        let warnings = self.configure_filters(tool, disk_target, file_types).await;

        let args: Vec<OsString> = vec![
            "/d".into(),
            self.output_dir.clone().into_os_string(),
            "/cmd".into(),
            disk_target.into(),
            "search".into(),
        ];

        let output = match self.runner.run(tool, &args).await {
            Ok(output) => output,
            Err(e) => return StageOutcome::failed(format!("Recovery scan failed: {}", e), None),
        };

        if !output.success() {
            return StageOutcome::failed(
                format!("Recovery scan failed with {}", output.describe_exit()),
                Some(output.stderr),
            );
        }

        let recovered = count_files(&self.output_dir);
        let mut message = format!(
            "Recovered {} file(s) into {}",
            recovered,
            self.output_dir.display()
        );
        if warnings > 0 {
            message.push_str(&format!(" ({} filter command(s) reported errors)", warnings));
        }

        StageOutcome::completed(recovered, message)
    }

    /// Each command is its own blocking invocation; the tool has no atomic
    /// "set filter list". Returns how many commands did not succeed.
    async fn configure_filters(
        &self,
        tool: &Path,
        disk_target: &str,
        file_types: &[String],
    ) -> usize {
        let mut commands: Vec<Vec<&str>> = vec![vec!["/cmd", disk_target, "fileopt", "disable"]];
        for file_type in file_types {
            commands.push(vec!["/cmd", disk_target, "fileopt", "enable", file_type.as_str()]);
        }

        let mut failures = 0;
        for args in &commands {
            match self.runner.run(tool, args).await {
                Ok(output) if output.success() => {}
                Ok(output) => {
                    failures += 1;
                    warn!(
                        ?args,
                        exit = ?output.exit_code,
                        stderr = %output.stderr.trim(),
                        "filter command rejected"
                    );
                }
                Err(e) => {
                    failures += 1;
                    warn!(?args, error = %e, "filter command failed");
                }
            }
        }

        debug!(file_types = ?file_types, failures, "file type filters applied");
        failures
    }
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}
