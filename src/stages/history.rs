use crate::error::Result;
use crate::stages::StageOutcome;
use crate::tools::ToolRunner;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Table file names present in a directory at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingSnapshot {
    names: BTreeSet<String>,
}

impl ListingSnapshot {
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Decides which files in an output directory a tool invocation produced
pub trait OutputDiscovery: Send + Sync {
    /// Record the directory state before the tool runs
    fn snapshot(&self, dir: &Path) -> Result<ListingSnapshot>;

    /// Files attributed to the invocation, keyed by file name
    fn produced(&self, dir: &Path, before: &ListingSnapshot) -> Result<BTreeMap<String, PathBuf>>;
}

/// Attributes files by name: whatever is listed afterwards but not before.
/// A file rewritten in place under an existing name is not counted.
#[derive(Debug, Clone)]
pub struct ListingDiff {
    extension: String,
}

impl ListingDiff {
    pub fn new<S: Into<String>>(extension: S) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_lowercase(),
        }
    }

    fn list(&self, dir: &Path) -> Result<ListingSnapshot> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ListingSnapshot::default()),
            Err(e) => return Err(e.into()),
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));

            if matches {
                names.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }

        Ok(ListingSnapshot { names })
    }
}

impl Default for ListingDiff {
    fn default() -> Self {
        Self::new("csv")
    }
}

impl OutputDiscovery for ListingDiff {
    fn snapshot(&self, dir: &Path) -> Result<ListingSnapshot> {
        self.list(dir)
    }

    fn produced(&self, dir: &Path, before: &ListingSnapshot) -> Result<BTreeMap<String, PathBuf>> {
        let after = self.list(dir)?;

        Ok(after
            .names
            .difference(&before.names)
            .map(|name| (name.clone(), dir.join(name)))
            .collect())
    }
}

/// Runs the registry parser against the host's execution-history hive
pub struct HistoryExtractor<'a> {
    runner: &'a ToolRunner,
    hive_path: PathBuf,
    discovery: Box<dyn OutputDiscovery + 'a>,
}

impl<'a> HistoryExtractor<'a> {
    pub fn new<P: Into<PathBuf>>(runner: &'a ToolRunner, hive_path: P) -> Self {
        Self {
            runner,
            hive_path: hive_path.into(),
            discovery: Box::new(ListingDiff::default()),
        }
    }

    pub fn with_discovery<D: OutputDiscovery + 'a>(mut self, discovery: D) -> Self {
        self.discovery = Box::new(discovery);
        self
    }

    pub async fn extract_history(
        &self,
        tool_path: Option<&Path>,
        output_dir: &Path,
    ) -> StageOutcome<BTreeMap<String, PathBuf>> {
        let tool = match tool_path {
            Some(tool) => tool,
            None => {
                return StageOutcome::skipped(
                    "History parser not found, skipping execution history extraction",
                )
            }
        };

        // Expected on non-Windows or unprivileged hosts
        if !self.hive_path.is_file() {
            return StageOutcome::failed(
                format!("Execution history hive not found at {}", self.hive_path.display()),
                None,
            );
        }

        let before = match self.discovery.snapshot(output_dir) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return StageOutcome::failed(
                    format!("Cannot list {}: {}", output_dir.display(), e),
                    None,
                )
            }
        };
        debug!(
            existing = before.len(),
            dir = %output_dir.display(),
            "history output snapshot taken"
        );

        let args: Vec<OsString> = vec![
            "-f".into(),
            self.hive_path.clone().into_os_string(),
            "--csv".into(),
            output_dir.as_os_str().to_os_string(),
        ];

        let output = match self.runner.run(tool, &args).await {
            Ok(output) => output,
            Err(e) => return StageOutcome::failed(format!("History parser failed: {}", e), None),
        };

        if !output.success() {
            return StageOutcome::failed(
                format!("History parser failed with {}", output.describe_exit()),
                Some(output.stderr),
            );
        }

        let produced = match self.discovery.produced(output_dir, &before) {
            Ok(produced) => produced,
            Err(e) => {
                return StageOutcome::failed(
                    format!("Cannot list {}: {}", output_dir.display(), e),
                    None,
                )
            }
        };

        if produced.is_empty() {
            return StageOutcome::no_data("History parser produced no new tables");
        }

        let message = format!(
            "{} table(s) generated in {}",
            produced.len(),
            output_dir.display()
        );
        StageOutcome::completed(produced, message)
    }
}
