use crate::stages::StageOutcome;
use crate::tools::ToolRunner;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Field the metadata tool uses to name the file a record was read from
pub const SOURCE_FILE_FIELD: &str = "SourceFile";

/// One per-file object from the metadata tool's JSON array
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    fields: Map<String, Value>,
}

impl MetadataRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn source_file(&self) -> Option<&str> {
        self.fields.get(SOURCE_FILE_FIELD).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<Map<String, Value>> for MetadataRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Directories under `search_root` that directly hold at least one file ending in
/// one of `extensions`, in walk order. This only selects directories; the tool
/// applies its own extension filter inside each of them.
pub fn find_scan_directories(search_root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let suffixes: Vec<String> = extensions
        .iter()
        .map(|e| format!(".{}", e.trim_start_matches('.').to_lowercase()))
        .collect();

    let mut seen = HashSet::new();
    let mut directories = Vec::new();

    let walker = WalkDir::new(search_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                None
            }
        });

    for entry in walker {
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        if !suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            continue;
        }

        if let Some(parent) = entry.path().parent() {
            if seen.insert(parent.to_path_buf()) {
                directories.push(parent.to_path_buf());
            }
        }
    }

    directories
}

/// Runs the metadata tool once over every qualifying directory and parses its
/// aggregate JSON output.
pub struct MetadataExtractor<'a> {
    runner: &'a ToolRunner,
    output_file: PathBuf,
}

impl<'a> MetadataExtractor<'a> {
    /// `output_file` receives the tool's JSON exactly as printed
    pub fn new<P: Into<PathBuf>>(runner: &'a ToolRunner, output_file: P) -> Self {
        Self {
            runner,
            output_file: output_file.into(),
        }
    }

    pub async fn extract_metadata(
        &self,
        tool_path: Option<&Path>,
        search_root: &Path,
        extensions: &[String],
    ) -> StageOutcome<Vec<MetadataRecord>> {
        let tool = match tool_path {
            Some(tool) => tool,
            None => return StageOutcome::skipped("Metadata tool not found, skipping extraction"),
        };

        if !search_root.exists() {
            return StageOutcome::no_data(format!(
                "Recovery directory {} does not exist",
                search_root.display()
            ));
        }

        let directories = find_scan_directories(search_root, extensions);
        if directories.is_empty() {
            return StageOutcome::no_data(format!(
                "No {} files found under {}",
                extensions.join("/"),
                search_root.display()
            ));
        }

        debug!(directories = directories.len(), "metadata scan targets selected");

        let mut args: Vec<OsString> = vec!["-r".into(), "-json".into()];
        for ext in extensions {
            args.push("-ext".into());
            args.push(ext.into());
        }
        args.extend(directories.into_iter().map(PathBuf::into_os_string));

        let output = match self.runner.run(tool, &args).await {
            Ok(output) => output,
            Err(e) => {
                return StageOutcome::failed(format!("Metadata extraction failed: {}", e), None)
            }
        };

        let raw = output.stdout.trim();
        if raw.is_empty() {
            return StageOutcome::failed(
                format!("Metadata tool produced no output ({})", output.describe_exit()),
                Some(output.stderr),
            );
        }

        // The tool exits non-zero when some files were unreadable but still
        // reports the rest, so the exit code alone is not a failure.
        if !output.success() {
            warn!(
                exit = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "metadata tool reported errors"
            );
        }

        let records = match parse_records(raw) {
            Ok(records) => records,
            Err(e) => {
                return StageOutcome::failed(
                    format!("Could not parse metadata JSON: {}", e),
                    Some(output.stderr),
                )
            }
        };

        if let Err(e) = fs::write(&self.output_file, raw) {
            warn!(path = %self.output_file.display(), error = %e, "could not persist raw metadata");
        }

        if records.is_empty() {
            return StageOutcome::no_data("Metadata tool returned no records");
        }

        let message = format!(
            "Extracted metadata for {} file(s), saved to {}",
            records.len(),
            self.output_file.display()
        );
        StageOutcome::completed(records, message)
    }
}

fn parse_records(raw: &str) -> serde_json::Result<Vec<MetadataRecord>> {
    let values: Vec<Value> = serde_json::from_str(raw)?;

    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(fields) => Some(MetadataRecord::new(fields)),
            other => {
                debug!(?other, "ignoring non-object metadata entry");
                None
            }
        })
        .collect())
}
