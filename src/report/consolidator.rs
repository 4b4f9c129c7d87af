use crate::error::{Result, SweepError};
use crate::session::SessionWorkspace;
use crate::stages::metadata::{MetadataRecord, SOURCE_FILE_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SOURCE_COLUMN: &str = "Source";
pub const ORIGINAL_FILE_COLUMN: &str = "Original_File";
pub const METADATA_SOURCE_TAG: &str = "ExifTool";
pub const HISTORY_SOURCE_TAG: &str = "Amcache";

/// Row-oriented table whose column set grows as rows are added. Cells a row
/// never set are rendered with the placeholder on output.
#[derive(Debug, Clone)]
pub struct WideTable {
    columns: Vec<String>,
    known: HashSet<String>,
    rows: Vec<HashMap<String, String>>,
}

impl WideTable {
    pub fn new() -> Self {
        let mut table = Self {
            columns: Vec::new(),
            known: HashSet::new(),
            rows: Vec::new(),
        };
        table.ensure_column(SOURCE_COLUMN);
        table.ensure_column(ORIGINAL_FILE_COLUMN);
        table
    }

    pub fn push_row<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut row = HashMap::new();
        for (column, value) in cells {
            self.ensure_column(&column);
            row.insert(column, value);
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell as it will be written: empty and absent cells become `placeholder`
    pub fn cell<'t>(&'t self, row: usize, column: &str, placeholder: &'t str) -> Option<&'t str> {
        let row = self.rows.get(row)?;
        Some(
            row.get(column)
                .map(String::as_str)
                .filter(|v| !v.is_empty())
                .unwrap_or(placeholder),
        )
    }

    pub fn write_csv(&self, path: &Path, placeholder: &str) -> Result<()> {
        let csv_error = |source: csv::Error| SweepError::Csv {
            path: path.to_path_buf(),
            source,
        };

        // Stage next to the target so the report appears in one rename
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let staged = tempfile::NamedTempFile::new_in(dir)?;

        {
            let mut writer = csv::Writer::from_writer(staged.as_file());
            writer.write_record(&self.columns).map_err(csv_error)?;

            for index in 0..self.rows.len() {
                let record = self
                    .columns
                    .iter()
                    .map(|c| self.cell(index, c, placeholder).unwrap_or(placeholder));
                writer.write_record(record).map_err(csv_error)?;
            }

            writer.flush()?;
        }

        staged.persist(path).map_err(|e| SweepError::Io(e.error))?;
        Ok(())
    }

    fn ensure_column(&mut self, column: &str) {
        if self.known.insert(column.to_string()) {
            self.columns.push(column.to_string());
        }
    }
}

impl Default for WideTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten a JSON object into `(dotted.path, text)` pairs. Nulls become empty
/// cells, empty objects contribute nothing and arrays are kept as JSON text.
pub fn flatten_record(fields: &Map<String, Value>) -> Vec<(String, String)> {
    let mut cells = Vec::new();
    flatten_into(None, fields, &mut cells);
    cells
}

fn flatten_into(
    prefix: Option<&str>,
    fields: &Map<String, Value>,
    cells: &mut Vec<(String, String)>,
) {
    for (key, value) in fields {
        let column = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };

        match value {
            Value::Object(nested) => flatten_into(Some(&column), nested, cells),
            Value::Null => cells.push((column, String::new())),
            Value::String(s) => cells.push((column, s.clone())),
            Value::Array(_) => cells.push((column, value.to_string())),
            Value::Bool(_) | Value::Number(_) => cells.push((column, value.to_string())),
        }
    }
}

/// What was written for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub metadata_rows: usize,
    pub history_rows: usize,
    pub history_tables: usize,
}

/// Merges metadata records and execution-history tables into one wide report
pub struct ArtifactConsolidator {
    placeholder: String,
    table_extension: String,
}

impl ArtifactConsolidator {
    pub fn new<S: Into<String>>(placeholder: S) -> Self {
        Self {
            placeholder: placeholder.into(),
            table_extension: "csv".to_string(),
        }
    }

    pub fn with_table_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.table_extension = extension.into().trim_start_matches('.').to_lowercase();
        self
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Write the session's consolidated report. Returns `None`, without
    /// writing anything, when neither source has rows.
    pub fn consolidate(
        &self,
        metadata_records: &[MetadataRecord],
        session: &SessionWorkspace,
    ) -> Result<Option<ConsolidatedReport>> {
        let mut table = WideTable::new();

        let metadata_rows = self.add_metadata(&mut table, metadata_records);
        let (history_rows, history_tables) = self.add_history(&mut table, &session.history_dir());

        if table.is_empty() {
            debug!("no artifacts to consolidate");
            return Ok(None);
        }

        let path = session.report_file();
        table.write_csv(&path, &self.placeholder)?;

        Ok(Some(ConsolidatedReport {
            path,
            rows: table.len(),
            columns: table.columns().len(),
            metadata_rows,
            history_rows,
            history_tables,
        }))
    }

    fn add_metadata(&self, table: &mut WideTable, records: &[MetadataRecord]) -> usize {
        for record in records {
            let mut cells = vec![(SOURCE_COLUMN.to_string(), METADATA_SOURCE_TAG.to_string())];
            if let Some(source_file) = record.source_file() {
                cells.push((ORIGINAL_FILE_COLUMN.to_string(), source_file.to_string()));
            }

            let (columns, values): (Vec<String>, Vec<String>) = flatten_record(record.fields())
                .into_iter()
                .filter(|(column, _)| column != SOURCE_FILE_FIELD)
                .unzip();
            cells.extend(dedupe_headers(columns).into_iter().zip(values));

            table.push_row(cells);
        }

        records.len()
    }

    /// Every table in the directory is loaded, including ones this run did not produce
    fn add_history(&self, table: &mut WideTable, history_dir: &Path) -> (usize, usize) {
        let paths = match self.list_tables(history_dir) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(dir = %history_dir.display(), error = %e, "cannot list history tables");
                return (0, 0);
            }
        };

        let mut rows = 0;
        let mut tables = 0;

        for path in paths {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let loaded = match load_table(&path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!(table = %path.display(), error = %e, "skipping unreadable history table");
                    continue;
                }
            };

            if loaded.is_empty() {
                debug!(table = %file_name, "history table has no rows");
                continue;
            }

            tables += 1;
            rows += loaded.len();

            for fields in loaded {
                let mut cells = vec![
                    (SOURCE_COLUMN.to_string(), HISTORY_SOURCE_TAG.to_string()),
                    (ORIGINAL_FILE_COLUMN.to_string(), file_name.clone()),
                ];
                cells.extend(fields);
                table.push_row(cells);
            }
        }

        (rows, tables)
    }

    fn list_tables(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let matches = path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(&self.table_extension));
            if matches {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }
}

/// Read a CSV file into rows of `(header, value)`. Invalid UTF-8 is replaced
/// rather than rejected. Short rows yield empty cells for the missing columns.
fn load_table(path: &Path) -> Result<Vec<Vec<(String, String)>>> {
    let csv_error = |source: csv::Error| SweepError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let raw_headers: Vec<String> = reader
        .byte_headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim_start_matches('\u{feff}').to_string())
        .collect();
    let headers = dedupe_headers(raw_headers);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(csv_error)?;
        let row: Vec<(String, String)> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let value = record.get(i).unwrap_or_default();
                (h.clone(), String::from_utf8_lossy(value).into_owned())
            })
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Give every column a distinct name. A repeat of an earlier column, or of a
/// provenance column, gets the first free `.1`, `.2`, ... suffix.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = [SOURCE_COLUMN, ORIGINAL_FILE_COLUMN]
        .iter()
        .map(|c| c.to_string())
        .collect();

    headers
        .into_iter()
        .map(|header| {
            if used.insert(header.clone()) {
                return header;
            }
            let mut n = 1;
            loop {
                let candidate = format!("{}.{}", header, n);
                if used.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}
