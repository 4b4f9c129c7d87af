use crate::config::ToolsConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The three external collaborators the pipeline drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Carver,
    Metadata,
    History,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Carver, ToolKind::Metadata, ToolKind::History];

    pub fn display_name(&self) -> &'static str {
        match self {
            ToolKind::Carver => "PhotoRec",
            ToolKind::Metadata => "ExifTool",
            ToolKind::History => "AmcacheParser",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Maps a logical tool to an executable path. `None` means the tool is unavailable
/// and the dependent stage should be skipped.
pub trait ToolResolver: Send + Sync {
    fn resolve(&self, kind: ToolKind) -> Option<PathBuf>;
}

/// Return the first executable in `dir` whose file name contains `name`,
/// compared case-insensitively. Only immediate entries are considered, in
/// directory-listing order. A missing or unreadable directory yields `None`.
pub fn find_executable(dir: &Path, name: &str) -> Option<PathBuf> {
    let needle = name.to_lowercase();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "tool directory not readable");
            return None;
        }
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy().to_lowercase();

        if file_name.contains(&needle) && is_executable(&entry.path()) {
            return Some(entry.path());
        }
    }

    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("exe"))
}

#[cfg(not(any(unix, windows)))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Resolves tools by scanning their installation directories on every lookup
pub struct DirectoryToolResolver {
    locations: HashMap<ToolKind, (PathBuf, String)>,
}

impl DirectoryToolResolver {
    pub fn new() -> Self {
        Self {
            locations: HashMap::new(),
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self::new()
            .with_location(ToolKind::Carver, &config.carver_dir, &config.carver_name)
            .with_location(ToolKind::Metadata, &config.metadata_dir, &config.metadata_name)
            .with_location(ToolKind::History, &config.history_dir, &config.history_name)
    }

    pub fn with_location<P: Into<PathBuf>, S: Into<String>>(
        mut self,
        kind: ToolKind,
        dir: P,
        name: S,
    ) -> Self {
        self.locations.insert(kind, (dir.into(), name.into()));
        self
    }
}

impl Default for DirectoryToolResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolResolver for DirectoryToolResolver {
    fn resolve(&self, kind: ToolKind) -> Option<PathBuf> {
        let (dir, name) = self.locations.get(&kind)?;
        find_executable(dir, name)
    }
}

/// Fixed tool paths, for hosts with a known layout and for tests
#[derive(Debug, Default, Clone)]
pub struct StaticToolResolver {
    tools: HashMap<ToolKind, PathBuf>,
}

impl StaticToolResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool<P: Into<PathBuf>>(mut self, kind: ToolKind, path: P) -> Self {
        self.tools.insert(kind, path.into());
        self
    }
}

impl ToolResolver for StaticToolResolver {
    fn resolve(&self, kind: ToolKind) -> Option<PathBuf> {
        self.tools.get(&kind).cloned()
    }
}
