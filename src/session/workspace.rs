use crate::error::{Result, SweepError};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_PREFIX: &str = "ForensicSession_";
const RECOVERY_PREFIX: &str = "Recovery_";
const HISTORY_DIR_NAME: &str = "AmcacheAnalysis";
const METADATA_FILE_NAME: &str = "metadata.json";
const REPORT_FILE_NAME: &str = "consolidated_artifacts.csv";
const PIPELINE_REPORT_FILE_NAME: &str = "pipeline_report.json";

/// Key that every session path is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Second-resolution local timestamp, e.g. `20250301_142501`
    pub fn now() -> Self {
        Self(Local::now().format("%Y%m%d_%H%M%S").to_string())
    }

    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();

        if id.is_empty() || id.len() > 64 {
            return Err(SweepError::InvalidPath {
                path: format!("session id must be 1-64 characters: '{}'", id),
            });
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(SweepError::InvalidPath {
                path: format!(
                    "session id may only contain letters, digits, '_' and '-': '{}'",
                    id
                ),
            });
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}_{}", self.0, n))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every path one pipeline run reads or writes. Paths are fixed at construction
/// and the directories are left on disk after the run.
#[derive(Debug, Clone)]
pub struct SessionWorkspace {
    id: SessionId,
    session_dir: PathBuf,
    recovery_dir: PathBuf,
    recovery_root: PathBuf,
}

impl SessionWorkspace {
    /// Derive the layout for `id` without touching the filesystem
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        base_directory: P,
        recovery_root: Q,
        id: SessionId,
    ) -> Self {
        let session_dir = base_directory
            .as_ref()
            .join(format!("{}{}", SESSION_PREFIX, id));
        let recovery_dir = recovery_root
            .as_ref()
            .join(format!("{}{}", RECOVERY_PREFIX, id));

        Self {
            id,
            session_dir,
            recovery_dir,
            recovery_root: recovery_root.as_ref().to_path_buf(),
        }
    }

    /// First layout for `id`, or `id` with a `_1`, `_2`, ... suffix, whose
    /// session and recovery directories are both absent. Nothing is created,
    /// so another run may still take the same id.
    pub fn next_free<P: AsRef<Path>, Q: AsRef<Path>>(
        base_directory: P,
        recovery_root: Q,
        id: SessionId,
    ) -> Self {
        let mut candidate = Self::new(&base_directory, &recovery_root, id.clone());
        let mut suffix = 0;

        while candidate.session_dir.exists() || candidate.recovery_dir.exists() {
            suffix += 1;
            candidate = Self::new(&base_directory, &recovery_root, id.with_suffix(suffix));
        }

        candidate
    }

    /// Claim a fresh session for `id`, suffixing it as [`SessionWorkspace::next_free`]
    /// does. The session directory is created with a non-recursive `create_dir`,
    /// so of two runs racing for one id exactly one wins and the other moves on
    /// to the next suffix. Call [`SessionWorkspace::initialize`] afterwards.
    pub fn allocate<P: AsRef<Path>, Q: AsRef<Path>>(
        base_directory: P,
        recovery_root: Q,
        id: SessionId,
    ) -> Result<Self> {
        let base = base_directory.as_ref();
        fs::create_dir_all(base).map_err(|e| SweepError::InvalidPath {
            path: format!("Cannot create directory {}: {}", base.display(), e),
        })?;

        let mut suffix = 0;
        loop {
            let candidate_id = if suffix == 0 {
                id.clone()
            } else {
                id.with_suffix(suffix)
            };
            let candidate = Self::new(base, &recovery_root, candidate_id);
            suffix += 1;

            if candidate.recovery_dir.exists() {
                continue;
            }

            match fs::create_dir(&candidate.session_dir) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(SweepError::InvalidPath {
                        path: format!(
                            "Cannot create directory {}: {}",
                            candidate.session_dir.display(),
                            e
                        ),
                    })
                }
            }
        }
    }

    /// Create every session directory. Directories that already exist are kept as they are.
    pub fn initialize(&self) -> Result<()> {
        for dir in [&self.session_dir, &self.history_dir(), &self.recovery_dir] {
            fs::create_dir_all(dir).map_err(|e| SweepError::InvalidPath {
                path: format!("Cannot create directory {}: {}", dir.display(), e),
            })?;
        }

        Ok(())
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn recovery_dir(&self) -> &Path {
        &self.recovery_dir
    }

    pub fn recovery_root(&self) -> &Path {
        &self.recovery_root
    }

    pub fn history_dir(&self) -> PathBuf {
        self.session_dir.join(HISTORY_DIR_NAME)
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.session_dir.join(METADATA_FILE_NAME)
    }

    pub fn report_file(&self) -> PathBuf {
        self.session_dir.join(REPORT_FILE_NAME)
    }

    pub fn pipeline_report_file(&self) -> PathBuf {
        self.session_dir.join(PIPELINE_REPORT_FILE_NAME)
    }

    pub fn display_summary(&self) -> String {
        format!(
            "Session: {}\nAnalysis directory: {}\nRecovery directory: {}\nHistory tables: {}\nReport: {}",
            self.id,
            self.session_dir.display(),
            self.recovery_dir.display(),
            self.history_dir().display(),
            self.report_file().display()
        )
    }
}
