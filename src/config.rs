use crate::error::{Result, SweepError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const RECOVERED_FILES_DIR: &str = "RecoveredFiles";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub recovery: RecoveryConfig,
    pub metadata: MetadataConfig,
    pub history: HistoryConfig,
    pub tools: ToolsConfig,
    pub output: OutputConfig,
    pub process: ProcessConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecoveryConfig {
    /// Fully formed device or volume reference handed to the carving tool as-is
    pub disk_target: String,
    pub file_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    pub extensions: Vec<String>,
    /// Scan every past recovery under the recovery root, not only this session's
    pub scan_all_recoveries: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    pub hive_path: PathBuf,
    pub table_extension: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    pub carver_dir: PathBuf,
    pub carver_name: String,
    pub metadata_dir: PathBuf,
    pub metadata_name: String,
    pub history_dir: PathBuf,
    pub history_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub base_directory: PathBuf,
    pub recovery_root: PathBuf,
    pub placeholder: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessConfig {
    /// Per-invocation limit in seconds; 0 waits indefinitely
    pub timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recovery: RecoveryConfig::default(),
            metadata: MetadataConfig::default(),
            history: HistoryConfig::default(),
            tools: ToolsConfig::default(),
            output: OutputConfig::default(),
            process: ProcessConfig::default(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        let disk_target = if cfg!(windows) { "E:\\" } else { "/dev/sdb" };

        Self {
            disk_target: disk_target.to_string(),
            file_types: vec!["jpg".to_string(), "mp4".to_string()],
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string(), "pdf".to_string()],
            scan_all_recoveries: false,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            hive_path: PathBuf::from(r"C:\Windows\AppCompat\Programs\Amcache.hve"),
            table_extension: "csv".to_string(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let tools_root = PathBuf::from("tools");

        Self {
            carver_dir: tools_root.join("testdisk-7.3-WIP"),
            carver_name: "photorec".to_string(),
            metadata_dir: tools_root.join("exiftool-13.19_64"),
            metadata_name: "exiftool".to_string(),
            history_dir: tools_root.join("AmcacheParser"),
            history_name: "AmcacheParser".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        let base_directory = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let recovery_root = base_directory.join(RECOVERED_FILES_DIR);

        Self {
            base_directory,
            recovery_root,
            placeholder: "NaN".to_string(),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            timeout: 3600, // 1 hour
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SweepError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SweepError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| SweepError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["forensic-sweep.toml", ".forensic-sweep.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref disk) = cli_args.disk_target {
            self.recovery.disk_target = disk.clone();
        }

        if let Some(ref file_types) = cli_args.file_types {
            self.recovery.file_types = split_list(file_types);
        }

        if let Some(ref extensions) = cli_args.extensions {
            self.metadata.extensions = split_list(extensions);
        }

        if let Some(scan_all) = cli_args.scan_all_recoveries {
            self.metadata.scan_all_recoveries = scan_all;
        }

        // A flat tools directory applies to every tool; per-tool flags win over it
        if let Some(ref tools_dir) = cli_args.tools_dir {
            self.tools.carver_dir = tools_dir.clone();
            self.tools.metadata_dir = tools_dir.clone();
            self.tools.history_dir = tools_dir.clone();
        }

        if let Some(ref dir) = cli_args.carver_dir {
            self.tools.carver_dir = dir.clone();
        }

        if let Some(ref dir) = cli_args.metadata_dir {
            self.tools.metadata_dir = dir.clone();
        }

        if let Some(ref dir) = cli_args.history_dir {
            self.tools.history_dir = dir.clone();
        }

        if let Some(ref hive) = cli_args.hive_path {
            self.history.hive_path = hive.clone();
        }

        // Moving the base moves the recovery root with it unless that is given too
        if let Some(ref output_dir) = cli_args.output_dir {
            self.output.base_directory = output_dir.clone();
            self.output.recovery_root = output_dir.join(RECOVERED_FILES_DIR);
        }

        if let Some(ref recovery_root) = cli_args.recovery_root {
            self.output.recovery_root = recovery_root.clone();
        }

        if let Some(timeout) = cli_args.timeout {
            self.process.timeout = timeout;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| SweepError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| SweepError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.recovery.disk_target.trim().is_empty() {
            return Err(SweepError::Config {
                message: "A disk target must be specified".to_string(),
            });
        }

        if self.recovery.file_types.is_empty() {
            return Err(SweepError::Config {
                message: "At least one file type to recover must be specified".to_string(),
            });
        }

        if self.metadata.extensions.is_empty() {
            return Err(SweepError::Config {
                message: "At least one metadata extension must be specified".to_string(),
            });
        }

        let signature = Regex::new(r"^[A-Za-z0-9_]+$").map_err(|e| SweepError::Config {
            message: format!("Invalid signature pattern: {}", e),
        })?;

        let names = self
            .recovery
            .file_types
            .iter()
            .chain(self.metadata.extensions.iter())
            .chain(std::iter::once(&self.history.table_extension));

        for name in names {
            if !signature.is_match(name) {
                return Err(SweepError::Config {
                    message: format!(
                        "Invalid file type '{}': only letters, digits and underscores are allowed",
                        name
                    ),
                });
            }
        }

        for (label, name) in [
            ("carver", &self.tools.carver_name),
            ("metadata", &self.tools.metadata_name),
            ("history", &self.tools.history_name),
        ] {
            if name.trim().is_empty() {
                return Err(SweepError::Config {
                    message: format!("The {} tool name must not be empty", label),
                });
            }
        }

        if self.output.placeholder.is_empty() {
            return Err(SweepError::Config {
                message: "The missing-value placeholder must not be empty".to_string(),
            });
        }

        if let Some(parent) = self.output.base_directory.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(SweepError::Config {
                    message: format!("Parent directory does not exist: {}", parent.display()),
                });
            }
        }

        Ok(())
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        match self.process.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub disk_target: Option<String>,
    pub file_types: Option<String>,
    pub extensions: Option<String>,
    pub scan_all_recoveries: Option<bool>,
    pub tools_dir: Option<PathBuf>,
    pub carver_dir: Option<PathBuf>,
    pub metadata_dir: Option<PathBuf>,
    pub history_dir: Option<PathBuf>,
    pub hive_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub recovery_root: Option<PathBuf>,
    pub timeout: Option<u64>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disk_target(mut self, disk_target: Option<String>) -> Self {
        self.disk_target = disk_target;
        self
    }

    pub fn with_file_types(mut self, file_types: Option<String>) -> Self {
        self.file_types = file_types;
        self
    }

    pub fn with_extensions(mut self, extensions: Option<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_scan_all_recoveries(mut self, scan_all: Option<bool>) -> Self {
        self.scan_all_recoveries = scan_all;
        self
    }

    pub fn with_tools_dir(mut self, tools_dir: Option<PathBuf>) -> Self {
        self.tools_dir = tools_dir;
        self
    }

    pub fn with_tool_dirs(
        mut self,
        carver_dir: Option<PathBuf>,
        metadata_dir: Option<PathBuf>,
        history_dir: Option<PathBuf>,
    ) -> Self {
        self.carver_dir = carver_dir;
        self.metadata_dir = metadata_dir;
        self.history_dir = history_dir;
        self
    }

    pub fn with_hive_path(mut self, hive_path: Option<PathBuf>) -> Self {
        self.hive_path = hive_path;
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_recovery_root(mut self, recovery_root: Option<PathBuf>) -> Self {
        self.recovery_root = recovery_root;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }
}
