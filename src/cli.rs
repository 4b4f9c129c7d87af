use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::session::SessionId;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "forensic-sweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recover deleted files, extract their metadata and consolidate execution history")]
#[command(
    long_about = "forensic-sweep carves deleted files from a disk with PhotoRec, extracts metadata \
                  from the recovered files with ExifTool, parses the Amcache execution-history hive \
                  with AmcacheParser, and merges everything into one CSV report per session."
)]
#[command(before_help = "🔎 forensic-sweep - Forensic Artifact Sweep")]
#[command(after_help = "EXAMPLES:\n  \
    forensic-sweep --disk /dev/sdb\n  \
    forensic-sweep --disk E:\\ --file-types jpg,mp4,pdf --tools-dir C:\\forensics\\tools\n  \
    forensic-sweep --session-id case42 --output /cases --timeout 0\n  \
    forensic-sweep --config sweep.toml --dry-run")]
pub struct Cli {
    /// Disk or volume to carve, passed to the carving tool unchanged
    #[arg(long, env = "FORENSIC_SWEEP_DISK")]
    pub disk: Option<String>,

    /// File types to recover (comma-separated)
    #[arg(short = 't', long, help = "File-type signatures to recover (e.g., jpg,mp4)")]
    pub file_types: Option<String>,

    /// Extensions to extract metadata from (comma-separated)
    #[arg(short, long, help = "Extensions to read metadata from (e.g., jpg,pdf)")]
    pub extensions: Option<String>,

    /// Directory searched for all three tools
    #[arg(long)]
    pub tools_dir: Option<PathBuf>,

    /// Directory containing the carving tool
    #[arg(long)]
    pub carver_dir: Option<PathBuf>,

    /// Directory containing the metadata tool
    #[arg(long)]
    pub metadata_dir: Option<PathBuf>,

    /// Directory containing the execution-history parser
    #[arg(long)]
    pub history_dir: Option<PathBuf>,

    /// Execution-history hive to parse
    #[arg(long = "hive")]
    pub hive: Option<PathBuf>,

    /// Base directory for session output
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory that holds every session's recovered files
    #[arg(long)]
    pub recovery_root: Option<PathBuf>,

    /// Reuse or name a session instead of allocating a timestamped one
    #[arg(long, value_parser = parse_session_id)]
    pub session_id: Option<SessionId>,

    /// Per-tool timeout in seconds (0 disables it)
    #[arg(long, help = "Timeout for each external tool invocation (seconds, 0 = none)")]
    pub timeout: Option<u64>,

    /// Extract metadata from every past recovery, not only this session's
    #[arg(long)]
    pub scan_all_recoveries: bool,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show what would be done without executing)
    #[arg(long, help = "Show the resolved configuration and tools without running anything")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_disk_target(self.disk.clone())
            .with_file_types(self.file_types.clone())
            .with_extensions(self.extensions.clone())
            .with_scan_all_recoveries(self.scan_all_recoveries.then_some(true))
            .with_tools_dir(self.tools_dir.clone())
            .with_tool_dirs(
                self.carver_dir.clone(),
                self.metadata_dir.clone(),
                self.history_dir.clone(),
            )
            .with_hive_path(self.hive.clone())
            .with_output_dir(self.output.clone())
            .with_recovery_root(self.recovery_root.clone())
            .with_timeout(self.timeout)
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

fn parse_session_id(s: &str) -> std::result::Result<SessionId, String> {
    SessionId::new(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_need_no_arguments() {
        let cli = Cli::try_parse_from(["forensic-sweep"]).unwrap();
        assert!(cli.disk.is_none());
        assert!(!cli.dry_run);
        assert_eq!(cli.verbosity_level(), 0);
    }

    #[test]
    fn test_overrides_from_flags() {
        let cli = Cli::try_parse_from([
            "forensic-sweep",
            "--disk",
            "/dev/sdc",
            "-t",
            "jpg,PNG",
            "--tools-dir",
            "/opt/tools",
            "--hive",
            "/evidence/Amcache.hve",
            "--timeout",
            "60",
            "--scan-all-recoveries",
        ])
        .unwrap();

        let mut config = Config::default();
        config.merge_with_cli_args(&cli.create_cli_overrides());

        assert_eq!(config.recovery.disk_target, "/dev/sdc");
        assert_eq!(config.recovery.file_types, vec!["jpg", "png"]);
        assert_eq!(config.tools.history_dir, PathBuf::from("/opt/tools"));
        assert_eq!(config.history.hive_path, PathBuf::from("/evidence/Amcache.hve"));
        assert_eq!(config.process.timeout, 60);
        assert!(config.metadata.scan_all_recoveries);
    }

    #[test]
    fn test_session_id_is_validated() {
        let cli = Cli::try_parse_from(["forensic-sweep", "--session-id", "case_42"]).unwrap();
        assert_eq!(cli.session_id.unwrap().as_str(), "case_42");

        assert!(Cli::try_parse_from(["forensic-sweep", "--session-id", "../escape"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["forensic-sweep", "-q", "-v"]).is_err());

        let cli = Cli::try_parse_from(["forensic-sweep", "-vv"]).unwrap();
        assert_eq!(cli.verbosity_level(), 2);
    }
}
