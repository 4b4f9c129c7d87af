use clap::Parser;
use forensic_sweep::{
    Cli, ForensicSweep, OutputFormatter, OutputMode, SessionId, SessionWorkspace, SweepError,
    ToolKind, UserFriendlyError,
};
use std::process;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    setup_logging(cli.verbosity_level(), cli.quiet);

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let sweep = match ForensicSweep::from_cli(&cli) {
        Ok(sweep) => sweep,
        Err(e) => {
            print_startup_error(&e);
            return 1;
        }
    };

    if cli.dry_run {
        return handle_dry_run(&cli, &sweep);
    }

    match sweep.run_pipeline(cli.session_id.clone()).await {
        Ok(report) => {
            sweep.output_formatter().print_pipeline_report(&report);

            if report.cancelled {
                130 // Interrupted (SIGINT)
            } else if report.has_failures() {
                2 // Finished with failed stages
            } else {
                0
            }
        }
        Err(e) => {
            sweep.handle_error(&e);

            match e {
                SweepError::Cancelled => 130,
                SweepError::InvalidPath { .. } | SweepError::Io(_) => 3,
                _ => 1,
            }
        }
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "forensic-sweep.toml".to_string());

    match ForensicSweep::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  forensic-sweep --config {}", config_path);
            println!("\nEdit the file to point at your disk, hive and tool installations.");
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(cli: &Cli, sweep: &ForensicSweep) -> i32 {
    let formatter = sweep.output_formatter();
    let config = sweep.config();

    formatter.print_header("DRY RUN - no tool will be started and nothing will be created");

    println!("Configuration that would be used:");
    println!("  Disk target: {}", config.recovery.disk_target);
    println!("  File types: {}", config.recovery.file_types.join(", "));
    println!("  Metadata extensions: {}", config.metadata.extensions.join(", "));
    println!("  Scan all recoveries: {}", config.metadata.scan_all_recoveries);
    println!("  Hive: {}", config.history.hive_path.display());
    println!("  Base directory: {}", config.output.base_directory.display());
    println!("  Recovery root: {}", config.output.recovery_root.display());
    println!("  Placeholder: {}", config.output.placeholder);
    match config.process_timeout() {
        Some(timeout) => println!("  Tool timeout: {} seconds", timeout.as_secs()),
        None => println!("  Tool timeout: none"),
    }

    formatter.print_separator();

    println!("Tools:");
    for kind in ToolKind::ALL {
        match sweep.resolve_tool(kind) {
            Some(path) => println!("  {}: {}", kind, path.display()),
            None => println!("  {}: not found (stage would be skipped)", kind),
        }
    }

    if !config.history.hive_path.is_file() {
        formatter.warning(&format!(
            "Hive not found at {}; execution history extraction would fail",
            config.history.hive_path.display()
        ));
    }

    formatter.print_separator();

    let workspace = match cli.session_id.clone() {
        Some(id) => SessionWorkspace::new(
            &config.output.base_directory,
            &config.output.recovery_root,
            id,
        ),
        None => SessionWorkspace::next_free(
            &config.output.base_directory,
            &config.output.recovery_root,
            SessionId::now(),
        ),
    };

    println!("Session layout:");
    for line in workspace.display_summary().lines() {
        println!("  {}", line);
    }

    formatter.print_separator();
    formatter.success("Dry run completed successfully");
    formatter.info("Run without --dry-run to start the sweep");

    0
}

fn print_startup_error(error: &SweepError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

/// Diagnostics go to stderr so JSON output on stdout stays parseable.
/// `RUST_LOG` wins over the `-v` count.
fn setup_logging(verbosity: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("forensic_sweep={}", default_level)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use forensic_sweep::{Config, StaticToolResolver};
    use std::fs;
    use tempfile::TempDir;

    fn cli_with(args: &[&str]) -> Cli {
        let mut full = vec!["forensic-sweep"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        let path_arg = config_path.to_string_lossy().to_string();

        let cli = cli_with(&["--generate-config", "--config", &path_arg]);

        assert_eq!(handle_generate_config(&cli), 0);
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[recovery]"));
    }

    #[test]
    fn test_dry_run_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output.base_directory = temp_dir.path().join("cases");
        config.output.recovery_root = temp_dir.path().join("cases/RecoveredFiles");

        let sweep = ForensicSweep::detached(config, OutputMode::Plain, 0, true)
            .with_resolver(StaticToolResolver::new());
        let cli = cli_with(&["--dry-run", "--session-id", "plan"]);

        assert_eq!(handle_dry_run(&cli, &sweep), 0);
        assert!(!temp_dir.path().join("cases").exists());
    }
}
