use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn forensic_sweep() -> Command {
    let mut cmd = Command::cargo_bin("forensic-sweep").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("FORENSIC_SWEEP_DISK");
    cmd
}

#[test]
fn help_lists_pipeline_flags() {
    forensic_sweep()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--disk"))
        .stdout(predicate::str::contains("--session-id"))
        .stdout(predicate::str::contains("--scan-all-recoveries"));
}

#[test]
fn generate_config_writes_all_sections() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("sweep.toml");

    forensic_sweep()
        .arg("--generate-config")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated sample configuration file"));

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[recovery]"));
    assert!(content.contains("[history]"));
    assert!(content.contains("placeholder"));
}

#[test]
fn dry_run_reports_plan_without_creating_anything() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("cases");

    forensic_sweep()
        .current_dir(temp_dir.path())
        .args(["--dry-run", "--disk", "/dev/sdq", "--session-id", "plan"])
        .arg("--output")
        .arg(&output)
        .arg("--tools-dir")
        .arg(temp_dir.path().join("no-tools"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Disk target: /dev/sdq"))
        .stdout(predicate::str::contains("ForensicSession_plan"))
        .stdout(predicate::str::contains("not found"));

    assert!(!output.exists());
}

#[test]
fn dry_run_warns_about_missing_hive_without_verbose() {
    let temp_dir = TempDir::new().unwrap();

    forensic_sweep()
        .current_dir(temp_dir.path())
        .args(["--dry-run", "--output-format", "plain"])
        .arg("--hive")
        .arg(temp_dir.path().join("absent.hve"))
        .assert()
        .success()
        .stdout(predicate::str::contains("WARNING: Hive not found"));
}

#[test]
fn invalid_config_is_a_startup_error() {
    let temp_dir = TempDir::new().unwrap();

    forensic_sweep()
        .current_dir(temp_dir.path())
        .args(["--dry-run", "--file-types", "jpg;rm"])
        .assert()
        .code(1);
}

#[test]
fn missing_config_file_is_a_startup_error() {
    let temp_dir = TempDir::new().unwrap();

    forensic_sweep()
        .arg("--config")
        .arg(temp_dir.path().join("absent.toml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[cfg(unix)]
#[test]
fn run_without_tools_exits_zero_and_writes_report() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("cases");

    forensic_sweep()
        .current_dir(temp_dir.path())
        .args(["--quiet", "--session-id", "cli", "--output-format", "plain"])
        .arg("--output")
        .arg(&output)
        .arg("--tools-dir")
        .arg(temp_dir.path().join("no-tools"))
        .arg("--hive")
        .arg(temp_dir.path().join("absent.hve"))
        .assert()
        .success()
        .stdout(predicate::str::contains("RECOVERY: skipped"))
        .stdout(predicate::str::contains("CONSOLIDATION: no data"));

    assert!(output.join("ForensicSession_cli/pipeline_report.json").is_file());
    assert!(output.join("RecoveredFiles/Recovery_cli").is_dir());
}
