#![cfg(unix)]

use forensic_sweep::{
    Config, ForensicSweep, GracefulShutdown, OutputMode, PipelineReport, SessionId, Stage,
    StageStatus, StaticToolResolver, ToolKind, ToolResolver,
};
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CARVER: &str = r#"#!/bin/sh
if [ "$3" = "fileopt" ]; then exit 0; fi
if [ "$1" = "/d" ] && [ "$5" = "search" ]; then
  mkdir -p "$2/recup_dir.1"
  echo carved > "$2/recup_dir.1/f0000001.jpg"
  echo carved > "$2/recup_dir.1/f0000002.mp4"
  exit 0
fi
exit 1
"#;

const METADATA_TOOL: &str = r#"#!/bin/sh
for last; do :; done
printf '[{"SourceFile": "%s/f0000001.jpg", "File": {"FileType": "JPEG"}, "EXIF": {"Make": "Canon"}}]' "$last"
"#;

const HISTORY_TOOL: &str = r#"#!/bin/sh
[ "$1" = "-f" ] && [ -f "$2" ] && [ "$3" = "--csv" ] || exit 9
printf 'ProgramName,FullPath\nevil,C:\\evil.exe\ncalc,C:\\calc.exe\n' > "$4/20250101_Amcache_UnassociatedFileEntries.csv"
"#;

struct Case {
    dir: TempDir,
    config: Config,
}

impl Case {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let hive = dir.path().join("evidence/Amcache.hve");
        fs::create_dir_all(hive.parent().unwrap()).unwrap();
        fs::write(&hive, b"regf").unwrap();

        let mut config = Config::default();
        config.output.base_directory = dir.path().join("cases");
        config.output.recovery_root = dir.path().join("cases/RecoveredFiles");
        config.history.hive_path = hive;

        Self { dir, config }
    }

    fn tool(&self, name: &str, body: &str) -> PathBuf {
        let tools = self.dir.path().join("tools");
        fs::create_dir_all(&tools).unwrap();
        let path = tools.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn sweep<R: ToolResolver + 'static>(&self, resolver: R) -> ForensicSweep {
        ForensicSweep::detached(self.config.clone(), OutputMode::Plain, 0, true)
            .with_resolver(resolver)
    }

    fn session_dir(&self, id: &str) -> PathBuf {
        self.dir.path().join(format!("cases/ForensicSession_{}", id))
    }
}

fn read_rows(path: &Path) -> (Vec<String>, Vec<HashMap<String, String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| {
            headers
                .iter()
                .cloned()
                .zip(r.unwrap().iter().map(String::from))
                .collect()
        })
        .collect();
    (headers, rows)
}

fn status(report: &PipelineReport, stage: Stage) -> StageStatus {
    report.stage(stage).unwrap().status
}

#[tokio::test]
async fn history_only_when_carver_is_missing() {
    let case = Case::new();
    let resolver = StaticToolResolver::new()
        .with_tool(ToolKind::Metadata, case.tool("exiftool", METADATA_TOOL))
        .with_tool(ToolKind::History, case.tool("AmcacheParser", HISTORY_TOOL));

    let report = case
        .sweep(resolver)
        .run_pipeline(Some(SessionId::new("nocarver").unwrap()))
        .await
        .unwrap();

    assert_eq!(status(&report, Stage::Recovery), StageStatus::Skipped);
    assert_eq!(status(&report, Stage::Metadata), StageStatus::NoData);
    assert_eq!(status(&report, Stage::History), StageStatus::Completed);
    assert_eq!(status(&report, Stage::Consolidation), StageStatus::Completed);
    assert!(!report.has_failures());

    let (_, rows) = read_rows(report.consolidated_report.as_ref().unwrap());
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["Source"] == "Amcache"));
    assert!(rows
        .iter()
        .all(|r| r["Original_File"] == "20250101_Amcache_UnassociatedFileEntries.csv"));
}

#[tokio::test]
async fn full_run_merges_both_sources() {
    let case = Case::new();
    let resolver = StaticToolResolver::new()
        .with_tool(ToolKind::Carver, case.tool("photorec", CARVER))
        .with_tool(ToolKind::Metadata, case.tool("exiftool", METADATA_TOOL))
        .with_tool(ToolKind::History, case.tool("AmcacheParser", HISTORY_TOOL));

    let report = case
        .sweep(resolver)
        .run_pipeline(Some(SessionId::new("full").unwrap()))
        .await
        .unwrap();

    for stage in Stage::ALL {
        assert_eq!(status(&report, stage), StageStatus::Completed, "{:?}", report.stage(stage));
    }
    assert_eq!(report.stage(Stage::Recovery).unwrap().items, 2);

    let session_dir = case.session_dir("full");
    assert!(session_dir.join("metadata.json").is_file());
    assert!(session_dir.join("pipeline_report.json").is_file());

    let (headers, rows) = read_rows(&session_dir.join("consolidated_artifacts.csv"));
    assert_eq!(&headers[..2], &["Source".to_string(), "Original_File".to_string()]);
    for column in ["File.FileType", "EXIF.Make", "ProgramName", "FullPath"] {
        assert!(headers.contains(&column.to_string()), "missing {}", column);
    }
    assert!(!headers.contains(&"SourceFile".to_string()));

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["Source"], "ExifTool");
    assert!(rows[0]["Original_File"].ends_with("recup_dir.1/f0000001.jpg"));
    assert_eq!(rows[0]["EXIF.Make"], "Canon");
    assert_eq!(rows[0]["ProgramName"], "NaN");
    assert_eq!(rows[1]["Source"], "Amcache");
    assert_eq!(rows[1]["EXIF.Make"], "NaN");
    assert_eq!(rows[2]["ProgramName"], "calc");

    let saved = PipelineReport::load_json(&session_dir.join("pipeline_report.json")).unwrap();
    assert_eq!(saved.stages.len(), 4);
    assert_eq!(saved.session_id, "full");
}

#[tokio::test]
async fn failed_history_stage_keeps_metadata_rows() {
    let mut case = Case::new();
    case.config.history.hive_path = case.dir.path().join("missing.hve");
    let resolver = StaticToolResolver::new()
        .with_tool(ToolKind::Carver, case.tool("photorec", CARVER))
        .with_tool(ToolKind::Metadata, case.tool("exiftool", METADATA_TOOL))
        .with_tool(ToolKind::History, case.tool("AmcacheParser", HISTORY_TOOL));

    let report = case.sweep(resolver).run_pipeline(None).await.unwrap();

    assert_eq!(status(&report, Stage::History), StageStatus::Failed);
    assert!(report.has_failures());
    assert_eq!(status(&report, Stage::Consolidation), StageStatus::Completed);

    let (_, rows) = read_rows(report.consolidated_report.as_ref().unwrap());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Source"], "ExifTool");
}

#[tokio::test]
async fn sessions_do_not_collide() {
    let case = Case::new();
    let first = case
        .sweep(StaticToolResolver::new())
        .run_pipeline(None)
        .await
        .unwrap();
    let second = case
        .sweep(StaticToolResolver::new())
        .run_pipeline(None)
        .await
        .unwrap();

    assert_ne!(first.session_dir, second.session_dir);
    assert_ne!(first.recovery_dir, second.recovery_dir);
}

struct CancelWhileRecovering {
    shutdown: GracefulShutdown,
}

impl ToolResolver for CancelWhileRecovering {
    fn resolve(&self, kind: ToolKind) -> Option<PathBuf> {
        if kind == ToolKind::Carver {
            self.shutdown.request_shutdown();
        }
        None
    }
}

#[tokio::test]
async fn cancellation_skips_remaining_stages() {
    let case = Case::new();
    let sweep = ForensicSweep::detached(case.config.clone(), OutputMode::Plain, 0, true);
    let shutdown = sweep.shutdown_handle();
    let sweep = sweep.with_resolver(CancelWhileRecovering { shutdown });

    let report = sweep
        .run_pipeline(Some(SessionId::new("interrupted").unwrap()))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.stages.len(), 4);
    for stage in [Stage::Metadata, Stage::History, Stage::Consolidation] {
        let entry = report.stage(stage).unwrap();
        assert_eq!(entry.status, StageStatus::Skipped);
        assert_eq!(entry.message, "cancelled");
    }
    assert!(case.session_dir("interrupted").join("pipeline_report.json").is_file());
}
