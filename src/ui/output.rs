use crate::error::{SweepError, UserFriendlyError};
use crate::report::PipelineReport;
use crate::stages::{Stage, StageStatus};
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");
static SKIP: Emoji = Emoji("⏭️  ", "- ");
static EMPTY: Emoji = Emoji("📭 ", "0 ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let term = Term::stdout();
        let use_colors = match mode {
            OutputMode::Human => term.features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    /// One line per finished stage; captured tool stderr follows at `-v`
    pub fn stage_result(
        &self,
        stage: Stage,
        status: StageStatus,
        message: &str,
        stderr: Option<&str>,
    ) {
        if self.quiet && status != StageStatus::Failed {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                let line = format!("{}: {}", stage.title(), message);
                match status {
                    StageStatus::Completed => self.print_human_message(MessageType::Success, &line),
                    StageStatus::Failed => self.print_human_message(MessageType::Error, &line),
                    StageStatus::Skipped => {
                        if self.use_colors {
                            println!("{}{}", SKIP, style(&line).yellow());
                        } else {
                            println!("- {}", line);
                        }
                    }
                    StageStatus::NoData => {
                        if self.use_colors {
                            println!("{}{}", EMPTY, style(&line).dim());
                        } else {
                            println!("0 {}", line);
                        }
                    }
                }

                if let Some(stderr) = stderr {
                    if self.should_show_message(1) {
                        for stderr_line in stderr.lines() {
                            eprintln!("    | {}", stderr_line);
                        }
                    }
                }
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "stage",
                    "stage": stage,
                    "status": status,
                    "message": message,
                    "stderr": stderr,
                    "timestamp": chrono::Utc::now().to_rfc3339()
                }));
            }
            OutputMode::Plain => {
                println!("STAGE {}: {} - {}", stage_key(stage), status_label(status), message);
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &SweepError) {
        let user_message = error.user_message();
        self.error(&user_message);

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    println!();
                    if self.use_colors {
                        println!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        println!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => {
                    println!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    pub fn print_pipeline_report(&self, report: &PipelineReport) {
        match self.mode {
            OutputMode::Human => {
                if !self.quiet {
                    self.print_human_report(report);
                }
            }
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => self.print_plain_report(report),
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => {
                println!("=== {} ===", title);
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_human_report(&self, report: &PipelineReport) {
        println!();
        self.print_separator();

        let headline = if report.cancelled {
            "Forensic sweep cancelled"
        } else if report.has_failures() {
            "Forensic sweep finished with failures"
        } else {
            "Forensic sweep completed"
        };

        if self.use_colors {
            let styled = if report.cancelled || report.has_failures() {
                style(headline).yellow().bold()
            } else {
                style(headline).green().bold()
            };
            println!("{}", styled);
        } else {
            println!("{}", headline);
        }

        println!();
        println!("  Session:     {}", report.session_id);
        println!("  Session dir: {}", report.session_dir.display());
        println!("  Recovery:    {}", report.recovery_dir.display());
        println!();

        for stage in &report.stages {
            let label = status_label(stage.status);
            let label = if self.use_colors {
                match stage.status {
                    StageStatus::Completed => style(label).green().to_string(),
                    StageStatus::Failed => style(label).red().bold().to_string(),
                    StageStatus::Skipped => style(label).yellow().to_string(),
                    StageStatus::NoData => style(label).dim().to_string(),
                }
            } else {
                label.to_string()
            };

            println!(
                "  {:<30} {:<10} {:>6}  {}",
                stage.stage.title(),
                label,
                format_duration(stage.duration),
                stage.message
            );
        }

        println!();
        println!("  Total time: {}", format_duration(report.total_duration()));
        let failed = report.failed_stages();
        if !failed.is_empty() {
            let names: Vec<&str> = failed.iter().map(|s| s.title()).collect();
            println!("  Failed stages: {}", names.join(", "));
        }
        match &report.consolidated_report {
            Some(path) => println!("  Consolidated report: {}", path.display()),
            None => println!("  Consolidated report: none (no artifacts found)"),
        }

        self.print_separator();
    }

    fn print_plain_report(&self, report: &PipelineReport) {
        println!("SESSION: {}", report.session_id);
        println!("SESSION_DIR: {}", report.session_dir.display());
        println!("RECOVERY_DIR: {}", report.recovery_dir.display());
        for stage in &report.stages {
            println!(
                "{}: {} ({} items, {:?})",
                stage_key(stage.stage),
                status_label(stage.status),
                stage.items,
                stage.duration
            );
        }
        if let Some(ref path) = report.consolidated_report {
            println!("REPORT: {}", path.display());
        }
        if report.cancelled {
            println!("CANCELLED");
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

fn status_label(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Completed => "completed",
        StageStatus::Skipped => "skipped",
        StageStatus::Failed => "failed",
        StageStatus::NoData => "no data",
    }
}

fn stage_key(stage: Stage) -> &'static str {
    match stage {
        Stage::Recovery => "RECOVERY",
        Stage::Metadata => "METADATA",
        Stage::History => "HISTORY",
        Stage::Consolidation => "CONSOLIDATION",
    }
}
