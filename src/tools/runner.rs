use crate::error::{Result, SweepError};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of one finished tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn describe_exit(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external tools to completion, one at a time, capturing all output.
pub struct ToolRunner {
    timeout: Option<Duration>,
}

impl ToolRunner {
    pub fn new() -> Self {
        Self {
            timeout: Some(Duration::from_secs(3600)),
        }
    }

    /// `None` or a zero duration waits indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn run<I, S>(&self, program: &Path, args: I) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let tool = tool_label(program);
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        debug!(tool = %tool, ?args, "invoking external tool");

        let mut command = Command::new(program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start_time = Instant::now();
        let pending = command.output();

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(output) => output,
                Err(_) => {
                    warn!(tool = %tool, seconds = limit.as_secs(), "tool timed out and was killed");
                    return Err(SweepError::Timeout {
                        tool,
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => pending.await,
        }
        .map_err(|source| SweepError::ToolLaunch {
            tool: tool.clone(),
            source,
        })?;

        let result = ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: start_time.elapsed(),
        };

        debug!(
            tool = %tool,
            exit = ?result.exit_code,
            stdout_bytes = result.stdout.len(),
            stderr_bytes = result.stderr.len(),
            "tool finished"
        );

        Ok(result)
    }
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn tool_label(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}
