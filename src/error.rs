use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("Failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {seconds} seconds")]
    Timeout { tool: String, seconds: u64 },

    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table processing failed for {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for SweepError {
    fn user_message(&self) -> String {
        match self {
            SweepError::Config { message } => format!("Configuration error: {}", message),
            SweepError::InvalidPath { path } => format!("Invalid path: {}", path),
            SweepError::ToolLaunch { tool, source } => {
                format!("Could not start {}: {}", tool, source)
            }
            SweepError::Timeout { tool, seconds } => {
                format!("{} did not finish within {} seconds", tool, seconds)
            }
            SweepError::Csv { path, .. } => {
                format!("Could not process table {}", path.display())
            }
            SweepError::Cancelled => "Operation was cancelled by user".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            SweepError::Config { .. } => Some(
                "Check your configuration file syntax or regenerate one with --generate-config.".to_string()
            ),
            SweepError::InvalidPath { .. } | SweepError::Io(_) => Some(
                "Ensure the output and recovery directories are writable and on an available volume.".to_string()
            ),
            SweepError::ToolLaunch { .. } => Some(
                "Verify the tool directories in your configuration and that the executables run on this host.".to_string()
            ),
            SweepError::Timeout { .. } => Some(
                "Increase the per-invocation limit with --timeout, or pass --timeout 0 to wait indefinitely.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for SweepError {
    fn from(error: toml::de::Error) -> Self {
        SweepError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
