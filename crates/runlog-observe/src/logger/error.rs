use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to open log file: {0}")]
    LogFile(#[from] tracing_appender::rolling::InitError),

    #[error("Logger already initialized")]
    AlreadyInitialized,
}

/// Rejected configuration value. Always names the offending option.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("script_name is required and must not be empty")]
    MissingScriptName,

    #[error("invalid script_name {0:?}: must be a single path segment")]
    InvalidScriptName(String),

    #[error("Invalid log level: {0} (expected: trace|debug|info|warn|error|off)")]
    InvalidLevel(String),

    #[error("Invalid timezone: {0} (expected: utc|local)")]
    InvalidTimeZone(String),

    #[error("invalid path format {format:?}: {reason}")]
    InvalidPathFormat { format: String, reason: String },

    #[error("invalid formatter template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("unsupported encoding: {0} (expected: utf-8)")]
    UnsupportedEncoding(String),
}

impl LoggerError {
    /// Returns `true` for errors caused by the supplied configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, LoggerError::Config(_))
    }
}

pub type LoggerResult<T> = Result<T, LoggerError>;
