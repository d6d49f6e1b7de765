use std::{convert::TryFrom, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;

use crate::logger::error::ConfigError;

/// Severity threshold for a sink or a namespace.
///
/// Wraps a `tracing_subscriber::filter::LevelFilter` and accepts the usual
/// level names plus a few aliases found in other logging stacks:
/// - `warning` for `warn`;
/// - `critical` and `fatal` for `error`.
///
/// Serialized as the canonical lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct LoggerLevel(LevelFilter);

impl LoggerLevel {
    pub const TRACE: LoggerLevel = LoggerLevel(LevelFilter::TRACE);
    pub const DEBUG: LoggerLevel = LoggerLevel(LevelFilter::DEBUG);
    pub const INFO: LoggerLevel = LoggerLevel(LevelFilter::INFO);
    pub const WARN: LoggerLevel = LoggerLevel(LevelFilter::WARN);
    pub const ERROR: LoggerLevel = LoggerLevel(LevelFilter::ERROR);
    pub const OFF: LoggerLevel = LoggerLevel(LevelFilter::OFF);

    /// Parses a level name.
    ///
    /// # Examples
    /// ```
    /// use runlog_observe::LoggerLevel;
    ///
    /// let lvl = LoggerLevel::new("warning").unwrap();
    /// assert_eq!(lvl, LoggerLevel::WARN);
    /// ```
    pub fn new(s: impl AsRef<str>) -> Result<Self, ConfigError> {
        s.as_ref().parse()
    }

    /// Returns the underlying filter.
    #[inline]
    pub fn as_filter(&self) -> LevelFilter {
        self.0
    }

    /// Returns `true` if a record at `level` passes this threshold.
    #[inline]
    pub fn admits(&self, level: &Level) -> bool {
        self.0 >= *level
    }
}

impl Default for LoggerLevel {
    fn default() -> Self {
        Self::INFO
    }
}

impl From<LevelFilter> for LoggerLevel {
    fn from(filter: LevelFilter) -> Self {
        Self(filter)
    }
}

impl From<Level> for LoggerLevel {
    fn from(level: Level) -> Self {
        Self(LevelFilter::from_level(level))
    }
}

impl FromStr for LoggerLevel {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        let filter = match norm.as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" | "warning" => LevelFilter::WARN,
            "error" | "critical" | "fatal" => LevelFilter::ERROR,
            "off" => LevelFilter::OFF,
            _ => return Err(ConfigError::InvalidLevel(s.to_string())),
        };
        Ok(Self(filter))
    }
}

impl TryFrom<String> for LoggerLevel {
    type Error = ConfigError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LoggerLevel> for String {
    fn from(l: LoggerLevel) -> Self {
        l.to_string()
    }
}

impl fmt::Display for LoggerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self.0.into_level() {
            Some(Level::TRACE) => "trace",
            Some(Level::DEBUG) => "debug",
            Some(Level::INFO) => "info",
            Some(Level::WARN) => "warn",
            Some(Level::ERROR) => "error",
            None => "off",
        };
        f.write_str(s)
    }
}
