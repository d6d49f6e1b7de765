use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::logger::{
    error::ConfigError,
    object::{LogTemplate, LoggerLevel, LoggerTimeZone, PathFormat},
};

/// Environment variable holding the default log root.
pub const LOG_PATH_ENV: &str = "LOG_PATH";

/// Log root used when neither the caller nor `LOG_PATH` supplies one.
pub const DEFAULT_LOG_PATH: &str = "logs";

/// Namespaces suppressed below `warn` unless the caller supplies its own map.
pub const DEFAULT_DISABLED_LOGGERS: &[&str] =
    &["hyper", "h2", "reqwest", "rustls", "mio", "want", "tokio_util"];

/// Fully merged logger configuration for one run.
///
/// Built by [`RunLoggerConfig::merge`] from the documented defaults and a set of
/// [`LoggerOverrides`]; this is what ends up in `ResolvedRunInfo::config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLoggerConfig {
    /// Logical process name, used as a path segment. Required.
    pub script_name: String,
    /// Whether the console sink is attached.
    pub console_enabled: bool,
    /// Root directory for all log output.
    pub log_path: PathBuf,
    /// Directory segment for the calendar date.
    pub date_format: PathFormat,
    /// Directory segment for the hour.
    pub time_format: PathFormat,
    /// File stem.
    pub file_format: PathFormat,
    /// File sink encoding.
    pub encoding: String,
    /// Template shared by both sinks.
    pub formatter: LogTemplate,
    /// Minimum severity written to the file.
    pub file_level: LoggerLevel,
    /// Minimum severity written to the console.
    pub console_level: LoggerLevel,
    /// Per-namespace minimum severity, applied to every sink.
    pub disabled_loggers: BTreeMap<String, LoggerLevel>,
    /// Offset used for path segments and timestamps.
    pub tz: LoggerTimeZone,
}

impl Default for RunLoggerConfig {
    fn default() -> Self {
        Self::with_log_path(default_log_path(std::env::var(LOG_PATH_ENV).ok()))
    }
}

impl RunLoggerConfig {
    /// Documented defaults with an explicit log root instead of `LOG_PATH`.
    pub fn with_log_path(log_path: impl Into<PathBuf>) -> Self {
        Self {
            script_name: String::new(),
            console_enabled: true,
            log_path: log_path.into(),
            date_format: PathFormat::builtin(PathFormat::DATE),
            time_format: PathFormat::builtin(PathFormat::HOUR),
            file_format: PathFormat::builtin(PathFormat::MINUTE_SECOND),
            encoding: "utf-8".to_string(),
            formatter: LogTemplate::default(),
            file_level: LoggerLevel::DEBUG,
            console_level: LoggerLevel::INFO,
            disabled_loggers: DEFAULT_DISABLED_LOGGERS
                .iter()
                .map(|name| (name.to_string(), LoggerLevel::WARN))
                .collect(),
            tz: LoggerTimeZone::default(),
        }
    }

    /// Shallow merge: every option present in `overrides` replaces the
    /// current value. `disabled_loggers` is replaced as a whole, not extended.
    pub fn merge(mut self, overrides: &LoggerOverrides) -> Self {
        let o = overrides.clone();
        if let Some(v) = o.script_name {
            self.script_name = v;
        }
        if let Some(v) = o.console_enabled {
            self.console_enabled = v;
        }
        if let Some(v) = o.log_path {
            self.log_path = v;
        }
        if let Some(v) = o.date_format {
            self.date_format = v;
        }
        if let Some(v) = o.time_format {
            self.time_format = v;
        }
        if let Some(v) = o.file_format {
            self.file_format = v;
        }
        if let Some(v) = o.encoding {
            self.encoding = v;
        }
        if let Some(v) = o.formatter {
            self.formatter = v;
        }
        if let Some(v) = o.file_level {
            self.file_level = v;
        }
        if let Some(v) = o.console_level {
            self.console_level = v;
        }
        if let Some(v) = o.disabled_loggers {
            self.disabled_loggers = v;
        }
        if let Some(v) = o.tz {
            self.tz = v;
        }
        self
    }

    /// Checks the options that cannot be validated while parsing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.script_name.trim();
        if name.is_empty() {
            return Err(ConfigError::MissingScriptName);
        }
        if name != self.script_name
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(ConfigError::InvalidScriptName(self.script_name.clone()));
        }

        let enc = self.encoding.trim().to_ascii_lowercase();
        if !matches!(enc.as_str(), "utf-8" | "utf8") {
            return Err(ConfigError::UnsupportedEncoding(self.encoding.clone()));
        }
        Ok(())
    }
}

/// Resolves the default log root from the value of `LOG_PATH`, if any.
pub fn default_log_path(env_value: Option<String>) -> PathBuf {
    match env_value {
        Some(v) if !v.trim().is_empty() => PathBuf::from(v),
        _ => PathBuf::from(DEFAULT_LOG_PATH),
    }
}

/// Caller-supplied options. Anything left `None` keeps its default.
///
/// # Examples
/// ```rust
/// use runlog_observe::{LoggerLevel, LoggerOverrides};
///
/// let overrides = LoggerOverrides::new("svc")
///     .with_console_enabled(false)
///     .with_file_level(LoggerLevel::INFO);
/// assert_eq!(overrides.script_name.as_deref(), Some("svc"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerOverrides {
    pub script_name: Option<String>,
    pub console_enabled: Option<bool>,
    pub log_path: Option<PathBuf>,
    pub date_format: Option<PathFormat>,
    pub time_format: Option<PathFormat>,
    pub file_format: Option<PathFormat>,
    pub encoding: Option<String>,
    pub formatter: Option<LogTemplate>,
    pub file_level: Option<LoggerLevel>,
    pub console_level: Option<LoggerLevel>,
    pub disabled_loggers: Option<BTreeMap<String, LoggerLevel>>,
    pub tz: Option<LoggerTimeZone>,
}

impl LoggerOverrides {
    /// Overrides carrying only the required `script_name`.
    pub fn new(script_name: impl Into<String>) -> Self {
        Self {
            script_name: Some(script_name.into()),
            ..Default::default()
        }
    }

    pub fn with_console_enabled(mut self, enabled: bool) -> Self {
        self.console_enabled = Some(enabled);
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn with_date_format(mut self, fmt: PathFormat) -> Self {
        self.date_format = Some(fmt);
        self
    }

    pub fn with_time_format(mut self, fmt: PathFormat) -> Self {
        self.time_format = Some(fmt);
        self
    }

    pub fn with_file_format(mut self, fmt: PathFormat) -> Self {
        self.file_format = Some(fmt);
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_formatter(mut self, template: LogTemplate) -> Self {
        self.formatter = Some(template);
        self
    }

    pub fn with_file_level(mut self, level: LoggerLevel) -> Self {
        self.file_level = Some(level);
        self
    }

    pub fn with_console_level(mut self, level: LoggerLevel) -> Self {
        self.console_level = Some(level);
        self
    }

    pub fn with_disabled_loggers<I, K>(mut self, loggers: I) -> Self
    where
        I: IntoIterator<Item = (K, LoggerLevel)>,
        K: Into<String>,
    {
        self.disabled_loggers = Some(loggers.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    pub fn with_tz(mut self, tz: LoggerTimeZone) -> Self {
        self.tz = Some(tz);
        self
    }
}
