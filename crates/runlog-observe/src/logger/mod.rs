mod config;
mod error;
mod object;
mod registry;
mod sink;
mod tasks;

use std::sync::OnceLock;

pub use config::{
    DEFAULT_DISABLED_LOGGERS, DEFAULT_LOG_PATH, LOG_PATH_ENV, LoggerOverrides, RunLoggerConfig,
    default_log_path,
};
pub use error::{ConfigError, LoggerError, LoggerResult};
pub use object::{
    Clock, FixedClock, LogTemplate, LoggerLevel, LoggerTimeZone, PathFormat, Segment, SystemClock,
    init_local_offset,
};
pub use registry::{LogRegistry, LogRegistryBuilder, ResolvedRunInfo};
pub use tasks::retention::{
    AgeRetention, CleanupReport, DEFAULT_RETENTION, NoRetention, RetentionCleaner, RetentionError,
};

static GLOBAL: OnceLock<LogRegistry> = OnceLock::new();

/// Initializes the process-wide logger for one run.
///
/// The first call builds a default [`LogRegistry`] and installs it as the
/// global tracing subscriber; every call then runs
/// [`LogRegistry::initialize`], replacing the sinks of the previous run.
/// Once initialized, all `tracing` macros (`info!`, `debug!`, etc.) and `log`
/// records go to the run's sinks.
///
/// Calls must not race each other.
///
/// # Examples
/// ```no_run
/// use runlog_observe::{LoggerOverrides, init_run_logger};
///
/// fn main() {
///     let overrides = LoggerOverrides::new("svc").with_console_enabled(false);
///     let (_registry, run) = init_run_logger(&overrides).expect("Failed to initialize logger");
///
///     tracing::info!(log_file = %run.log_file.display(), "Logger initialized successfully");
/// }
/// ```
pub fn init_run_logger(
    overrides: &LoggerOverrides,
) -> LoggerResult<(&'static LogRegistry, ResolvedRunInfo)> {
    let registry = match GLOBAL.get() {
        Some(registry) => registry,
        None => {
            let registry = LogRegistry::new();
            registry.install_global()?;
            GLOBAL.get_or_init(|| registry)
        }
    };
    let run = registry.initialize(overrides)?;
    Ok((registry, run))
}
