use std::{
    fmt, fs,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::Dispatch;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{Layer, fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::logger::{
    config::{LoggerOverrides, RunLoggerConfig},
    error::{LoggerError, LoggerResult},
    object::{Clock, LoggerLevel, SystemClock},
    sink::{
        self, NamespaceFilter, RunSinks, RunState, SharedState, Sink, SinkWriter, TemplateFormat,
    },
    tasks::retention::{AgeRetention, RetentionCleaner},
};

type ConsoleFactory = Arc<dyn Fn() -> Box<dyn Write + Send> + Send + Sync>;

/// What one successful [`LogRegistry::initialize`] call configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRunInfo {
    /// Absolute path of the file sink.
    pub log_file: PathBuf,
    /// Absolute path of the directory holding `log_file`.
    pub log_dir: PathBuf,
    /// Fully merged configuration.
    pub config: RunLoggerConfig,
    /// Instant the paths were derived from, in the configured offset.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

/// Process logging context.
///
/// Owns a single tracing [`Dispatch`] whose sinks, template and namespace
/// thresholds are replaced by every [`initialize`](Self::initialize) call.
/// Use [`install_global`](Self::install_global) to make it the process-wide
/// default, or [`in_scope`](Self::in_scope) to route records through it
/// temporarily.
pub struct LogRegistry {
    state: SharedState,
    dispatch: Dispatch,
    clock: Arc<dyn Clock>,
    cleaner: Box<dyn RetentionCleaner>,
    console: ConsoleFactory,
}

impl LogRegistry {
    /// Registry with the system clock, 16-day retention and stderr console.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> LogRegistryBuilder {
        LogRegistryBuilder::default()
    }

    /// Merges `overrides` over the defaults and attaches the run's sinks.
    ///
    /// Retention cleanup runs first, even if the configuration turns out to
    /// be invalid. On error the sinks of the previous run stay attached.
    pub fn initialize(&self, overrides: &LoggerOverrides) -> LoggerResult<ResolvedRunInfo> {
        let defaults = RunLoggerConfig::default();
        let root = overrides
            .log_path
            .clone()
            .unwrap_or_else(|| defaults.log_path.clone());
        let report = self.cleaner.clean(&root);

        match self.configure(defaults.merge(overrides)) {
            Ok(info) => {
                self.in_scope(|| report.log());
                Ok(info)
            }
            Err(e) => {
                report.log();
                Err(e)
            }
        }
    }

    fn configure(&self, cfg: RunLoggerConfig) -> LoggerResult<ResolvedRunInfo> {
        cfg.validate()?;

        let offset = cfg.tz.offset();
        let started_at = self.clock.now().to_offset(offset);
        let date = cfg.date_format.render(started_at)?;
        let hour = cfg.time_format.render(started_at)?;
        let stem = cfg.file_format.render(started_at)?;

        fs::create_dir_all(&cfg.log_path)?;
        let log_dir =
            std::path::absolute(cfg.log_path.join(&cfg.script_name).join(date).join(hour))?;
        fs::create_dir_all(&log_dir)?;

        let log_file = log_dir.join(format!("{stem}.log"));
        let file = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(&stem)
            .filename_suffix("log")
            .build(&log_dir)?;

        let console = cfg
            .console_enabled
            .then(|| (Sink::new((self.console)()), cfg.console_level));
        let sinks = RunSinks::new(Sink::new(file), cfg.file_level, console);

        sink::write(&self.state).replace_run(
            cfg.formatter.clone(),
            offset,
            sinks,
            &cfg.disabled_loggers,
        );

        Ok(ResolvedRunInfo {
            log_file,
            log_dir,
            config: cfg,
            started_at,
        })
    }

    /// Installs this registry as the global default subscriber and bridges
    /// `log` records into it. Succeeds at most once per process.
    pub fn install_global(&self) -> LoggerResult<()> {
        self.dispatch
            .clone()
            .try_init()
            .map_err(|_| LoggerError::AlreadyInitialized)
    }

    /// Runs `f` with this registry as the thread's default subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    #[inline]
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Number of sinks attached by the latest successful run.
    pub fn attached_sinks(&self) -> usize {
        sink::read(&self.state).sink_count()
    }

    /// Threshold currently applied to `namespace`, if any run set one.
    pub fn namespace_threshold(&self, namespace: &str) -> Option<LoggerLevel> {
        sink::read(&self.state).namespace_threshold(namespace)
    }
}

impl Default for LogRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRegistry")
            .field("attached_sinks", &self.attached_sinks())
            .finish_non_exhaustive()
    }
}

/// Builder for [`LogRegistry`].
#[derive(Default)]
pub struct LogRegistryBuilder {
    clock: Option<Arc<dyn Clock>>,
    cleaner: Option<Box<dyn RetentionCleaner>>,
    console: Option<ConsoleFactory>,
}

impl LogRegistryBuilder {
    /// Time source for log paths and timestamps.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Cleanup policy run before every initialization.
    pub fn retention(mut self, cleaner: impl RetentionCleaner + 'static) -> Self {
        self.cleaner = Some(Box::new(cleaner));
        self
    }

    /// Writer factory for the console sink, called once per run.
    pub fn console_writer<F>(mut self, make: F) -> Self
    where
        F: Fn() -> Box<dyn Write + Send> + Send + Sync + 'static,
    {
        self.console = Some(Arc::new(make));
        self
    }

    pub fn build(self) -> LogRegistry {
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let state = RunState::shared();

        let layer = tfmt::layer()
            .with_ansi(false)
            .event_format(TemplateFormat::new(Arc::clone(&state), Arc::clone(&clock)))
            .with_writer(SinkWriter::new(Arc::clone(&state)))
            .with_filter(NamespaceFilter::new(Arc::clone(&state)));
        let dispatch = Dispatch::new(tracing_subscriber::registry().with(layer));

        LogRegistry {
            state,
            dispatch,
            clock,
            cleaner: self
                .cleaner
                .unwrap_or_else(|| Box::new(AgeRetention::default())),
            console: self
                .console
                .unwrap_or_else(|| Arc::new(|| Box::new(io::stderr()) as Box<dyn Write + Send>)),
        }
    }
}
