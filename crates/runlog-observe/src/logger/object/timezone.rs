use std::{fmt, str::FromStr, sync::{OnceLock, RwLock}};

use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::logger::error::ConfigError;

/// Global cache for the local UTC offset.
///
/// Written by `init_local_offset()` and by the first lazy detection.
static LOCAL_OFFSET: RwLock<UtcOffset> = RwLock::new(UtcOffset::UTC);

/// Tracks whether local offset detection has been attempted.
static INIT_DONE: OnceLock<()> = OnceLock::new();

/// Timezone used for log directory segments and record timestamps.
///
/// - `Local`: system timezone (default, falls back to UTC if undetectable)
/// - `Utc`: all times in UTC
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoggerTimeZone {
    /// UTC timezone.
    Utc,
    /// Local system timezone.
    Local,
}

impl LoggerTimeZone {
    /// Resolves the offset this timezone stands for right now.
    pub fn offset(&self) -> UtcOffset {
        match self {
            LoggerTimeZone::Utc => UtcOffset::UTC,
            LoggerTimeZone::Local => get_or_detect_local_offset(),
        }
    }
}

impl Default for LoggerTimeZone {
    fn default() -> Self {
        Self::Local
    }
}

impl FromStr for LoggerTimeZone {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalize = s.trim().to_ascii_lowercase();

        match normalize.as_str() {
            "utc" => Ok(Self::Utc),
            "local" => Ok(Self::Local),
            _ => Err(ConfigError::InvalidTimeZone(s.to_string())),
        }
    }
}

impl fmt::Display for LoggerTimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoggerTimeZone::Utc => "utc",
            LoggerTimeZone::Local => "local",
        };
        f.write_str(s)
    }
}

/// Initializes local timezone offset early in the program.
///
/// **CRITICAL**: Call in `main()` **before spawning any threads**.
/// Timezone detection fails in multi-thread contexts on most Unix platforms.
///
/// Falls back to UTC silently if detection fails.
///
/// # Example
/// ```no_run
/// use runlog_observe::{LoggerOverrides, init_local_offset, init_run_logger};
///
/// fn main() {
///     init_local_offset();
///     let (_registry, info) = init_run_logger(&LoggerOverrides::new("svc")).unwrap();
///     println!("{}", info.log_file.display());
/// }
/// ```
pub fn init_local_offset() {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    if let Ok(mut guard) = LOCAL_OFFSET.write() {
        *guard = offset;
    }
    let _ = INIT_DONE.set(());
}

/// Returns the cached local offset, detecting it on first use.
pub(crate) fn get_or_detect_local_offset() -> UtcOffset {
    INIT_DONE.get_or_init(|| {
        match UtcOffset::current_local_offset() {
            Ok(detected) => {
                if let Ok(mut guard) = LOCAL_OFFSET.write() {
                    *guard = detected;
                }
            }
            Err(_) => {
                eprintln!("WARNING: runlog-observe local timezone detection failed. \
                          Call init_local_offset() in main() before spawning threads. \
                          Falling back to UTC.");
            }
        }
    });

    LOCAL_OFFSET.read()
        .map(|guard| *guard)
        .unwrap_or(UtcOffset::UTC)
}
