use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::OwnedFormatItem};

use crate::logger::error::ConfigError;

/// Date/time pattern used to derive one segment of the log path.
///
/// Uses the `time` crate format description syntax, e.g. `[year][month][day]`
/// or `[minute][second]`. The pattern is validated on construction, so
/// rendering can only fail for patterns that need components an
/// `OffsetDateTime` does not carry.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct PathFormat {
    raw: String,
    items: OwnedFormatItem,
}

impl PathFormat {
    /// `YYYYMMDD`, the calendar date directory.
    pub const DATE: &'static str = "[year][month][day]";
    /// `HH`, the hour directory.
    pub const HOUR: &'static str = "[hour]";
    /// `mmss`, the file stem.
    pub const MINUTE_SECOND: &'static str = "[minute][second]";

    pub fn new(s: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = s.into();
        let items = time::format_description::parse_owned::<2>(&raw).map_err(|e| {
            ConfigError::InvalidPathFormat {
                format: raw.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { raw, items })
    }

    /// Returns the pattern as written.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Renders `at` with this pattern.
    pub fn render(&self, at: OffsetDateTime) -> Result<String, ConfigError> {
        at.format(&self.items)
            .map_err(|e| ConfigError::InvalidPathFormat {
                format: self.raw.clone(),
                reason: e.to_string(),
            })
    }

    pub(crate) fn builtin(raw: &'static str) -> Self {
        match Self::new(raw) {
            Ok(fmt) => fmt,
            Err(e) => unreachable!("built-in path format must parse: {e}"),
        }
    }
}

impl fmt::Debug for PathFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathFormat").field(&self.raw).finish()
    }
}

impl fmt::Display for PathFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for PathFormat {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PathFormat {}

impl FromStr for PathFormat {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PathFormat {
    type Error = ConfigError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PathFormat> for String {
    fn from(p: PathFormat) -> Self {
        p.raw
    }
}
