use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::logger::error::ConfigError;

/// One piece of a parsed [`LogTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim.
    Literal(String),
    /// `{timestamp}`: `YYYY-MM-DD HH:MM:SS,mmm`.
    Timestamp,
    /// `{level}`: `TRACE`, `DEBUG`, `INFO`, `WARN` or `ERROR`.
    Level,
    /// `{message}`: event message followed by its fields.
    Message,
    /// `{target}`: the record's namespace.
    Target,
    /// `{file}`: source file, empty if unknown.
    File,
    /// `{line}`: source line, empty if unknown.
    Line,
}

impl Segment {
    fn placeholder(name: &str) -> Option<Self> {
        let seg = match name {
            "timestamp" => Self::Timestamp,
            "level" => Self::Level,
            "message" => Self::Message,
            "target" => Self::Target,
            "file" => Self::File,
            "line" => Self::Line,
            _ => return None,
        };
        Some(seg)
    }
}

/// Rendering template shared by every sink.
///
/// Placeholders are written in braces (`{level}`); `{{` and `}}` produce
/// literal braces.
///
/// # Examples
/// ```
/// use runlog_observe::LogTemplate;
///
/// let tpl: LogTemplate = "[{level}] {message}".parse().unwrap();
/// assert_eq!(tpl.as_str(), "[{level}] {message}");
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct LogTemplate {
    raw: String,
    segments: Arc<[Segment]>,
}

impl LogTemplate {
    /// `{timestamp} - {level} - {message}`.
    pub const DEFAULT: &'static str = "{timestamp} - {level} - {message}";

    pub fn new(s: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = s.into();
        let segments = parse(&raw).map_err(|reason| ConfigError::InvalidTemplate {
            template: raw.clone(),
            reason,
        })?;
        Ok(Self {
            raw,
            segments: segments.into(),
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

fn parse(raw: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = raw.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|(_, n)| *n) == Some('{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek().map(|(_, n)| *n) == Some('}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(format!("unclosed placeholder at byte {pos}"));
                }
                let seg = Segment::placeholder(name.trim())
                    .ok_or_else(|| format!("unknown placeholder {{{name}}}"))?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(seg);
            }
            '}' => return Err(format!("unmatched '}}' at byte {pos}")),
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

impl Default for LogTemplate {
    fn default() -> Self {
        match Self::new(Self::DEFAULT) {
            Ok(tpl) => tpl,
            Err(e) => unreachable!("default template must parse: {e}"),
        }
    }
}

impl fmt::Debug for LogTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LogTemplate").field(&self.raw).finish()
    }
}

impl fmt::Display for LogTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for LogTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for LogTemplate {}

impl FromStr for LogTemplate {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LogTemplate {
    type Error = ConfigError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<LogTemplate> for String {
    fn from(t: LogTemplate) -> Self {
        t.raw
    }
}
