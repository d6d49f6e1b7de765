//! Shared run state and the tracing-subscriber pieces reading it.
//!
//! The subscriber is built once per [`LogRegistry`](crate::LogRegistry); every
//! `initialize` call only swaps the [`RunState`] behind the lock:
//! - [`TemplateFormat`] renders records with the current template and offset;
//! - [`SinkWriter`] routes each record to the sinks whose threshold admits it;
//! - [`NamespaceFilter`] applies the global floor and per-namespace thresholds.

use std::{
    collections::BTreeMap,
    fmt,
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use time::UtcOffset;
use tracing::{Event, Level, Metadata, Subscriber, subscriber::Interest};
use tracing_log::NormalizeEvent;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{
        FmtContext, FormatEvent, FormatFields, MakeWriter,
        format::Writer,
        writer::{MakeWriterExt, OptionalWriter, Tee, WithMaxLevel},
    },
    layer::{Context, Filter},
    registry::LookupSpan,
};

use crate::logger::object::{Clock, LogTemplate, LoggerLevel, Segment, timestamp::write_timestamp};

/// Most permissive severity any record can reach a sink with.
pub(crate) const FLOOR: LevelFilter = LevelFilter::DEBUG;

/// Separator between a namespace and its children.
const NAMESPACE_SEPARATOR: &str = "::";

pub(crate) type SharedState = Arc<RwLock<RunState>>;

type Routed = WithMaxLevel<Sink>;
type RunWriter = Tee<OptionalWriter<Sink>, OptionalWriter<Sink>>;

/// Output destination shared by every writer made from it.
#[derive(Clone)]
pub(crate) struct Sink(Arc<Mutex<Box<dyn Write + Send>>>);

impl Sink {
    pub(crate) fn new(out: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(out))))
    }

    fn discard() -> Self {
        Self::new(io::sink())
    }

    /// Limits this sink to records at or above `threshold`.
    ///
    /// An `off` threshold routes to a discarding sink instead.
    fn route(self, threshold: LoggerLevel) -> Routed {
        match threshold.as_filter().into_level() {
            Some(level) => self.with_max_level(level),
            None => Self::discard().with_max_level(Level::ERROR),
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

impl<'a> MakeWriter<'a> for Sink {
    type Writer = Sink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// The file sink and the optional console sink of one run, each behind its
/// own threshold.
pub(crate) struct RunSinks {
    route: Tee<Routed, Routed>,
    attached: usize,
}

impl RunSinks {
    pub(crate) fn new(
        file: Sink,
        file_level: LoggerLevel,
        console: Option<(Sink, LoggerLevel)>,
    ) -> Self {
        let attached = 1 + usize::from(console.is_some());
        let (console, console_level) =
            console.unwrap_or_else(|| (Sink::discard(), LoggerLevel::OFF));
        Self {
            route: file.route(file_level).and(console.route(console_level)),
            attached,
        }
    }

    fn detached() -> Self {
        Self {
            route: Sink::discard()
                .route(LoggerLevel::OFF)
                .and(Sink::discard().route(LoggerLevel::OFF)),
            attached: 0,
        }
    }
}

/// Everything one run configures.
pub(crate) struct RunState {
    template: LogTemplate,
    offset: UtcOffset,
    sinks: RunSinks,
    namespaces: BTreeMap<String, LoggerLevel>,
}

impl RunState {
    pub(crate) fn new() -> Self {
        Self {
            template: LogTemplate::default(),
            offset: UtcOffset::UTC,
            sinks: RunSinks::detached(),
            namespaces: BTreeMap::new(),
        }
    }

    pub(crate) fn shared() -> SharedState {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Drops every attached sink and installs the new run.
    ///
    /// Namespace thresholds accumulate: entries from earlier runs stay unless
    /// `namespaces` names them again.
    pub(crate) fn replace_run(
        &mut self,
        template: LogTemplate,
        offset: UtcOffset,
        sinks: RunSinks,
        namespaces: &BTreeMap<String, LoggerLevel>,
    ) {
        self.template = template;
        self.offset = offset;
        self.sinks = sinks;
        self.namespaces
            .extend(namespaces.iter().map(|(name, level)| (name.clone(), *level)));
    }

    pub(crate) fn sink_count(&self) -> usize {
        self.sinks.attached
    }

    pub(crate) fn namespace_threshold(&self, namespace: &str) -> Option<LoggerLevel> {
        self.namespaces.get(namespace).copied()
    }

    /// Effective threshold for `target`: the longest namespace covering it,
    /// never more permissive than [`FLOOR`].
    pub(crate) fn threshold_for(&self, target: &str) -> LevelFilter {
        self.namespaces
            .iter()
            .filter(|(namespace, _)| covers(namespace, target))
            .max_by_key(|(namespace, _)| namespace.len())
            .map_or(FLOOR, |(_, level)| level.as_filter().min(FLOOR))
    }
}

/// `target` is `namespace` itself or one of its `::` children.
fn covers(namespace: &str, target: &str) -> bool {
    target
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(NAMESPACE_SEPARATOR))
}

pub(crate) fn read(state: &SharedState) -> RwLockReadGuard<'_, RunState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write(state: &SharedState) -> RwLockWriteGuard<'_, RunState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

/// Event formatter driven by the current [`LogTemplate`].
pub(crate) struct TemplateFormat {
    state: SharedState,
    clock: Arc<dyn Clock>,
}

impl TemplateFormat {
    pub(crate) fn new(state: SharedState, clock: Arc<dyn Clock>) -> Self {
        Self { state, clock }
    }
}

impl<S, N> FormatEvent<S, N> for TemplateFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let (template, offset) = {
            let state = read(&self.state);
            (state.template.clone(), state.offset)
        };
        let normalized = event.normalized_metadata();
        let meta = normalized.as_ref().unwrap_or_else(|| event.metadata());

        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => writer.write_str(text)?,
                Segment::Timestamp => write_timestamp(&mut writer, self.clock.now(), offset)?,
                Segment::Level => write!(writer, "{}", meta.level())?,
                Segment::Message => ctx.field_format().format_fields(writer.by_ref(), event)?,
                Segment::Target => writer.write_str(meta.target())?,
                Segment::File => writer.write_str(meta.file().unwrap_or_default())?,
                Segment::Line => {
                    if let Some(line) = meta.line() {
                        write!(writer, "{line}")?;
                    }
                }
            }
        }
        writeln!(writer)
    }
}

/// `MakeWriter` resolving the sinks of the current run.
pub(crate) struct SinkWriter {
    state: SharedState,
}

impl SinkWriter {
    pub(crate) fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl<'a> MakeWriter<'a> for SinkWriter {
    type Writer = RunWriter;

    fn make_writer(&'a self) -> Self::Writer {
        read(&self.state).sinks.route.make_writer()
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        read(&self.state).sinks.route.make_writer_for(meta)
    }
}

/// Per-layer filter applying the floor and namespace thresholds.
///
/// Interest is never cached, so thresholds installed by a later run apply to
/// callsites that were already registered.
pub(crate) struct NamespaceFilter {
    state: SharedState,
}

impl NamespaceFilter {
    pub(crate) fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl<S> Filter<S> for NamespaceFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        read(&self.state).threshold_for(meta.target()) >= *meta.level()
    }

    fn callsite_enabled(&self, _meta: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        Some(FLOOR)
    }
}
