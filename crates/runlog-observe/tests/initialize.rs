use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use filetime::FileTime;
use runlog_observe::{
    AgeRetention, CleanupReport, FixedClock, LogRegistry, LogTemplate, LoggerError, LoggerLevel,
    LoggerOverrides, LoggerTimeZone, NoRetention, RetentionCleaner, RunLoggerConfig,
};
use tempfile::TempDir;
use time::{OffsetDateTime, macros::datetime};
use tracing::{debug, error, info, trace, warn};

const AT: OffsetDateTime = datetime!(2024-03-05 14:22:07 UTC);

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

/// Records every root it was asked to clean.
#[derive(Clone, Default)]
struct RecordingCleaner(Arc<Mutex<Vec<PathBuf>>>);

impl RetentionCleaner for RecordingCleaner {
    fn clean(&self, root: &Path) -> CleanupReport {
        self.0.lock().unwrap().push(root.to_path_buf());
        CleanupReport::default()
    }
}

fn registry() -> LogRegistry {
    LogRegistry::builder()
        .clock(FixedClock(AT))
        .retention(NoRetention)
        .build()
}

fn overrides(root: &Path) -> LoggerOverrides {
    LoggerOverrides::new("svc")
        .with_log_path(root)
        .with_console_enabled(false)
        .with_tz(LoggerTimeZone::Utc)
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn produces_dated_layout() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();

    let run = registry.initialize(&overrides(tmp.path())).unwrap();

    let root = std::path::absolute(tmp.path()).unwrap();
    assert_eq!(run.log_dir, root.join("svc").join("20240305").join("14"));
    assert_eq!(run.log_file, run.log_dir.join("2207.log"));
    assert!(run.log_dir.is_dir());
    assert!(run.log_file.is_file());
    assert!(run.log_file.is_absolute());
    assert_eq!(run.started_at, AT);
    assert_eq!(registry.attached_sinks(), 1);
}

#[test]
fn relative_log_path_is_resolved_to_absolute() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    let nested = tmp.path().join("a").join("..").join("b");

    let run = registry.initialize(&overrides(&nested)).unwrap();

    assert!(run.log_dir.is_absolute());
    assert!(run.log_file.starts_with(&run.log_dir));
    assert!(run.log_file.is_file());
}

#[test]
fn renders_records_with_default_template() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    let run = registry.initialize(&overrides(tmp.path())).unwrap();

    registry.in_scope(|| {
        debug!("debug line");
        info!("info line");
        warn!(attempt = 3, "warn line");
        trace!("never written");
    });

    let lines: Vec<String> = read(&run.log_file).lines().map(str::to_owned).collect();
    assert_eq!(
        lines,
        vec![
            "2024-03-05 14:22:07,000 - DEBUG - debug line",
            "2024-03-05 14:22:07,000 - INFO - info line",
            "2024-03-05 14:22:07,000 - WARN - warn line attempt=3",
        ]
    );
}

#[test]
fn custom_template_and_file_level() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    let overrides = overrides(tmp.path())
        .with_formatter(LogTemplate::new("[{level}] {target}: {message}").unwrap())
        .with_file_level(LoggerLevel::WARN);
    let run = registry.initialize(&overrides).unwrap();

    registry.in_scope(|| {
        info!(target: "app", "dropped");
        error!(target: "app", "kept");
    });

    assert_eq!(read(&run.log_file), "[ERROR] app: kept\n");
}

#[test]
fn missing_script_name_fails_without_side_effects() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();

    for bad in [
        LoggerOverrides::default().with_log_path(tmp.path()),
        LoggerOverrides::new("").with_log_path(tmp.path()),
    ] {
        let err = registry.initialize(&bad).unwrap_err();
        assert!(err.is_config(), "expected configuration error, got {err:?}");
        assert!(err.to_string().contains("script_name"));
    }

    assert_eq!(registry.attached_sinks(), 0);
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn cleanup_runs_even_when_validation_fails() {
    let tmp = TempDir::new().unwrap();
    let cleaner = RecordingCleaner::default();
    let registry = LogRegistry::builder()
        .clock(FixedClock(AT))
        .retention(cleaner.clone())
        .build();

    let _ = registry.initialize(&LoggerOverrides::default().with_log_path(tmp.path()));
    registry.initialize(&overrides(tmp.path())).unwrap();

    let roots = cleaner.0.lock().unwrap().clone();
    assert_eq!(roots, vec![tmp.path().to_path_buf(), tmp.path().to_path_buf()]);
}

#[test]
fn cleanup_uses_default_root_when_log_path_is_absent() {
    let cleaner = RecordingCleaner::default();
    let registry = LogRegistry::builder()
        .clock(FixedClock(AT))
        .retention(cleaner.clone())
        .build();

    // No script_name either, so nothing is created under the default root.
    let err = registry.initialize(&LoggerOverrides::default()).unwrap_err();
    assert!(err.is_config());

    let roots = cleaner.0.lock().unwrap().clone();
    assert_eq!(roots, vec![RunLoggerConfig::default().log_path]);
}

#[test]
fn reinitialize_replaces_sinks() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();

    registry.initialize(&overrides(tmp.path())).unwrap();
    let run = registry.initialize(&overrides(tmp.path())).unwrap();
    assert_eq!(registry.attached_sinks(), 1);

    registry.in_scope(|| info!("exactly once"));

    assert_eq!(read(&run.log_file).matches("exactly once").count(), 1);
}

#[test]
fn reinitialize_moves_output_to_new_file() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();

    let first = registry.initialize(&overrides(tmp.path())).unwrap();
    let second = registry
        .initialize(
            &LoggerOverrides::new("other")
                .with_log_path(tmp.path())
                .with_console_enabled(false)
                .with_tz(LoggerTimeZone::Utc),
        )
        .unwrap();

    registry.in_scope(|| info!("after switch"));

    assert_ne!(first.log_file, second.log_file);
    assert!(!read(&first.log_file).contains("after switch"));
    assert!(read(&second.log_file).contains("after switch"));
}

#[test]
fn console_sink_has_its_own_threshold() {
    let tmp = TempDir::new().unwrap();
    let console = SharedBuf::default();
    let sink = console.clone();
    let registry = LogRegistry::builder()
        .clock(FixedClock(AT))
        .retention(NoRetention)
        .console_writer(move || Box::new(sink.clone()))
        .build();

    let run = registry
        .initialize(&overrides(tmp.path()).with_console_enabled(true))
        .unwrap();
    assert_eq!(registry.attached_sinks(), 2);

    registry.in_scope(|| {
        debug!("file only");
        info!("both");
    });

    let file = read(&run.log_file);
    assert!(file.contains("file only"));
    assert!(file.contains("both"));

    let console = console.contents();
    assert!(!console.contains("file only"));
    assert_eq!(console, "2024-03-05 14:22:07,000 - INFO - both\n");
}

#[test]
fn disabled_console_receives_nothing() {
    let tmp = TempDir::new().unwrap();
    let console = SharedBuf::default();
    let sink = console.clone();
    let registry = LogRegistry::builder()
        .clock(FixedClock(AT))
        .retention(NoRetention)
        .console_writer(move || Box::new(sink.clone()))
        .build();

    registry.initialize(&overrides(tmp.path())).unwrap();
    registry.in_scope(|| error!("file only"));

    assert!(console.contents().is_empty());
}

#[test]
fn disabled_loggers_suppress_namespace() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    let overrides =
        overrides(tmp.path()).with_disabled_loggers([("noisy", LoggerLevel::ERROR)]);
    let run = registry.initialize(&overrides).unwrap();

    registry.in_scope(|| {
        warn!(target: "noisy", "noisy warn");
        info!(target: "noisy::inner", "noisy child info");
        error!(target: "noisy", "noisy error");
        debug!(target: "quiet", "quiet debug");
    });

    let file = read(&run.log_file);
    assert!(!file.contains("noisy warn"));
    assert!(!file.contains("noisy child info"));
    assert!(file.contains("noisy error"));
    assert!(file.contains("quiet debug"));
    assert_eq!(registry.namespace_threshold("hyper"), None);
}

#[test]
fn namespace_thresholds_outlive_the_run_that_set_them() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();

    registry
        .initialize(&overrides(tmp.path()).with_disabled_loggers([("noisy", LoggerLevel::ERROR)]))
        .unwrap();
    let run = registry
        .initialize(&overrides(tmp.path()).with_disabled_loggers([("chatty", LoggerLevel::WARN)]))
        .unwrap();

    registry.in_scope(|| {
        warn!(target: "noisy", "noisy warn");
        info!(target: "chatty", "chatty info");
        warn!(target: "chatty", "chatty warn");
    });

    let file = read(&run.log_file);
    assert!(!file.contains("noisy warn"));
    assert!(!file.contains("chatty info"));
    assert!(file.contains("chatty warn"));
}

#[test]
fn namespaces_leave_sibling_targets_alone() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    let run = registry
        .initialize(&overrides(tmp.path()).with_disabled_loggers([("noisy", LoggerLevel::ERROR)]))
        .unwrap();

    registry.in_scope(|| {
        warn!(target: "noisy", "noisy warn");
        warn!(target: "noisybird", "sibling warn");
    });

    let file = read(&run.log_file);
    assert!(!file.contains("noisy warn"));
    assert!(file.contains("sibling warn"));
}

#[test]
fn default_disabled_loggers_cover_only_their_crates() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    let run = registry.initialize(&overrides(tmp.path())).unwrap();

    registry.in_scope(|| {
        info!(target: "want", "want info");
        info!(target: "hyper::client", "hyper info");
        info!(target: "wanted_app", "wanted_app info");
        info!(target: "hyperion", "hyperion info");
    });

    let file = read(&run.log_file);
    assert!(!file.contains("want info"));
    assert!(!file.contains("hyper info"));
    assert!(file.contains("wanted_app info"));
    assert!(file.contains("hyperion info"));
}

#[test]
fn trace_namespace_threshold_stops_at_debug() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    let run = registry
        .initialize(&overrides(tmp.path()).with_disabled_loggers([("verbose", LoggerLevel::TRACE)]))
        .unwrap();

    registry.in_scope(|| {
        trace!(target: "verbose", "verbose trace");
        debug!(target: "verbose", "verbose debug");
    });

    let file = read(&run.log_file);
    assert!(!file.contains("verbose trace"));
    assert!(file.contains("verbose debug"));
}

#[test]
fn resolved_config_matches_defaults_and_overrides() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    let supplied = overrides(tmp.path()).with_console_level(LoggerLevel::ERROR);

    let run = registry.initialize(&supplied).unwrap();

    let mut expected = RunLoggerConfig::default();
    expected.script_name = "svc".into();
    expected.log_path = tmp.path().to_path_buf();
    expected.console_enabled = false;
    expected.tz = LoggerTimeZone::Utc;
    expected.console_level = LoggerLevel::ERROR;
    assert_eq!(run.config, expected);
}

#[test]
fn unwritable_log_path_is_an_io_error() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, b"regular file").unwrap();
    let registry = registry();

    let err = registry.initialize(&overrides(&blocker)).unwrap_err();

    assert!(matches!(err, LoggerError::Io(_)), "expected io error, got {err:?}");
    assert_eq!(registry.attached_sinks(), 0);
    assert!(blocker.is_file());
}

#[test]
fn unopenable_log_file_is_reported() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("svc/20240305/14/2207.log")).unwrap();
    let registry = registry();

    let err = registry.initialize(&overrides(tmp.path())).unwrap_err();

    assert!(matches!(err, LoggerError::LogFile(_)), "expected log file error, got {err:?}");
    assert!(!err.is_config());
    assert_eq!(registry.attached_sinks(), 0);
}

#[test]
fn failed_reinitialize_keeps_previous_sinks() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    let run = registry.initialize(&overrides(tmp.path())).unwrap();

    let err = registry.initialize(&LoggerOverrides::default()).unwrap_err();
    assert!(err.is_config());

    registry.in_scope(|| info!("still here"));
    assert!(read(&run.log_file).contains("still here"));
}

#[test]
fn retention_report_lands_in_new_log() {
    let tmp = TempDir::new().unwrap();
    let stale = tmp.path().join("svc/20240101/09/0000.log");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, b"old").unwrap();
    let month_ago = SystemTime::now() - Duration::from_secs(30 * 24 * 60 * 60);
    filetime::set_file_mtime(&stale, FileTime::from_system_time(month_ago)).unwrap();

    let registry = LogRegistry::builder()
        .clock(FixedClock(AT))
        .retention(AgeRetention::default())
        .build();
    let run = registry.initialize(&overrides(tmp.path())).unwrap();

    assert!(!stale.exists());
    assert!(!tmp.path().join("svc/20240101").exists());
    let file = read(&run.log_file);
    assert!(file.contains("retention cleanup removed expired logs"));
    assert!(file.contains("files=1"));
}
