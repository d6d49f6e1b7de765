use std::{env, fs};

use anyhow::Context;
use tracing::{debug, error, info, warn};

use runlog_observe::{LoggerOverrides, init_local_offset, init_run_logger};

/// Log root resolution, first match wins:
/// 1. `log_path` in the overrides file
/// 2. the `LOG_PATH` environment variable, `.env` included
/// 3. `logs` under the working directory
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_local_offset();

    // 1) overrides
    let mut overrides = match env::args().nth(1) {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read overrides from {path}"))?;
            serde_json::from_str::<LoggerOverrides>(&raw)
                .with_context(|| format!("invalid overrides in {path}"))?
        }
        None => LoggerOverrides::default(),
    };
    if overrides.script_name.is_none() {
        overrides.script_name = Some("logger_demo".to_string());
    }

    // 2) logger
    let (_registry, run) = init_run_logger(&overrides)?;

    // 3) one record per level
    debug!(log_file = %run.log_file.display(), "current log file");
    info!("this is an INFO record");
    warn!("this is a WARN record");
    error!("this is an ERROR record");

    println!("demo logs written, see {}", run.log_dir.display());
    Ok(())
}
