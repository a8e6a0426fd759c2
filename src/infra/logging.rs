// ============================================================
// Layer 6 — Logging and Experiment Directories
// ============================================================
// Structured logging with `tracing`:
//
//   console layer : always on, coloured, filtered by RUST_LOG
//                   (default "cone_keypoints=info")
//   file layer    : training only, <experiment>/train.log, no
//                   ANSI codes, written through a non-blocking
//                   appender whose guard must outlive the run
//
// Every training run gets its own directory named after the
// local start time:
//
//   <output_dir>/20240131_142501/
//     train.log, train_config.json, metrics.csv, checkpoints/
//
// Reference: tracing-subscriber and tracing-appender docs

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "cone_keypoints=info";
pub const LOG_FILE: &str = "train.log";

/// Install the global subscriber. With `log_dir`, also mirror every
/// record into `<log_dir>/train.log`; keep the returned guard alive
/// until the program ends or buffered lines are lost.
pub fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer().with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(LOG_FILE)
                .build(dir)
                .with_context(|| format!("Cannot open log file in '{}'", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Cannot install tracing subscriber: {e}"))?;

    Ok(guard)
}

/// `YYYYmmdd_HHMMSS`
pub fn experiment_name(started: DateTime<Local>) -> String {
    started.format("%Y%m%d_%H%M%S").to_string()
}

/// Create `<output_dir>/<timestamp>`. A second run in the same
/// second gets a `_1`, `_2`, ... suffix instead of sharing a directory.
pub fn create_experiment_dir(output_dir: &Path, started: DateTime<Local>) -> Result<PathBuf> {
    let base = experiment_name(started);
    let mut dir = output_dir.join(&base);
    let mut n = 0;
    while dir.exists() {
        n += 1;
        dir = output_dir.join(format!("{base}_{n}"));
    }
    fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create experiment dir '{}'", dir.display()))?;
    Ok(dir)
}
