// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to <experiment>/metrics.csv.
//
// Columns:
//   epoch, lr,
//   train_loc, train_geo, train_total,
//   val_loc,   val_geo,   val_total,
//   mean_px_error, phase
//
// Example:
//   epoch,lr,train_loc,train_geo,train_total,val_loc,...,phase
//   0,0.001,0.081,0.412,0.085,0.077,...,improved
//   1,0.00099,0.064,0.301,0.067,0.071,...,improved
//
// Reading the curves:
//   - val_total rising while train_total falls → overfitting
//   - train_geo falling with flat train_loc → geometry is
//     learned before placement
//   - mean_px_error is in pixels of the resized crop
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

/// Averaged (location, geometric, total) for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossTriple {
    pub location:  f64,
    pub geometric: f64,
    pub total:     f64,
}

impl LossTriple {
    pub fn from_values([location, geometric, total]: [f64; 3]) -> Self {
        Self { location, geometric, total }
    }
}

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:         usize,
    pub lr:            f64,
    pub train_loc:     f64,
    pub train_geo:     f64,
    pub train_total:   f64,
    pub val_loc:       f64,
    pub val_geo:       f64,
    pub val_total:     f64,
    /// Mean over keypoints of the validation pixel error
    pub mean_px_error: f64,
    pub phase:         String,
}

impl EpochMetrics {
    pub fn new(
        epoch:         usize,
        lr:            f64,
        train:         LossTriple,
        val:           LossTriple,
        mean_px_error: f64,
        phase:         &str,
    ) -> Self {
        Self {
            epoch,
            lr,
            train_loc:   train.location,
            train_geo:   train.geometric,
            train_total: train.total,
            val_loc:     val.location,
            val_geo:     val.geometric,
            val_total:   val.total,
            mean_px_error,
            phase:       phase.to_string(),
        }
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// The header is written with the first row, so an existing file
    /// is appended to without repeating it.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics dir '{}'", dir.display()))?;
        Ok(Self { csv_path: dir.join("metrics.csv") })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let is_new = !self.csv_path.exists() || fs::metadata(&self.csv_path)?.len() == 0;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(m)?;
        writer.flush()?;

        tracing::debug!(epoch = m.epoch, val_total = m.val_total, "Logged epoch metrics");
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
