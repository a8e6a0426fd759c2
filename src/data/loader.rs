// ============================================================
// Layer 4 — Label Loader
// ============================================================
// Reads the cone label CSV.
//
// Expected layout (one header row, one row per image):
//
//   Name,URL,top,mid_L_top,mid_R_top,mid_L_bot,mid_R_bot,bot_L,bot_R
//   vid_38_frame_956_0.jpg,,"[29, 4]","[22, 24]","[36, 24]",...
//
//   - `Name` is the image path relative to the dataset root
//   - every configured keypoint key must be a column
//   - each keypoint cell is "[x, y]" in source-image pixels
//   - any other column is ignored
//
// Image dimensions are read from the file header only (no full
// decode) so labels can be normalised before any resizing.
//
// Reference: csv crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::keypoint::{Keypoint, KeypointName};
use crate::domain::sample::{LabelledSample, SampleMeta};
use crate::domain::traits::LabelSource;

pub const NAME_COLUMN: &str = "Name";

/// Label-file problems, kept typed so callers and tests can tell them apart.
#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("label file has no '{0}' column")]
    MissingColumn(String),

    #[error("row {row}: cannot parse coordinate '{value}' for '{key}' (expected \"[x, y]\")")]
    BadCoordinate { row: usize, key: KeypointName, value: String },

    #[error("row {row}: empty image name")]
    EmptyName { row: usize },
}

/// Loads labelled samples from a CSV file.
/// Implements the LabelSource trait from Layer 3.
pub struct CsvLabelSource {
    csv_path:     PathBuf,
    dataset_root: PathBuf,
    keys:         Vec<KeypointName>,
}

impl CsvLabelSource {
    pub fn new(
        csv_path:     impl Into<PathBuf>,
        dataset_root: impl Into<PathBuf>,
        keys:         Vec<KeypointName>,
    ) -> Self {
        Self {
            csv_path:     csv_path.into(),
            dataset_root: dataset_root.into(),
            keys,
        }
    }

    /// Parse the CSV into (image name, keypoints) pairs without touching images.
    fn read_rows(&self) -> Result<Vec<(String, Vec<Keypoint>)>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.csv_path)
            .with_context(|| format!("Cannot open label file '{}'", self.csv_path.display()))?;

        let headers = reader.headers()?.clone();
        let find = |column: &str| -> Result<usize, LabelError> {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| LabelError::MissingColumn(column.to_string()))
        };

        let name_idx = find(NAME_COLUMN)?;
        let key_idx: Vec<(KeypointName, usize)> = self
            .keys
            .iter()
            .map(|&k| find(k.as_str()).map(|i| (k, i)))
            .collect::<Result<_, _>>()?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            // +2: 1-based line numbers, header on line 1
            let row    = i + 2;
            let record = record.with_context(|| format!("Malformed CSV at line {row}"))?;

            let name = record.get(name_idx).unwrap_or("").trim().to_string();
            if name.is_empty() {
                return Err(LabelError::EmptyName { row }.into());
            }

            let mut keypoints = Vec::with_capacity(key_idx.len());
            for &(key, idx) in &key_idx {
                let cell = record.get(idx).unwrap_or("");
                let [x, y] = parse_coordinate(cell).ok_or_else(|| LabelError::BadCoordinate {
                    row,
                    key,
                    value: cell.to_string(),
                })?;
                keypoints.push(Keypoint::new(key, x, y));
            }
            rows.push((name, keypoints));
        }
        Ok(rows)
    }
}

impl LabelSource for CsvLabelSource {
    fn load_all(&self) -> Result<Vec<LabelledSample>> {
        let rows = self.read_rows()?;
        let mut samples = Vec::with_capacity(rows.len());

        for (name, keypoints) in rows {
            let path = self.dataset_root.join(&name);
            let (width, height) = image::image_dimensions(&path)
                .with_context(|| format!("Cannot read image '{}'", path.display()))?;
            samples.push(LabelledSample {
                name,
                path,
                keypoints,
                meta: SampleMeta { width, height },
            });
        }

        tracing::info!(
            "Loaded {} labelled samples from '{}'",
            samples.len(),
            self.csv_path.display()
        );
        Ok(samples)
    }
}

/// Parse a "[x, y]" cell. Brackets are optional; whitespace is ignored.
pub fn parse_coordinate(cell: &str) -> Option<[f32; 2]> {
    let inner = cell.trim().trim_start_matches('[').trim_end_matches(']');
    let mut parts = inner.split(',').map(|p| p.trim().parse::<f32>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y)), None) if x.is_finite() && y.is_finite() => Some([x, y]),
        _ => None,
    }
}

/// Resolve the label file's directory when no dataset root is given.
pub fn default_dataset_root(csv_path: &Path) -> PathBuf {
    csv_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keypoint::CONE_KEYPOINTS;
    use std::fs;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) {
        image::RgbImage::new(w, h).save(dir.join(name)).unwrap();
    }

    fn full_row(name: &str) -> String {
        let coords = (0..7)
            .map(|i| format!("\"[{}, {}]\"", i, i * 2))
            .collect::<Vec<_>>()
            .join(",");
        format!("{name},http://example,{coords}")
    }

    fn header() -> String {
        let keys: Vec<&str> = CONE_KEYPOINTS.iter().map(|k| k.as_str()).collect();
        format!("Name,URL,{}", keys.join(","))
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate("[29, 4]"), Some([29.0, 4.0]));
        assert_eq!(parse_coordinate(" 1.5,2 "), Some([1.5, 2.0]));
        assert_eq!(parse_coordinate("[1]"), None);
        assert_eq!(parse_coordinate("[1, 2, 3]"), None);
        assert_eq!(parse_coordinate("[a, 2]"), None);
    }

    #[test]
    fn test_loads_rows_and_image_sizes() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 40, 60);
        write_png(dir.path(), "b.png", 20, 30);
        let csv = dir.path().join("labels.csv");
        fs::write(&csv, format!("{}\n{}\n{}\n", header(), full_row("a.png"), full_row("b.png"))).unwrap();

        let source  = CsvLabelSource::new(&csv, dir.path(), CONE_KEYPOINTS.to_vec());
        let samples = source.load_all().unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].meta, SampleMeta { width: 40, height: 60 });
        assert_eq!(samples[1].keypoints.len(), 7);
        assert_eq!(samples[1].keypoints[3], Keypoint::new(KeypointName::MidLeftBottom, 3.0, 6.0));
    }

    #[test]
    fn test_key_subset_follows_configured_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 10, 10);
        let csv = dir.path().join("labels.csv");
        fs::write(&csv, format!("{}\n{}\n", header(), full_row("a.png"))).unwrap();

        let keys    = vec![KeypointName::BottomRight, KeypointName::Top];
        let samples = CsvLabelSource::new(&csv, dir.path(), keys).load_all().unwrap();
        assert_eq!(samples[0].keypoints[0].name, KeypointName::BottomRight);
        assert_eq!(samples[0].keypoints[0].x, 6.0);
        assert_eq!(samples[0].keypoints[1].name, KeypointName::Top);
    }

    #[test]
    fn test_missing_keypoint_column() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("labels.csv");
        fs::write(&csv, "Name,top\na.png,\"[1, 2]\"\n").unwrap();

        let err = CsvLabelSource::new(&csv, dir.path(), CONE_KEYPOINTS.to_vec())
            .load_all()
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<LabelError>(),
            Some(&LabelError::MissingColumn("mid_L_top".into()))
        );
    }

    #[test]
    fn test_bad_coordinate_names_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("labels.csv");
        fs::write(&csv, "Name,top\na.png,\"[1, 2]\"\nb.png,oops\n").unwrap();

        let err = CsvLabelSource::new(&csv, dir.path(), vec![KeypointName::Top])
            .load_all()
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<LabelError>(),
            Some(&LabelError::BadCoordinate { row: 3, key: KeypointName::Top, value: "oops".into() })
        );
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("labels.csv");
        fs::write(&csv, "Name,top\nghost.png,\"[1, 2]\"\n").unwrap();
        assert!(CsvLabelSource::new(&csv, dir.path(), vec![KeypointName::Top]).load_all().is_err());
    }
}
