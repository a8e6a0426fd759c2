// ============================================================
// Layer 3 — Labelled Sample
// ============================================================
// One cone crop plus its keypoint labels, exactly as they come
// out of the label CSV. Coordinates are still in source-image
// pixels; resizing and normalisation happen in the data layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::keypoint::Keypoint;

/// Source-image size, used to normalise the labelled points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMeta {
    pub width:  u32,
    pub height: u32,
}

/// A labelled image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelledSample {
    /// Image name as written in the label file (relative path)
    pub name: String,

    /// Resolved path on disk (dataset root joined with `name`)
    pub path: PathBuf,

    /// Keypoints in the configured key order
    pub keypoints: Vec<Keypoint>,

    pub meta: SampleMeta,
}

impl LabelledSample {
    /// Keypoints scaled into [0,1] by the source image size, flattened as
    /// `[x0, y0, x1, y1, ...]`.
    pub fn normalized_points(&self) -> Vec<f32> {
        self.keypoints
            .iter()
            .flat_map(|k| k.normalized(self.meta.width, self.meta.height))
            .collect()
    }
}
