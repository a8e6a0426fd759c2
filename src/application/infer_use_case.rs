// ============================================================
// Layer 2 — Infer Use Case
// ============================================================
// checkpoint + one image → two PNG files:
//
//   <output_dir>/<stem>_heatmap.png    K heatmaps stacked, R × K·R
//   <output_dir>/<stem>_inference.png  original image + keypoints
//
// <stem> is the input file name without its extension.

use anyhow::{Context, Result};
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::keypoint::KeypointName;
use crate::infra::visualize::{draw_keypoints, render_heatmap_stack};
use crate::ml::{inferencer::Inferencer, DefaultBackend};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferConfig {
    /// Checkpoint directory, or a checkpoints root with latest.json
    pub checkpoint: PathBuf,
    pub image:      PathBuf,
    pub output_dir: PathBuf,
}

/// Files written and what went into them.
#[derive(Debug, Clone)]
pub struct InferenceOutputs {
    pub heatmap_path: PathBuf,
    pub overlay_path: PathBuf,
    /// Keypoints in original-image pixels
    pub keypoints:    Vec<(KeypointName, [f32; 2])>,
    /// Heatmap channels that were constant and rendered blank
    pub flat_channels: Vec<usize>,
}

pub struct InferUseCase {
    config: InferConfig,
}

impl InferUseCase {
    pub fn new(config: InferConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<InferenceOutputs> {
        self.run::<DefaultBackend>(Default::default())
    }

    pub fn run<B: Backend>(&self, device: B::Device) -> Result<InferenceOutputs> {
        let cfg        = &self.config;
        let inferencer = Inferencer::<B>::from_checkpoint(&cfg.checkpoint, device)?;
        infer_image(&inferencer, &cfg.image, &cfg.output_dir)
    }
}

/// Run one image through a loaded model and write both PNGs.
pub fn infer_image<B: Backend>(
    inferencer: &Inferencer<B>,
    image_path: &Path,
    output_dir: &Path,
) -> Result<InferenceOutputs> {
    let image = image::open(image_path)
        .with_context(|| format!("Cannot read image '{}'", image_path.display()))?;
    let prediction = inferencer.predict(&image)?;

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Cannot create output dir '{}'", output_dir.display()))?;
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    // ── Heatmaps ──────────────────────────────────────────────────────────────
    let render = render_heatmap_stack(&prediction.heatmaps, prediction.resolution);
    for &c in &render.flat_channels {
        let name = inferencer.keys().get(c).map(|k| k.as_str()).unwrap_or("?");
        tracing::warn!(channel = c, keypoint = name, "Heatmap channel is constant, rendered as zeros");
    }
    let heatmap_path = output_dir.join(format!("{stem}_heatmap.png"));
    render
        .image
        .save(&heatmap_path)
        .with_context(|| format!("Cannot write '{}'", heatmap_path.display()))?;

    // ── Overlay ───────────────────────────────────────────────────────────────
    let original     = image.to_rgb8();
    let overlay      = draw_keypoints(&original, &prediction.points);
    let overlay_path = output_dir.join(format!("{stem}_inference.png"));
    overlay
        .save(&overlay_path)
        .with_context(|| format!("Cannot write '{}'", overlay_path.display()))?;

    let (w, h) = original.dimensions();
    let keypoints: Vec<(KeypointName, [f32; 2])> = inferencer
        .keys()
        .iter()
        .copied()
        .zip(prediction.points.iter().map(|p| [p[0] * w as f32, p[1] * h as f32]))
        .collect();
    for (name, [x, y]) in &keypoints {
        tracing::debug!("{name:>10}: ({x:.1}, {y:.1})");
    }
    tracing::info!(
        "Wrote '{}' and '{}'",
        heatmap_path.display(),
        overlay_path.display()
    );

    Ok(InferenceOutputs { heatmap_path, overlay_path, keypoints, flat_channels: render.flat_channels })
}
