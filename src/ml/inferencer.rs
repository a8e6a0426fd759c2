// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Loads a checkpoint and runs the network on one image.
//
//   image ─▶ resize R×R ─▶ CHW /255 ─▶ [1, 3, R, R]
//         ─▶ KeypointNet (inner backend: no autodiff,
//            batch norm on running statistics)
//         ─▶ K heatmap planes + K normalised (x, y)

use anyhow::{anyhow, Result};
use burn::{prelude::*, tensor::TensorData};
use image::DynamicImage;
use std::path::Path;

use crate::data::preprocessor::{resize_square, to_chw};
use crate::domain::keypoint::KeypointName;
use crate::infra::checkpoint::{load_model, resolve_checkpoint, CheckpointMeta};
use crate::ml::{interfaces::KeypointEstimator, model::KeypointNet};

/// Host-side result for a single image.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// K planes of `resolution²` values, row-major
    pub heatmaps:   Vec<Vec<f32>>,
    /// Normalised `(x, y)` per keypoint, in key order
    pub points:     Vec<[f32; 2]>,
    pub resolution: usize,
}

pub struct Inferencer<B: Backend> {
    model:  KeypointNet<B>,
    meta:   CheckpointMeta,
    device: B::Device,
}

impl<B: Backend> Inferencer<B> {
    /// `path` is a checkpoint directory or a checkpoints root with `latest.json`.
    pub fn from_checkpoint(path: &Path, device: B::Device) -> Result<Self> {
        let dir           = resolve_checkpoint(path)?;
        let (model, meta) = load_model::<B>(&dir, &device)?;
        tracing::info!(
            keypoints  = meta.model.num_keypoints,
            resolution = meta.model.resolution,
            "Model loaded from '{}'",
            dir.display()
        );
        Ok(Self { model, meta, device })
    }

    pub fn keys(&self) -> &[KeypointName] { &self.meta.keys }

    pub fn predict(&self, image: &DynamicImage) -> Result<Prediction> {
        let r     = self.model.resolution();
        let k     = self.model.num_keypoints();
        let input = to_chw(&resize_square(image, r as u32));
        let input = Tensor::<B, 4>::from_data(TensorData::new(input, [1, 3, r, r]), &self.device);

        let output = self.model.estimate(input);

        let heatmaps = output
            .heatmaps
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("reading heatmaps: {e:?}"))?;
        let points = output
            .points
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("reading points: {e:?}"))?;

        Ok(Prediction {
            heatmaps:   heatmaps.chunks(r * r).map(<[f32]>::to_vec).collect(),
            points:     points.chunks(2).take(k).map(|p| [p[0], p[1]]).collect(),
            resolution: r,
        })
    }
}
