// ============================================================
// Layer 5 — Validation Evaluator
// ============================================================
// Accumulates per-keypoint pixel error across validation batches.
//
//   error[k] = mean over samples of ‖p̂_k − p_k‖ · R
//
// Points are normalised to [0,1], so scaling by the model
// resolution R gives the error in pixels of the resized crop
// the network actually sees. The sample with the largest mean
// error over its keypoints is remembered by name so the log can
// point at the crop worth looking at.

use anyhow::{anyhow, Result};
use burn::prelude::*;

use crate::domain::keypoint::KeypointName;

/// Running sums for one validation sweep.
#[derive(Debug, Clone)]
pub struct PixelErrorAccumulator {
    resolution: usize,
    sums:       Vec<f64>,
    samples:    usize,
    worst:      Option<(String, f64)>,
}

/// Final per-keypoint report.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelErrorReport {
    pub per_keypoint: Vec<(KeypointName, f64)>,
    pub mean:         f64,
    pub samples:      usize,
    /// Sample name and its mean pixel error over all keypoints
    pub worst:        Option<(String, f64)>,
}

impl PixelErrorAccumulator {
    pub fn new(num_keypoints: usize, resolution: usize) -> Self {
        Self { resolution, sums: vec![0.0; num_keypoints], samples: 0, worst: None }
    }

    /// Add one batch of `[N, K, 2]` predictions and targets; `names`
    /// labels the N samples in batch order.
    pub fn update<B: Backend>(
        &mut self,
        predicted: Tensor<B, 3>,
        target:    Tensor<B, 3>,
        names:     &[String],
    ) -> Result<()> {
        let [n, k, _] = predicted.dims();
        if k != self.sums.len() {
            return Err(anyhow!("expected {} keypoints, got {k}", self.sums.len()));
        }
        if names.len() != n {
            return Err(anyhow!("expected {n} sample names, got {}", names.len()));
        }

        // [N, K]
        let dist = (predicted - target).powf_scalar(2.0).sum_dim(2).sqrt().reshape([n, k]);
        let values = dist
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("reading pixel errors: {e:?}"))?;

        let scale = self.resolution as f64;
        for (row, name) in values.chunks(k).zip(names) {
            for (sum, d) in self.sums.iter_mut().zip(row) {
                *sum += *d as f64 * scale;
            }
            let sample_err = row.iter().map(|d| *d as f64).sum::<f64>() * scale / k.max(1) as f64;
            if self.worst.as_ref().map_or(true, |(_, e)| sample_err > *e) {
                self.worst = Some((name.clone(), sample_err));
            }
        }
        self.samples += n;
        Ok(())
    }

    pub fn finish(self, keys: &[KeypointName]) -> PixelErrorReport {
        let denom = self.samples.max(1) as f64;
        let per_keypoint: Vec<(KeypointName, f64)> = keys
            .iter()
            .copied()
            .zip(self.sums.iter().map(|s| s / denom))
            .collect();
        let mean = if per_keypoint.is_empty() {
            f64::NAN
        } else {
            per_keypoint.iter().map(|(_, e)| e).sum::<f64>() / per_keypoint.len() as f64
        };
        PixelErrorReport { per_keypoint, mean, samples: self.samples, worst: self.worst }
    }
}

impl PixelErrorReport {
    /// `top=1.23 mid_L_top=0.98 ...` for log lines.
    pub fn summary(&self) -> String {
        self.per_keypoint
            .iter()
            .map(|(k, e)| format!("{k}={e:.2}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type B = NdArray;

    fn points(values: Vec<f32>, n: usize, k: usize) -> Tensor<B, 3> {
        Tensor::from_data(TensorData::new(values, [n, k, 2]), &Default::default())
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("cone_{i}.png")).collect()
    }

    #[test]
    fn test_pixel_error_scales_by_resolution() {
        let keys = [KeypointName::Top, KeypointName::BottomLeft];
        let mut acc = PixelErrorAccumulator::new(2, 80);

        // sample 0: top off by 0.1 in x, bot_L exact
        // sample 1: top exact, bot_L off by (0.03, 0.04) → 0.05
        let pred   = points(vec![0.6, 0.5, 0.2, 0.9,   0.5, 0.5, 0.23, 0.94], 2, 2);
        let target = points(vec![0.5, 0.5, 0.2, 0.9,   0.5, 0.5, 0.2,  0.9 ], 2, 2);
        acc.update(pred, target, &names(2)).unwrap();

        let report = acc.finish(&keys);
        assert_eq!(report.samples, 2);
        assert_relative_eq!(report.per_keypoint[0].1, 4.0, epsilon = 1e-3);
        assert_relative_eq!(report.per_keypoint[1].1, 2.0, epsilon = 1e-3);
        assert_relative_eq!(report.mean, 3.0, epsilon = 1e-3);
        assert!(report.summary().starts_with("top=4.00"));

        // sample 0 averages 4 px over its two keypoints, sample 1 averages 2 px
        let (name, err) = report.worst.unwrap();
        assert_eq!(name, "cone_0.png");
        assert_relative_eq!(err, 4.0, epsilon = 1e-3);
    }

    #[test]
    fn test_worst_sample_tracks_across_batches() {
        let keys = [KeypointName::Top];
        let mut acc = PixelErrorAccumulator::new(1, 10);
        acc.update(points(vec![0.5, 0.5], 1, 1), points(vec![0.5, 0.6], 1, 1), &["a.png".to_string()]).unwrap();
        acc.update(points(vec![0.5, 0.5], 1, 1), points(vec![0.5, 0.8], 1, 1), &["b.png".to_string()]).unwrap();
        acc.update(points(vec![0.5, 0.5], 1, 1), points(vec![0.5, 0.5], 1, 1), &["c.png".to_string()]).unwrap();

        let (name, err) = acc.finish(&keys).worst.unwrap();
        assert_eq!(name, "b.png");
        assert_relative_eq!(err, 3.0, epsilon = 1e-3);
    }

    #[test]
    fn test_name_count_mismatch_is_error() {
        let mut acc = PixelErrorAccumulator::new(1, 10);
        let p = points(vec![0.0; 4], 2, 1);
        assert!(acc.update(p.clone(), p, &names(1)).is_err());
    }

    #[test]
    fn test_keypoint_count_mismatch_is_error() {
        let mut acc = PixelErrorAccumulator::new(3, 10);
        let p = points(vec![0.0; 4], 1, 2);
        assert!(acc.update(p.clone(), p, &names(1)).is_err());
    }
}
