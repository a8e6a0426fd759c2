// ============================================================
// Layer 5 — Model and Loss Contracts
// ============================================================
// The training loop is written against these two traits, not
// against KeypointNet / CrossRatioLoss directly, so a stub
// network or a different loss can be dropped in for tests.

use burn::prelude::*;

/// What every keypoint network returns for a batch of images.
#[derive(Debug, Clone)]
pub struct KeypointOutput<B: Backend> {
    /// `[N, K, R, R]`, each channel sums to 1
    pub heatmaps: Tensor<B, 4>,
    /// `[N, K, 2]`, normalised (x, y)
    pub points:   Tensor<B, 3>,
}

/// Image → (heatmaps, points).
pub trait KeypointEstimator<B: Backend> {
    /// `images`: `[N, 3, R, R]` in [0,1]
    fn estimate(&self, images: Tensor<B, 4>) -> KeypointOutput<B>;

    fn num_keypoints(&self) -> usize;

    fn resolution(&self) -> usize;
}

/// Scalar loss components; `total` is what gets back-propagated.
#[derive(Debug, Clone)]
pub struct LossParts<B: Backend> {
    pub location:  Tensor<B, 1>,
    pub geometric: Tensor<B, 1>,
    pub total:     Tensor<B, 1>,
}

impl<B: Backend> LossParts<B> {
    /// Detached host values `(location, geometric, total)`.
    pub fn values(&self) -> [f64; 3] {
        [
            self.location.clone().into_scalar().elem::<f64>(),
            self.geometric.clone().into_scalar().elem::<f64>(),
            self.total.clone().into_scalar().elem::<f64>(),
        ]
    }
}

/// Prediction + targets → three-part loss. Generic over the backend so
/// the same loss serves the autodiff training pass and the validation pass.
pub trait KeypointLoss {
    fn compute<B: Backend>(
        &self,
        output:          &KeypointOutput<B>,
        target_heatmaps: Tensor<B, 4>,
        target_points:   Tensor<B, 3>,
    ) -> LossParts<B>;
}
