// ============================================================
// Layer 4 — Keypoint Batcher
// ============================================================
// Stacks a Vec<KeypointItem> into device tensors.
//
//   Input:  N items, each with flat CHW / KHW / K2 buffers
//   Output: KeypointBatch with
//             images   [N, 3, R, R]
//             heatmaps [N, K, R, R]
//             points   [N, K, 2]
//
// Batches are built inline on the training thread: the epoch
// loop asks `batch_plan` for index groups, fetches the items
// from the dataset and hands them to `KeypointBatcher::batch`.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    prelude::*,
    tensor::TensorData,
};
use rand::{rngs::StdRng, seq::SliceRandom};

use crate::data::dataset::KeypointItem;

// ─── KeypointBatch ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct KeypointBatch<B: Backend> {
    pub images:   Tensor<B, 4>,
    pub heatmaps: Tensor<B, 4>,
    pub points:   Tensor<B, 3>,
    /// Sample names in batch order
    pub names:    Vec<String>,
}

// ─── KeypointBatcher ──────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct KeypointBatcher<B: Backend> {
    pub device:        B::Device,
    pub resolution:    usize,
    pub num_keypoints: usize,
}

impl<B: Backend> KeypointBatcher<B> {
    pub fn new(device: B::Device, resolution: usize, num_keypoints: usize) -> Self {
        Self { device, resolution, num_keypoints }
    }

    /// Flatten every item's buffers end to end, then reshape.
    pub fn batch(&self, items: Vec<KeypointItem>) -> KeypointBatch<B> {
        let n = items.len();
        let r = self.resolution;
        let k = self.num_keypoints;

        let mut images   = Vec::with_capacity(n * 3 * r * r);
        let mut heatmaps = Vec::with_capacity(n * k * r * r);
        let mut points   = Vec::with_capacity(n * k * 2);
        let mut names    = Vec::with_capacity(n);

        for item in items {
            images.extend_from_slice(&item.image);
            heatmaps.extend_from_slice(&item.heatmaps);
            points.extend_from_slice(&item.points);
            names.push(item.name);
        }

        KeypointBatch {
            images:   Tensor::from_data(TensorData::new(images,   [n, 3, r, r]), &self.device),
            heatmaps: Tensor::from_data(TensorData::new(heatmaps, [n, k, r, r]), &self.device),
            points:   Tensor::from_data(TensorData::new(points,   [n, k, 2]),    &self.device),
            names,
        }
    }
}

/// Split `0..len` into groups of at most `batch_size`, optionally shuffled.
/// The last group holds the remainder.
pub fn batch_plan(len: usize, batch_size: usize, rng: Option<&mut StdRng>) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..len).collect();
    if let Some(rng) = rng {
        order.shuffle(rng);
    }
    order
        .chunks(batch_size.max(1))
        .map(|c| c.to_vec())
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::SeedableRng;

    fn item(r: usize, k: usize, fill: f32) -> KeypointItem {
        KeypointItem {
            image:    vec![fill; 3 * r * r],
            heatmaps: vec![fill; k * r * r],
            points:   vec![fill; k * 2],
            name:     format!("img_{fill}"),
        }
    }

    #[test]
    fn test_batch_shapes() {
        let device  = Default::default();
        let batcher = KeypointBatcher::<NdArray>::new(device, 4, 7);
        let batch   = batcher.batch(vec![item(4, 7, 0.0), item(4, 7, 1.0), item(4, 7, 2.0)]);

        assert_eq!(batch.images.dims(),   [3, 3, 4, 4]);
        assert_eq!(batch.heatmaps.dims(), [3, 7, 4, 4]);
        assert_eq!(batch.points.dims(),   [3, 7, 2]);
        assert_eq!(batch.names[2], "img_2");
    }

    #[test]
    fn test_batch_keeps_item_order() {
        let device  = Default::default();
        let batcher = KeypointBatcher::<NdArray>::new(device, 2, 1);
        let batch   = batcher.batch(vec![item(2, 1, 0.0), item(2, 1, 5.0)]);
        let points  = batch.points.into_data().to_vec::<f32>().unwrap();
        assert_eq!(points, vec![0.0, 0.0, 5.0, 5.0]);
    }

    #[test]
    fn test_batch_plan_remainder() {
        let plan = batch_plan(10, 4, None);
        assert_eq!(plan.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(plan[0], vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_batch_plan_shuffle_covers_all() {
        let mut rng  = StdRng::seed_from_u64(3);
        let mut flat: Vec<usize> = batch_plan(9, 2, Some(&mut rng)).into_iter().flatten().collect();
        flat.sort();
        assert_eq!(flat, (0..9).collect::<Vec<_>>());
    }
}
