use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{relu, softmax},
};

use crate::ml::interfaces::{KeypointEstimator, KeypointOutput};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct KeypointNetConfig {
    pub num_keypoints: usize,
    pub resolution:    usize,
    #[config(default = 32)]
    pub channels:      usize,
    #[config(default = 3)]
    pub num_blocks:    usize,
}

impl KeypointNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> KeypointNet<B> {
        let stem   = ConvBlock::new(3, self.channels, device);
        let blocks = (0..self.num_blocks)
            .map(|_| ResidualBlock::new(self.channels, device))
            .collect();
        let head = Conv2dConfig::new([self.channels, self.num_keypoints], [1, 1]).init(device);
        KeypointNet {
            stem, blocks, head,
            num_keypoints: self.num_keypoints,
            resolution:    self.resolution,
        }
    }
}

/// 3×3 conv → batch norm → ReLU, resolution preserved.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: BatchNorm<B>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(c_in: usize, c_out: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([c_in, c_out], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .with_bias(false)
            .init(device);
        let norm = BatchNormConfig::new(c_out).init(device);
        Self { conv, norm }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.norm.forward(self.conv.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    pub first:  ConvBlock<B>,
    pub second: ConvBlock<B>,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            first:  ConvBlock::new(channels, channels, device),
            second: ConvBlock::new(channels, channels, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        x.clone() + self.second.forward(self.first.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct KeypointNet<B: Backend> {
    pub stem:          ConvBlock<B>,
    pub blocks:        Vec<ResidualBlock<B>>,
    pub head:          Conv2d<B>,
    pub num_keypoints: usize,
    pub resolution:    usize,
}

impl<B: Backend> KeypointNet<B> {
    /// images: [N, 3, R, R] → heatmaps [N, K, R, R], points [N, K, 2]
    pub fn forward(&self, images: Tensor<B, 4>) -> KeypointOutput<B> {
        let mut x = self.stem.forward(images);
        for block in &self.blocks {
            x = block.forward(x);
        }
        let logits = self.head.forward(x);
        let heatmaps = spatial_softmax(logits);
        let points   = soft_argmax(heatmaps.clone());
        KeypointOutput { heatmaps, points }
    }
}

impl<B: Backend> KeypointEstimator<B> for KeypointNet<B> {
    fn estimate(&self, images: Tensor<B, 4>) -> KeypointOutput<B> {
        self.forward(images)
    }

    fn num_keypoints(&self) -> usize { self.num_keypoints }

    fn resolution(&self) -> usize { self.resolution }
}

/// Softmax over each channel's H×W plane.
pub fn spatial_softmax<B: Backend>(logits: Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, k, h, w] = logits.dims();
    softmax(logits.reshape([n, k, h * w]), 2).reshape([n, k, h, w])
}

/// Expected (x, y) under each heatmap, with pixel i centred at (i + 0.5) / size.
pub fn soft_argmax<B: Backend>(heatmaps: Tensor<B, 4>) -> Tensor<B, 3> {
    let [n, k, h, w] = heatmaps.dims();
    let device = heatmaps.device();

    let xs = Tensor::<B, 1, Int>::arange(0..w as i64, &device)
        .float()
        .add_scalar(0.5)
        .div_scalar(w as f32)
        .reshape([1, 1, 1, w])
        .expand([n, k, h, w]);
    let ys = Tensor::<B, 1, Int>::arange(0..h as i64, &device)
        .float()
        .add_scalar(0.5)
        .div_scalar(h as f32)
        .reshape([1, 1, h, 1])
        .expand([n, k, h, w]);

    let x = (heatmaps.clone() * xs).sum_dim(3).sum_dim(2).reshape([n, k, 1]);
    let y = (heatmaps * ys).sum_dim(3).sum_dim(2).reshape([n, k, 1]);
    Tensor::cat(vec![x, y], 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type B = NdArray;

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let model: KeypointNet<B> = KeypointNetConfig::new(7, 16)
            .with_channels(4)
            .with_num_blocks(1)
            .init(&device);

        let out = model.forward(Tensor::zeros([2, 3, 16, 16], &device));
        assert_eq!(out.heatmaps.dims(), [2, 7, 16, 16]);
        assert_eq!(out.points.dims(), [2, 7, 2]);
    }

    #[test]
    fn test_heatmaps_have_unit_mass_and_points_in_range() {
        let device = Default::default();
        let model: KeypointNet<B> = KeypointNetConfig::new(3, 8)
            .with_channels(4)
            .with_num_blocks(1)
            .init(&device);

        let out    = model.forward(Tensor::random([1, 3, 8, 8], burn::tensor::Distribution::Default, &device));
        let masses = out.heatmaps.sum_dim(3).sum_dim(2).into_data().to_vec::<f32>().unwrap();
        for m in masses {
            assert_relative_eq!(m, 1.0, epsilon = 1e-4);
        }
        let points = out.points.into_data().to_vec::<f32>().unwrap();
        assert!(points.iter().all(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn test_soft_argmax_of_one_hot_is_pixel_centre() {
        let device = Default::default();
        let mut plane = vec![0.0f32; 4 * 4];
        plane[2 * 4 + 1] = 1.0; // x = 1, y = 2
        let hm = Tensor::<B, 4>::from_data(TensorData::new(plane, [1, 1, 4, 4]), &device);

        let p = soft_argmax(hm).into_data().to_vec::<f32>().unwrap();
        assert_relative_eq!(p[0], 1.5 / 4.0, epsilon = 1e-6);
        assert_relative_eq!(p[1], 2.5 / 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let cfg  = KeypointNetConfig::new(7, 80).with_channels(16);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: KeypointNetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.channels, 16);
        assert_eq!(back.num_blocks, 3);
    }
}
