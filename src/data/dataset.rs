use anyhow::Result;
use burn::data::dataset::Dataset;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::data::{cache::ImageCache, heatmap::heatmap_targets, preprocessor::to_chw};
use crate::domain::sample::LabelledSample;

/// One training item: `(image, heatmap_target, point_target, name)`.
/// All float buffers are flat and row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeypointItem {
    /// `[3, R, R]` in [0,1]
    pub image:    Vec<f32>,
    /// `[K, R, R]`, unit mass per channel
    pub heatmaps: Vec<f32>,
    /// `[K, 2]` normalised (x, y)
    pub points:   Vec<f32>,
    pub name:     String,
}

struct PreparedSample {
    pixels: RgbImage,
    points: Vec<f32>,
    name:   String,
}

/// Resized images kept in memory; float tensors and heatmap
/// targets are rebuilt on every `get`.
pub struct KeypointDataset {
    samples:    Vec<PreparedSample>,
    resolution: usize,
    sigma:      f32,
}

impl KeypointDataset {
    pub fn prepare(
        samples:    &[LabelledSample],
        cache:      &ImageCache,
        resolution: usize,
        sigma:      f32,
    ) -> Result<Self> {
        let samples = samples
            .iter()
            .map(|s| {
                Ok(PreparedSample {
                    pixels: cache.load_resized(s)?,
                    points: s.normalized_points(),
                    name:   s.name.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { samples, resolution, sigma })
    }

    pub fn resolution(&self) -> usize { self.resolution }
}

impl Dataset<KeypointItem> for KeypointDataset {
    fn get(&self, index: usize) -> Option<KeypointItem> {
        self.samples.get(index).map(|s| KeypointItem {
            image:    to_chw(&s.pixels),
            heatmaps: heatmap_targets(&s.points, self.resolution, self.sigma),
            points:   s.points.clone(),
            name:     s.name.clone(),
        })
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keypoint::{Keypoint, KeypointName};
    use crate::domain::sample::SampleMeta;

    #[test]
    fn test_item_layout() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.png");
        RgbImage::new(30, 60).save(&path).unwrap();
        let sample = LabelledSample {
            name:      "c.png".into(),
            path,
            keypoints: vec![
                Keypoint::new(KeypointName::Top, 15.0, 0.0),
                Keypoint::new(KeypointName::BottomLeft, 0.0, 60.0),
            ],
            meta: SampleMeta { width: 30, height: 60 },
        };

        let ds   = KeypointDataset::prepare(&[sample], &ImageCache::new(None, 12), 12, 1.0).unwrap();
        let item = ds.get(0).unwrap();

        assert_eq!(ds.len(), 1);
        assert_eq!(item.image.len(), 3 * 12 * 12);
        assert_eq!(item.heatmaps.len(), 2 * 12 * 12);
        assert_eq!(item.points, vec![0.5, 0.0, 0.0, 1.0]);
        assert_eq!(item.name, "c.png");
        assert!(ds.get(1).is_none());
    }
}
