// ============================================================
// Layer 4 — Resized Image Cache
// ============================================================
// Decoding and resizing full-size crops dominates data loading,
// so resized images are kept on disk between runs:
//
//   <cache_dir>/<resolution>/<image name>.png
//
// The image name may contain sub-directories; they are mirrored
// under the cache directory. Names with `..`, a root or a prefix
// are rejected so entries never land outside it. PNG is lossless,
// so a cache hit yields exactly the pixels a fresh resize would.
//
// An entry older than its source image is rebuilt. A missing
// source still counts as a hit.

use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use crate::data::preprocessor::resize_square;
use crate::domain::sample::LabelledSample;

pub struct ImageCache {
    /// `None` disables caching
    dir:        Option<PathBuf>,
    resolution: u32,
}

impl ImageCache {
    pub fn new(dir: Option<PathBuf>, resolution: u32) -> Self {
        Self { dir, resolution }
    }

    fn entry_path(&self, sample: &LabelledSample) -> Result<Option<PathBuf>> {
        let Some(dir) = self.dir.as_ref() else { return Ok(None) };
        if !is_relative_within(Path::new(&sample.name)) {
            bail!("Image name '{}' cannot be used as a cache key", sample.name);
        }
        Ok(Some(
            dir.join(self.resolution.to_string())
                .join(format!("{}.png", sample.name)),
        ))
    }

    /// Return the sample's image resized to the cache resolution,
    /// reading from the cache when possible and filling it otherwise.
    pub fn load_resized(&self, sample: &LabelledSample) -> Result<RgbImage> {
        let entry = self.entry_path(sample)?;

        if let Some(path) = entry.as_ref().filter(|p| is_fresh(p, &sample.path)) {
            let cached = image::open(path)
                .with_context(|| format!("Cannot read cached image '{}'", path.display()))?
                .to_rgb8();
            if cached.dimensions() == (self.resolution, self.resolution) {
                return Ok(cached);
            }
            tracing::warn!("Ignoring cache entry '{}' with wrong size", path.display());
        }

        let source = image::open(&sample.path)
            .with_context(|| format!("Cannot read image '{}'", sample.path.display()))?;
        let resized = resize_square(&source, self.resolution);

        if let Some(path) = entry {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create cache dir '{}'", parent.display()))?;
            }
            resized
                .save(&path)
                .with_context(|| format!("Cannot write cache entry '{}'", path.display()))?;
            tracing::trace!("Cached '{}'", path.display());
        }

        Ok(resized)
    }
}

/// Only plain relative components: no `..`, root or drive prefix.
fn is_relative_within(name: &Path) -> bool {
    name.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && name.components().any(|c| matches!(c, Component::Normal(_)))
}

/// Entry exists and is not older than the source.
fn is_fresh(entry: &Path, source: &Path) -> bool {
    let Ok(entry_time) = fs::metadata(entry).and_then(|m| m.modified()) else {
        return false;
    };
    match fs::metadata(source).and_then(|m| m.modified()) {
        Ok(source_time) => entry_time >= source_time,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::SampleMeta;
    use image::Rgb;

    fn sample_at(dir: &std::path::Path) -> LabelledSample {
        let mut img = RgbImage::new(10, 20);
        img.put_pixel(3, 4, Rgb([200, 10, 10]));
        let path = dir.join("cone.png");
        img.save(&path).unwrap();
        LabelledSample {
            name:      "cone.png".into(),
            path,
            keypoints: Vec::new(),
            meta:      SampleMeta { width: 10, height: 20 },
        }
    }

    #[test]
    fn test_fills_and_reuses_cache() {
        let data  = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let sample = sample_at(data.path());

        let c     = ImageCache::new(Some(cache.path().to_path_buf()), 8);
        let first = c.load_resized(&sample).unwrap();
        assert!(cache.path().join("8").join("cone.png.png").exists());

        // Remove the source; a cache hit must not need it
        std::fs::remove_file(&sample.path).unwrap();
        let second = c.load_resized(&sample).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_names_leaving_the_cache() {
        let data  = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let c     = ImageCache::new(Some(cache.path().join("c")), 8);

        for bad in ["../escape.png", "sub/../../escape.png", "/abs/cone.png", ".."] {
            let mut sample = sample_at(data.path());
            sample.name = bad.into();
            assert!(c.load_resized(&sample).is_err(), "{bad} accepted");
        }
        assert!(!cache.path().join("escape.png.png").exists());

        // sub-directories inside the cache are fine
        let mut sample = sample_at(data.path());
        sample.name = "left/cone.png".into();
        c.load_resized(&sample).unwrap();
        assert!(cache.path().join("c").join("8").join("left").join("cone.png.png").exists());
    }

    #[test]
    fn test_source_newer_than_entry_is_reloaded() {
        let data  = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let sample = sample_at(data.path());

        let c     = ImageCache::new(Some(cache.path().to_path_buf()), 4);
        let first = c.load_resized(&sample).unwrap();

        // same name, new pixels, later timestamp
        RgbImage::from_pixel(10, 20, Rgb([0, 255, 0])).save(&sample.path).unwrap();
        fs::File::options()
            .write(true)
            .open(&sample.path)
            .unwrap()
            .set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(60))
            .unwrap();

        let second = c.load_resized(&sample).unwrap();
        assert_ne!(first, second);
        assert!(second.get_pixel(0, 0)[1] > 200);
    }

    #[test]
    fn test_without_cache_dir_reads_source() {
        let data   = tempfile::tempdir().unwrap();
        let sample = sample_at(data.path());
        let img    = ImageCache::new(None, 5).load_resized(&sample).unwrap();
        assert_eq!(img.dimensions(), (5, 5));
    }
}
