// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns a decoded image into the network's input layout.
//
// Steps (applied in order):
//   1. Convert to 8-bit RGB
//   2. Resize to resolution × resolution (bilinear / Triangle)
//   3. Reorder HWC → CHW and scale bytes to [0,1]
//
// The same code prepares training items and inference inputs so
// both see identical pixels.
//
// Reference: image crate documentation (imageops::resize)

use image::{imageops::FilterType, DynamicImage, RgbImage};

/// Resize any decoded image to a square RGB image.
pub fn resize_square(img: &DynamicImage, resolution: u32) -> RgbImage {
    let rgb = img.to_rgb8();
    if rgb.dimensions() == (resolution, resolution) {
        return rgb;
    }
    image::imageops::resize(&rgb, resolution, resolution, FilterType::Triangle)
}

/// Channel-first float pixels in [0,1]: `[R plane, G plane, B plane]`.
pub fn to_chw(img: &RgbImage) -> Vec<f32> {
    let (w, h) = img.dimensions();
    let plane  = (w * h) as usize;
    let mut out = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in img.enumerate_pixels() {
        let idx = (y * w + x) as usize;
        for c in 0..3 {
            out[c * plane + idx] = pixel.0[c] as f32 / 255.0;
        }
    }
    out
}
