// ============================================================
// Layer 6 — Heatmap and Keypoint Rendering
// ============================================================
// Turns a prediction into two images:
//
//   heatmap stack   : each channel min-max scaled to [0,255]
//                     on its own, channels stacked top to
//                     bottom → GrayImage R wide, K·R tall
//   keypoint overlay: a filled disc per keypoint drawn on a
//                     copy of the original image, with
//                     normalised (x, y) scaled back to the
//                     original width and height
//
// A constant channel has no range to scale. It is rendered as
// zeros and its index is returned in `flat_channels` so the
// caller can report it.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// One colour per keypoint channel, cycled when K > 7.
const PALETTE: [[u8; 3]; 7] = [
    [255,  64,  64],
    [255, 160,   0],
    [255, 255,   0],
    [ 64, 220,  64],
    [  0, 200, 255],
    [ 64,  96, 255],
    [220,  64, 255],
];

#[derive(Debug, Clone)]
pub struct HeatmapRender {
    pub image:         GrayImage,
    /// Channels with zero range, drawn as zeros
    pub flat_channels: Vec<usize>,
}

/// Min-max scale one channel to `[0, 255]`.
/// Returns `None` when the channel is constant or not finite.
pub fn normalize_channel(values: &[f32]) -> Option<Vec<u8>> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return None;
    }
    Some(
        values
            .iter()
            .map(|&v| (((v - min) / range) * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect(),
    )
}

/// Stack `channels` (each `resolution²`, row-major) vertically.
pub fn render_heatmap_stack(channels: &[Vec<f32>], resolution: usize) -> HeatmapRender {
    let r = resolution as u32;
    let mut image = GrayImage::new(r, r * channels.len() as u32);
    let mut flat_channels = Vec::new();

    for (c, channel) in channels.iter().enumerate() {
        let Some(scaled) = normalize_channel(channel) else {
            flat_channels.push(c);
            continue;
        };
        let y_off = c as u32 * r;
        for (i, v) in scaled.into_iter().enumerate().take(resolution * resolution) {
            let (x, y) = ((i % resolution) as u32, (i / resolution) as u32);
            image.put_pixel(x, y_off + y, Luma([v]));
        }
    }

    HeatmapRender { image, flat_channels }
}

/// Normalised `(x, y)` → pixel coordinates, or `None` when off-image.
pub fn to_pixel(point: [f32; 2], dims: (u32, u32)) -> Option<(u32, u32)> {
    let (w, h) = dims;
    let x = point[0] * w as f32;
    let y = point[1] * h as f32;
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return None;
    }
    let (x, y) = (x as u32, y as u32);
    (x < w && y < h).then_some((x, y))
}

/// Fill a disc of `radius` pixels, clipped to the image.
pub fn draw_disc(img: &mut RgbImage, centre: (u32, u32), radius: u32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    let (cx, cy) = (centre.0 as i64, centre.1 as i64);
    let r = radius as i64;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Copy of `original` with one disc per keypoint.
pub fn draw_keypoints(original: &RgbImage, points: &[[f32; 2]]) -> RgbImage {
    let mut out = original.clone();
    let dims    = out.dimensions();
    // ~1% of the shorter side, at least 1 px
    let radius  = (dims.0.min(dims.1) / 100).max(1);

    for (i, &p) in points.iter().enumerate() {
        match to_pixel(p, dims) {
            Some(px) => draw_disc(&mut out, px, radius, Rgb(PALETTE[i % PALETTE.len()])),
            None => tracing::debug!(keypoint = i, "Keypoint ({:.3}, {:.3}) falls outside the image", p[0], p[1]),
        }
    }
    out
}
