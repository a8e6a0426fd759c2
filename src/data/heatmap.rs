// ============================================================
// Layer 4 — Heatmap Targets
// ============================================================
// Each keypoint gets its own target channel: a Gaussian bump
// centred on the label, rendered at the training resolution.
//
// The network's heatmaps come out of a spatial softmax and sum
// to 1 per channel, so targets are normalised to unit mass too.
//
// Coordinates are normalised: pixel i covers [i, i+1) / size,
// so a point at 0.5/size sits exactly on the centre of pixel 0.

/// One unit-mass Gaussian channel of `size × size` values, row-major.
pub fn gaussian_heatmap(point: [f32; 2], size: usize, sigma: f32) -> Vec<f32> {
    let cx = point[0] * size as f32 - 0.5;
    let cy = point[1] * size as f32 - 0.5;
    let two_sigma_sq = 2.0 * sigma.max(1e-3).powi(2);

    let mut channel = Vec::with_capacity(size * size);
    for y in 0..size {
        let dy = y as f32 - cy;
        for x in 0..size {
            let dx = x as f32 - cx;
            channel.push((-(dx * dx + dy * dy) / two_sigma_sq).exp());
        }
    }

    let mass: f32 = channel.iter().sum();
    if mass > 0.0 {
        channel.iter_mut().for_each(|v| *v /= mass);
    } else {
        // Label far outside the frame: spread the mass uniformly
        let uniform = 1.0 / (size * size) as f32;
        channel.iter_mut().for_each(|v| *v = uniform);
    }
    channel
}

/// Stack one channel per keypoint: `[K, size, size]` flattened.
/// `points` is `[x0, y0, x1, y1, ...]` in [0,1].
pub fn heatmap_targets(points: &[f32], size: usize, sigma: f32) -> Vec<f32> {
    points
        .chunks_exact(2)
        .flat_map(|p| gaussian_heatmap([p[0], p[1]], size, sigma))
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn argmax(v: &[f32]) -> usize {
        v.iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &x)| if x > best.1 { (i, x) } else { best })
            .0
    }

    #[test]
    fn test_peak_sits_on_labelled_pixel() {
        let size = 16;
        // Centre of pixel (x=3, y=10)
        let hm = gaussian_heatmap([3.5 / 16.0, 10.5 / 16.0], size, 1.5);
        assert_eq!(argmax(&hm), 10 * size + 3);
    }

    #[test]
    fn test_unit_mass() {
        let hm = gaussian_heatmap([0.1, 0.9], 20, 2.0);
        assert_relative_eq!(hm.iter().sum::<f32>(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_far_outside_point_falls_back_to_uniform() {
        let hm = gaussian_heatmap([500.0, 500.0], 4, 0.5);
        assert!(hm.iter().all(|&v| (v - 1.0 / 16.0).abs() < 1e-6));
    }

    #[test]
    fn test_targets_stack_channels() {
        let targets = heatmap_targets(&[0.5, 0.5, 0.25, 0.75], 8, 1.0);
        assert_eq!(targets.len(), 2 * 8 * 8);
    }
}
