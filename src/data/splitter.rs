// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles samples and splits them into two sets:
//   - Training set:   used to update model weights
//   - Validation set: drives early stopping and checkpoint names
//
// The shuffle is seeded so a run can be repeated with the same
// split. Uses Fisher-Yates via rand::seq::SliceRandom.
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// # Arguments
/// * `samples`        - All available samples (consumed by this function)
/// * `valid_fraction` - Proportion held out for validation, e.g. 0.15
/// * `seed`           - Shuffle seed
pub fn split_train_val<T>(mut samples: Vec<T>, valid_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    // e.g. 100 samples * 0.15 = 15 → last 15 are validation
    let total    = samples.len();
    let n_val    = ((total as f64) * valid_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = total - n_val.min(total);

    // split_off(n) removes elements [n..] from the Vec and returns them
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}
