// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop with validation, early stopping and checkpointing.
//
// Per epoch:
//   1. lr = lr₀ · decay^epoch
//   2. shuffled batch sweep on the autodiff model:
//        forward → three-part loss → backward → optimizer step
//   3. validation sweep on model.valid() (inner backend, no
//      gradients, batch norm on running statistics)
//   4. pixel error per keypoint on the validation set
//   5. TrainingState::observe(val_total) → Improved / Stalled /
//      Stopped
//   6. metrics row, then a checkpoint when the schedule says so
//
// Gradients are consumed by the optimizer step, so nothing has
// to be zeroed between batches.
//
// The loop is written against KeypointEstimator and
// KeypointLoss, so any network / loss pair can be trained.
//
// Reference: Burn Book §5 (Custom Training Loop)

use anyhow::{anyhow, Result};
use burn::{
    data::dataset::Dataset,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::data::{
    batcher::{batch_plan, KeypointBatcher},
    dataset::{KeypointDataset, KeypointItem},
};
use crate::domain::{
    keypoint::KeypointName,
    training_state::{should_checkpoint, TrainingState},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, LossTriple, MetricsLogger},
};
use crate::ml::{
    evaluator::{PixelErrorAccumulator, PixelErrorReport},
    interfaces::{KeypointEstimator, KeypointLoss},
};

/// Loop knobs, taken from TrainConfig.
#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub epochs:              usize,
    pub batch_size:          usize,
    pub lr:                  f64,
    pub lr_decay:            f64,
    pub max_tolerance:       usize,
    pub checkpoint_interval: usize,
    pub save_checkpoints:    bool,
    pub seed:                u64,
}

/// Where per-epoch results go. Both are optional so the loop can run bare.
#[derive(Default)]
pub struct TrainerSinks<'a> {
    pub checkpoints: Option<&'a CheckpointManager>,
    pub metrics:     Option<&'a MetricsLogger>,
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub state:       TrainingState,
    pub epochs_run:  usize,
    pub last_report: Option<PixelErrorReport>,
}

impl TrainingSummary {
    pub fn stopped_early(&self) -> bool {
        self.state.is_stopped()
    }
}

/// Learning rate for a 0-based epoch.
pub fn epoch_lr(base: f64, decay: f64, epoch: usize) -> f64 {
    base * decay.powi(epoch as i32)
}

// ─── Loss accumulator ────────────────────────────────────────────────────────
/// Sums (location, geometric, total) over batches, then averages.
#[derive(Debug, Default, Clone, Copy)]
struct LossSums {
    sums:    [f64; 3],
    batches: usize,
}

impl LossSums {
    fn add(&mut self, values: [f64; 3]) {
        for (s, v) in self.sums.iter_mut().zip(values) {
            *s += v;
        }
        self.batches += 1;
    }

    fn mean(&self) -> LossTriple {
        if self.batches == 0 {
            return LossTriple::from_values([f64::NAN; 3]);
        }
        let n = self.batches as f64;
        LossTriple::from_values(self.sums.map(|s| s / n))
    }
}

fn fetch(dataset: &KeypointDataset, indices: &[usize]) -> Result<Vec<KeypointItem>> {
    indices
        .iter()
        .map(|&i| dataset.get(i).ok_or_else(|| anyhow!("dataset index {i} out of range")))
        .collect()
}

// ─── Epoch loop ──────────────────────────────────────────────────────────────

/// Train until `settings.epochs` or early stop; returns the final model.
#[allow(clippy::too_many_arguments)]
pub fn train_loop<B, M, L, O>(
    settings:  &TrainerSettings,
    mut model: M,
    mut optim: O,
    loss:      &L,
    train_set: &KeypointDataset,
    val_set:   &KeypointDataset,
    keys:      &[KeypointName],
    device:    &B::Device,
    sinks:     TrainerSinks<'_>,
) -> Result<(M, TrainingSummary)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + KeypointEstimator<B>,
    M::InnerModule: KeypointEstimator<B::InnerBackend>,
    L: KeypointLoss,
    O: Optimizer<M, B>,
{
    let resolution = train_set.resolution();
    let k          = keys.len();

    // Autodiff batches for training, inner-backend batches for validation
    let train_batcher = KeypointBatcher::<B>::new(device.clone(), resolution, k);
    let val_batcher   = KeypointBatcher::<B::InnerBackend>::new(device.clone(), resolution, k);

    let mut rng         = StdRng::seed_from_u64(settings.seed);
    let mut state       = TrainingState::default();
    let mut epochs_run  = 0usize;
    let mut last_report = None;

    for epoch in 0..settings.epochs {
        let lr = epoch_lr(settings.lr, settings.lr_decay, epoch);

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_sums = LossSums::default();
        for indices in batch_plan(train_set.len(), settings.batch_size, Some(&mut rng)) {
            let batch  = train_batcher.batch(fetch(train_set, &indices)?);
            let output = model.estimate(batch.images);
            let parts  = loss.compute(&output, batch.heatmaps, batch.points);
            train_sums.add(parts.values());

            let grads = parts.total.backward();
            let grads = GradientsParams::from_grads::<B, M>(grads, &model);
            model = optim.step(lr, model, grads);
        }
        let train_loss = train_sums.mean();

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let mut val_sums = LossSums::default();
        let mut pixel    = PixelErrorAccumulator::new(k, resolution);

        for indices in batch_plan(val_set.len(), settings.batch_size, None) {
            let batch  = val_batcher.batch(fetch(val_set, &indices)?);
            let output = model_valid.estimate(batch.images);
            pixel.update(output.points.clone(), batch.points.clone(), &batch.names)?;
            val_sums.add(loss.compute(&output, batch.heatmaps, batch.points).values());
        }
        let val_loss = val_sums.mean();
        let report   = pixel.finish(keys);

        // ── Bookkeeping ───────────────────────────────────────────────────────
        state = state.observe(epoch, val_loss.total, settings.max_tolerance);
        epochs_run += 1;

        tracing::info!(
            epoch,
            lr,
            phase = state.phase.as_str(),
            tolerance = state.tolerance,
            "train loc={:.4} geo={:.4} total={:.4} | val loc={:.4} geo={:.4} total={:.4} | px={:.2}",
            train_loss.location, train_loss.geometric, train_loss.total,
            val_loss.location, val_loss.geometric, val_loss.total,
            report.mean,
        );
        tracing::debug!(epoch, "pixel error per keypoint: {}", report.summary());
        if let Some((name, err)) = &report.worst {
            tracing::debug!(epoch, "worst validation sample: '{name}' at {err:.2} px");
        }

        if let Some(metrics) = sinks.metrics {
            metrics.log(&EpochMetrics::new(
                epoch, lr, train_loss, val_loss, report.mean, state.phase.as_str(),
            ))?;
        }

        if should_checkpoint(settings.save_checkpoints, epoch, settings.checkpoint_interval) {
            if let Some(checkpoints) = sinks.checkpoints {
                checkpoints.save::<B, M, O>(epoch, val_loss.total, &model, &optim)?;
            }
        }

        last_report = Some(report);

        if state.is_stopped() {
            tracing::info!(
                epoch,
                best_epoch = ?state.best_epoch,
                "No improvement for {} epochs, stopping early",
                state.tolerance,
            );
            break;
        }
    }

    tracing::info!(
        best_epoch = ?state.best_epoch,
        best_val_loss = state.best_val_loss,
        epochs_run,
        "Training complete"
    );
    Ok((model, TrainingSummary { state, epochs_run, last_report }))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::ImageCache;
    use crate::domain::{
        keypoint::{Keypoint, CONE_KEYPOINTS},
        sample::{LabelledSample, SampleMeta},
        training_state::Phase,
    };
    use crate::ml::{
        interfaces::{KeypointOutput, LossParts},
        loss::{CrossRatioLoss, LossConfig},
        model::{KeypointNet, KeypointNetConfig},
    };
    use approx::assert_relative_eq;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamConfig,
        prelude::*,
    };
    use image::{Rgb, RgbImage};

    type TB = Autodiff<NdArray>;

    const RES: usize = 8;

    /// `n` 16×16 crops with a cone-shaped label set.
    fn tiny_dataset(dir: &std::path::Path, n: usize) -> KeypointDataset {
        let coords = [
            (8.0, 1.0),
            (6.0, 6.0), (10.0, 6.0),
            (4.0, 11.0), (12.0, 11.0),
            (2.0, 15.0), (14.0, 15.0),
        ];
        let samples: Vec<LabelledSample> = (0..n)
            .map(|i| {
                let path = dir.join(format!("cone_{i}.png"));
                let img  = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, (i * 40) as u8]));
                img.save(&path).unwrap();
                LabelledSample {
                    name: format!("cone_{i}.png"),
                    path,
                    keypoints: CONE_KEYPOINTS
                        .iter()
                        .zip(coords)
                        .map(|(&k, (x, y))| Keypoint::new(k, x, y))
                        .collect(),
                    meta: SampleMeta { width: 16, height: 16 },
                }
            })
            .collect();
        KeypointDataset::prepare(&samples, &ImageCache::new(None, RES as u32), RES, 1.0).unwrap()
    }

    fn settings(epochs: usize) -> TrainerSettings {
        TrainerSettings {
            epochs,
            batch_size:          3,
            lr:                  1e-3,
            lr_decay:            0.9,
            max_tolerance:       10,
            checkpoint_interval: 2,
            save_checkpoints:    true,
            seed:                7,
        }
    }

    /// Differentiable but input-independent: validation loss is always 1.
    struct ConstantLoss;

    impl KeypointLoss for ConstantLoss {
        fn compute<B: Backend>(
            &self,
            output:           &KeypointOutput<B>,
            _target_heatmaps: Tensor<B, 4>,
            _target_points:   Tensor<B, 3>,
        ) -> LossParts<B> {
            let total = output.points.clone().mean().mul_scalar(0.0).add_scalar(1.0);
            LossParts { location: total.clone(), geometric: total.clone() * 0.0, total }
        }
    }

    #[test]
    fn test_epoch_lr_decays_geometrically() {
        assert_relative_eq!(epoch_lr(0.1, 0.5, 0), 0.1);
        assert_relative_eq!(epoch_lr(0.1, 0.5, 3), 0.0125);
    }

    #[test]
    fn test_loss_sums_average_by_batch_count() {
        let mut sums = LossSums::default();
        assert!(sums.mean().total.is_nan());
        sums.add([1.0, 2.0, 3.0]);
        sums.add([3.0, 4.0, 5.0]);
        assert_eq!(sums.mean(), LossTriple { location: 2.0, geometric: 3.0, total: 4.0 });
    }

    #[test]
    fn test_train_loop_checkpoints_on_schedule() {
        let tmp    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let train  = tiny_dataset(tmp.path(), 5);
        let val    = tiny_dataset(tmp.path(), 2);

        let cfg   = KeypointNetConfig::new(7, RES).with_channels(2).with_num_blocks(1);
        let model: KeypointNet<TB> = cfg.init(&device);
        let optim = AdamConfig::new().init::<TB, KeypointNet<TB>>();
        let loss  = CrossRatioLoss::new(LossConfig::default(), &CONE_KEYPOINTS).unwrap();

        let ckpt_dir = tmp.path().join("checkpoints");
        let ckpt     = CheckpointManager::new(&ckpt_dir, cfg, CONE_KEYPOINTS.to_vec()).unwrap();
        let metrics  = MetricsLogger::new(tmp.path()).unwrap();

        let (_, summary) = train_loop::<TB, _, _, _>(
            &settings(4),
            model,
            optim,
            &loss,
            &train,
            &val,
            &CONE_KEYPOINTS,
            &device,
            TrainerSinks { checkpoints: Some(&ckpt), metrics: Some(&metrics) },
        )
        .unwrap();

        assert_eq!(summary.epochs_run, 4);
        assert!(!summary.stopped_early());
        assert!(summary.state.best_epoch.is_some());
        assert_eq!(summary.last_report.unwrap().samples, 2);

        let mut saved: Vec<String> = std::fs::read_dir(&ckpt_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        saved.sort();
        assert_eq!(saved.len(), 2);
        assert!(saved[0].starts_with("epoch_1_loss_"));
        assert!(saved[1].starts_with("epoch_3_loss_"));

        let rows = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(rows.lines().count(), 5);
    }

    #[test]
    fn test_train_loop_stops_after_max_tolerance() {
        let tmp    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let train  = tiny_dataset(tmp.path(), 2);
        let val    = tiny_dataset(tmp.path(), 1);

        let model: KeypointNet<TB> = KeypointNetConfig::new(7, RES)
            .with_channels(2)
            .with_num_blocks(0)
            .init(&device);
        let optim = AdamConfig::new().init::<TB, KeypointNet<TB>>();

        let mut s = settings(10);
        s.max_tolerance = 2;

        let (_, summary) = train_loop::<TB, _, _, _>(
            &s, model, optim, &ConstantLoss, &train, &val, &CONE_KEYPOINTS, &device,
            TrainerSinks::default(),
        )
        .unwrap();

        // epoch 0 improves on +inf, epochs 1 and 2 stall
        assert_eq!(summary.epochs_run, 3);
        assert!(summary.stopped_early());
        assert_eq!(summary.state.phase, Phase::Stopped);
        assert_eq!(summary.state.best_epoch, Some(0));
        assert_relative_eq!(summary.state.best_val_loss, 1.0);
    }
}
