// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate config, write train_config.json  (Layer 6)
//   Step 2: Load labels from the injected LabelSource  (Layer 3/4)
//   Step 3: Seeded train/validation split              (Layer 4)
//   Step 4: Resize (or read cached) crops, build sets  (Layer 4)
//   Step 5: Build model, optimizer and loss            (Layer 5)
//   Step 6: Run the epoch loop inside a "train" span   (Layer 5)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::{optim::AdamConfig, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    cache::ImageCache,
    dataset::KeypointDataset,
    loader::{default_dataset_root, CsvLabelSource},
    splitter::split_train_val,
};
use crate::domain::{
    keypoint::{KeypointName, CONE_KEYPOINTS},
    traits::{DatasetSplit, LabelSource},
};
use crate::infra::{
    checkpoint::{write_json, CheckpointManager},
    metrics::MetricsLogger,
};
use crate::ml::{
    loss::{CrossRatioLoss, LossConfig},
    model::{KeypointNet, KeypointNetConfig},
    trainer::{train_loop, TrainerSettings, TrainerSinks, TrainingSummary},
    TrainBackend,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters and paths for a training run.
// Written to <experiment>/train_config.json before the first epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub label_csv:           PathBuf,
    /// Defaults to the label file's directory
    pub dataset_root:        Option<PathBuf>,
    /// `None` disables the resized-image cache
    pub cache_dir:           Option<PathBuf>,
    pub output_dir:          PathBuf,
    pub resolution:          usize,
    pub keys:                Vec<KeypointName>,
    pub batch_size:          usize,
    pub epochs:              usize,
    pub checkpoint_interval: usize,
    pub lr:                  f64,
    pub lr_decay:            f64,
    pub max_tolerance:       usize,
    pub save_checkpoints:    bool,
    pub valid_fraction:      f64,
    pub seed:                u64,
    pub heatmap_sigma:       f32,
    pub channels:            usize,
    pub num_blocks:          usize,
    pub loss:                LossConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            label_csv:           PathBuf::from("dataset/labels.csv"),
            dataset_root:        None,
            cache_dir:           Some(PathBuf::from("dataset/cache")),
            output_dir:          PathBuf::from("experiments"),
            resolution:          80,
            keys:                CONE_KEYPOINTS.to_vec(),
            batch_size:          8,
            epochs:              100,
            checkpoint_interval: 4,
            lr:                  1e-3,
            lr_decay:            0.99,
            max_tolerance:       8,
            save_checkpoints:    true,
            valid_fraction:      0.15,
            seed:                42,
            heatmap_sigma:       2.0,
            channels:            32,
            num_blocks:          3,
            loss:                LossConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.keys.is_empty() {
            bail!("at least one keypoint key is required");
        }
        if self.resolution == 0 || self.batch_size == 0 {
            bail!("resolution and batch size must be positive");
        }
        if self.checkpoint_interval == 0 {
            bail!("checkpoint interval must be positive");
        }
        if !(self.lr_decay > 0.0 && self.lr_decay < 1.0) {
            bail!("lr decay must be in (0, 1), got {}", self.lr_decay);
        }
        // tolerance 0 would stop after the first epoch even on improvement
        if self.max_tolerance == 0 {
            bail!("max tolerance must be at least 1");
        }
        if !(self.valid_fraction > 0.0 && self.valid_fraction < 1.0) {
            bail!("valid fraction must be in (0, 1), got {}", self.valid_fraction);
        }
        if self.heatmap_sigma <= 0.0 {
            bail!("heatmap sigma must be positive");
        }
        Ok(())
    }

    /// The CSV label source this config describes.
    pub fn label_source(&self) -> CsvLabelSource {
        let root = self
            .dataset_root
            .clone()
            .unwrap_or_else(|| default_dataset_root(&self.label_csv));
        CsvLabelSource::new(&self.label_csv, root, self.keys.clone())
    }

    pub fn model_config(&self) -> KeypointNetConfig {
        KeypointNetConfig::new(self.keys.len(), self.resolution)
            .with_channels(self.channels)
            .with_num_blocks(self.num_blocks)
    }

    fn trainer_settings(&self) -> TrainerSettings {
        TrainerSettings {
            epochs:              self.epochs,
            batch_size:          self.batch_size,
            lr:                  self.lr,
            lr_decay:            self.lr_decay,
            max_tolerance:       self.max_tolerance,
            checkpoint_interval: self.checkpoint_interval,
            save_checkpoints:    self.save_checkpoints,
            seed:                self.seed,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config:         TrainConfig,
    experiment_dir: PathBuf,
    source:         Box<dyn LabelSource>,
}

impl TrainUseCase {
    /// `experiment_dir` must already exist; the CLI creates it so the
    /// log file can be opened before training starts. `source` must
    /// yield keypoints in `config.keys` order.
    pub fn new(config: TrainConfig, experiment_dir: PathBuf, source: Box<dyn LabelSource>) -> Self {
        Self { config, experiment_dir, source }
    }

    /// Train on the default backend.
    pub fn execute(&self) -> Result<TrainingSummary> {
        self.run::<TrainBackend>(&Default::default())
    }

    pub fn run<B: AutodiffBackend>(&self, device: &B::Device) -> Result<TrainingSummary> {
        let cfg = &self.config;

        // ── Step 1: Config ───────────────────────────────────────────────────
        cfg.validate()?;
        write_json(&self.experiment_dir.join("train_config.json"), cfg)?;

        // ── Step 2: Labels ───────────────────────────────────────────────────
        let samples = self.source.load_all()?;
        tracing::info!("Loaded {} labelled samples", samples.len());

        // ── Step 3: Split ────────────────────────────────────────────────────
        let (train, val) = split_train_val(samples, cfg.valid_fraction, cfg.seed);
        let split = DatasetSplit { train, val };
        if !split.is_usable() {
            bail!(
                "need at least one training and one validation sample, got {} / {}",
                split.train.len(),
                split.val.len()
            );
        }
        tracing::info!("Split: {} train, {} validation", split.train.len(), split.val.len());

        // ── Step 4: Datasets ─────────────────────────────────────────────────
        let cache     = ImageCache::new(cfg.cache_dir.clone(), cfg.resolution as u32);
        let train_set = KeypointDataset::prepare(&split.train, &cache, cfg.resolution, cfg.heatmap_sigma)?;
        let val_set   = KeypointDataset::prepare(&split.val,   &cache, cfg.resolution, cfg.heatmap_sigma)?;

        // ── Step 5: Model, optimizer, loss ───────────────────────────────────
        let model_cfg = cfg.model_config();
        let model: KeypointNet<B> = model_cfg.init(device);
        let optim = AdamConfig::new().init::<B, KeypointNet<B>>();
        let loss  = CrossRatioLoss::new(cfg.loss.clone(), &cfg.keys)?;
        tracing::info!(
            "Model ready: {} keypoints at {}×{}, {} channels, {} residual blocks, loss={} geo={}",
            model_cfg.num_keypoints, cfg.resolution, cfg.resolution,
            model_cfg.channels, model_cfg.num_blocks, cfg.loss.kind, cfg.loss.include_geo,
        );

        let checkpoints = CheckpointManager::new(
            self.experiment_dir.join("checkpoints"),
            model_cfg,
            cfg.keys.clone(),
        )?;
        let metrics = MetricsLogger::new(&self.experiment_dir)?;

        // ── Step 6: Epoch loop ───────────────────────────────────────────────
        let experiment = self
            .experiment_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let _span = tracing::info_span!("train", experiment = %experiment).entered();

        let (_, summary) = train_loop::<B, _, _, _>(
            &cfg.trainer_settings(),
            model,
            optim,
            &loss,
            &train_set,
            &val_set,
            &cfg.keys,
            device,
            TrainerSinks { checkpoints: Some(&checkpoints), metrics: Some(&metrics) },
        )?;
        Ok(summary)
    }
}
