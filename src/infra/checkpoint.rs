// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model + optimizer state with Burn's
// named MessagePack recorder (gzip, full precision).
//
// One directory per checkpoint:
//
//   <experiment>/checkpoints/
//     epoch_1_loss_0.412/
//       meta.json       ← epoch, val loss, model config, keys
//       model.mpk.gz    ← all learned parameters + BN statistics
//       optim.mpk.gz    ← optimizer moments
//     epoch_3_loss_0.187/
//       ...
//     latest.json       ← {"stem": "epoch_3_loss_0.187"}
//
// The model config travels inside meta.json, so inference can
// rebuild the exact architecture from the checkpoint alone.
// Full precision keeps a save → load round trip bit-identical.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::keypoint::KeypointName;
use crate::ml::model::{KeypointNet, KeypointNetConfig};

type CheckpointRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

const META_FILE:   &str = "meta.json";
const MODEL_FILE:  &str = "model";
const OPTIM_FILE:  &str = "optim";
const LATEST_FILE: &str = "latest.json";

/// Everything needed to rebuild the network a checkpoint was taken from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub epoch:    usize,
    pub val_loss: f64,
    pub model:    KeypointNetConfig,
    pub keys:     Vec<KeypointName>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LatestPointer {
    stem: String,
}

/// `epoch_<E>_loss_<L:.3>`
pub fn checkpoint_stem(epoch: usize, val_loss: f64) -> String {
    format!("epoch_{epoch}_loss_{val_loss:.3}")
}

/// Writes checkpoints for one training run.
pub struct CheckpointManager {
    dir:       PathBuf,
    model_cfg: KeypointNetConfig,
    keys:      Vec<KeypointName>,
}

impl CheckpointManager {
    /// Creates `dir` if it doesn't already exist.
    pub fn new(
        dir:       impl Into<PathBuf>,
        model_cfg: KeypointNetConfig,
        keys:      Vec<KeypointName>,
    ) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir, model_cfg, keys })
    }

    /// Save model + optimizer state for `epoch`, then move `latest.json`.
    /// Returns the checkpoint directory.
    pub fn save<B, M, O>(
        &self,
        epoch:    usize,
        val_loss: f64,
        model:    &M,
        optim:    &O,
    ) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let stem = checkpoint_stem(epoch, val_loss);
        let dir  = self.dir.join(&stem);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let recorder = CheckpointRecorder::new();
        Recorder::<B>::record(&recorder, model.clone().into_record(), dir.join(MODEL_FILE))
            .with_context(|| format!("Failed to save model weights to '{}'", dir.display()))?;
        Recorder::<B>::record(&recorder, optim.to_record(), dir.join(OPTIM_FILE))
            .with_context(|| format!("Failed to save optimizer state to '{}'", dir.display()))?;

        let meta = CheckpointMeta {
            epoch,
            val_loss,
            model: self.model_cfg.clone(),
            keys:  self.keys.clone(),
        };
        write_json(&dir.join(META_FILE), &meta)?;
        write_json(&self.dir.join(LATEST_FILE), &LatestPointer { stem: stem.clone() })?;

        tracing::info!(epoch, val_loss, checkpoint = %stem, "Checkpoint saved");
        Ok(dir)
    }
}

/// Accepts a checkpoint directory or a checkpoints root holding
/// `latest.json`, and returns the checkpoint directory.
pub fn resolve_checkpoint(path: &Path) -> Result<PathBuf> {
    if path.join(META_FILE).is_file() {
        return Ok(path.to_path_buf());
    }
    let latest = path.join(LATEST_FILE);
    if latest.is_file() {
        let pointer: LatestPointer = read_json(&latest)?;
        return Ok(path.join(pointer.stem));
    }
    anyhow::bail!(
        "'{}' is neither a checkpoint directory nor a checkpoints root. \
         Have you run 'train' with checkpoints enabled?",
        path.display()
    )
}

pub fn load_meta(checkpoint_dir: &Path) -> Result<CheckpointMeta> {
    read_json(&checkpoint_dir.join(META_FILE))
}

/// Rebuild the network from `meta.json` and load its weights.
/// Fails when the stored parameters don't match the architecture.
pub fn load_model<B: Backend>(
    checkpoint_dir: &Path,
    device:         &B::Device,
) -> Result<(KeypointNet<B>, CheckpointMeta)> {
    let meta  = load_meta(checkpoint_dir)?;
    let model: KeypointNet<B> = meta.model.init(device);

    let path   = checkpoint_dir.join(MODEL_FILE);
    let record = Recorder::<B>::load(&CheckpointRecorder::new(), path.clone(), device)
        .with_context(|| format!("Cannot load model weights from '{}'", path.display()))?;

    tracing::info!(epoch = meta.epoch, val_loss = meta.val_loss, "Loaded checkpoint '{}'", checkpoint_dir.display());
    Ok((model.load_record(record), meta))
}

// ─── JSON helpers ────────────────────────────────────────────────────────────

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Malformed JSON in '{}'", path.display()))
}
