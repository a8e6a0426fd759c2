// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer only talks to a label source through
// this trait: TrainUseCase receives a Box<dyn LabelSource>.
// CsvLabelSource is the production implementation; the use-case
// tests drive training from an in-memory source.
//
// The model and loss contracts live in ml::interfaces because
// they are expressed in Burn tensor types.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::sample::LabelledSample;

// ─── LabelSource ──────────────────────────────────────────────────────────────
/// Any component that can produce labelled cone samples.
pub trait LabelSource {
    /// Load every labelled sample, keypoints in the configured key order.
    fn load_all(&self) -> Result<Vec<LabelledSample>>;
}

// ─── DatasetSplit ─────────────────────────────────────────────────────────────
/// Training and validation samples after shuffling.
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub train: Vec<LabelledSample>,
    pub val:   Vec<LabelledSample>,
}

impl DatasetSplit {
    pub fn is_usable(&self) -> bool {
        !self.train.is_empty() && !self.val.is_empty()
    }
}
