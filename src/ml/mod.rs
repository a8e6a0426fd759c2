// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Network, loss, training loop, evaluation and inference.
//
//   interfaces.rs — KeypointEstimator / KeypointLoss contracts
//                   the training loop is written against
//
//   model.rs      — KeypointNet: conv stem, residual blocks at
//                   full resolution, 1×1 head, spatial softmax
//                   heatmaps and soft-argmax points
//
//   loss.rs       — location loss (l1/l2 soft-argmax or l2
//                   heatmap) plus the cross-ratio penalty
//
//   trainer.rs    — epoch loop: train sweep, validation sweep,
//                   early stopping, LR decay, checkpoints
//
//   evaluator.rs  — per-keypoint pixel error on validation
//
//   inferencer.rs — checkpoint → single-image prediction
//
// Backends: Wgpu when the `wgpu` feature is on (default),
// NdArray on the CPU otherwise. Training wraps the backend in
// Autodiff; validation and inference run on the inner backend.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Nibali et al. (2018) Numerical Coordinate Regression
//            with Convolutional Neural Networks

/// Model and loss contracts
pub mod interfaces;

/// Keypoint network architecture
pub mod model;

/// Composite location + cross-ratio loss
pub mod loss;

/// Training loop with validation, early stopping and checkpointing
pub mod trainer;

/// Validation pixel error
pub mod evaluator;

/// Inference engine — loads checkpoint and predicts keypoints
pub mod inferencer;

#[cfg(feature = "wgpu")]
pub type DefaultBackend = burn::backend::Wgpu;

#[cfg(not(feature = "wgpu"))]
pub type DefaultBackend = burn::backend::NdArray;

pub type TrainBackend = burn::backend::Autodiff<DefaultBackend>;
