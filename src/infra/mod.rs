// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the training and inference
// workflows:
//
//   checkpoint.rs — model + optimizer records and the meta.json
//                   that lets inference rebuild the network
//
//   metrics.rs    — one CSV row of losses, learning rate and
//                   pixel error per epoch
//
//   logging.rs    — tracing subscriber (console + train.log)
//                   and timestamped experiment directories
//
//   visualize.rs  — heatmap stack and keypoint overlay images
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Subscriber setup and experiment directories
pub mod logging;

/// Heatmap and overlay rendering
pub mod visualize;
