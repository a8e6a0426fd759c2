// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the label CSV to device-ready tensor batches.
//
//   labels.csv + images
//       │
//       ▼
//   CsvLabelSource    → parses rows, reads image sizes
//       │
//       ▼
//   split_train_val   → seeded shuffle, validation hold-out
//       │
//       ▼
//   ImageCache        → resized crops, cached as PNG
//       │
//       ▼
//   KeypointDataset   → (image, heatmaps, points, name, meta)
//       │
//       ▼
//   KeypointBatcher   → stacks items into tensors
//
// Reference: Burn Book §4 (Datasets)

/// Reads the label CSV
pub mod loader;

/// Seeded train/validation split
pub mod splitter;

/// Resize + CHW float conversion shared with inference
pub mod preprocessor;

/// Gaussian heatmap targets
pub mod heatmap;

/// On-disk cache of resized images
pub mod cache;

/// Burn Dataset over prepared samples
pub mod dataset;

/// Tensor batches and the per-epoch batch plan
pub mod batcher;
