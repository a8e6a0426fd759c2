// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `infer`, and all
// their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, KeypointName,
//     LossKind, ...) through each type's FromStr
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{ArgAction, Args, Subcommand};
use std::path::PathBuf;

use crate::application::{infer_use_case::InferConfig, train_use_case::TrainConfig};
use crate::domain::keypoint::{KeypointName, CONE_KEYPOINTS};
use crate::ml::loss::{LossConfig, LossKind, CONE_CROSS_RATIO};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the keypoint network on a labelled cone dataset
    Train(TrainArgs),

    /// Run a trained checkpoint on one image and write visualisations
    Infer(InferArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Label CSV: a `Name` column plus one "[x, y]" column per keypoint
    #[arg(long, default_value = "dataset/labels.csv")]
    pub label_csv: PathBuf,

    /// Directory image names are relative to (default: the CSV's directory)
    #[arg(long)]
    pub dataset_root: Option<PathBuf>,

    /// Where resized images are cached between runs
    #[arg(long, default_value = "dataset/cache")]
    pub cache_dir: PathBuf,

    /// Disable the resized-image cache
    #[arg(long)]
    pub no_cache: bool,

    /// Each run writes to <output-dir>/<YYYYmmdd_HHMMSS>/
    #[arg(long, default_value = "experiments")]
    pub output_dir: PathBuf,

    /// Square input resolution of the network
    #[arg(long, default_value_t = 80)]
    pub resolution: usize,

    /// Ordered keypoint columns to train on
    #[arg(long, value_delimiter = ',', default_values_t = CONE_KEYPOINTS.to_vec())]
    pub keys: Vec<KeypointName>,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    /// Checkpoint when (epoch + 1) is a multiple of this (0-based epochs)
    #[arg(long, default_value_t = 4)]
    pub checkpoint_interval: usize,

    /// Initial learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Learning rate multiplier applied once per epoch, in (0, 1)
    #[arg(long, default_value_t = 0.99)]
    pub lr_decay: f64,

    /// Stop after this many epochs without a lower validation loss (>= 1)
    #[arg(long, default_value_t = 8)]
    pub max_tolerance: usize,

    /// Write model/optimizer checkpoints (true|false)
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub save_checkpoints: bool,

    /// Location loss: l1_softargmax | l2_softargmax | l2_heatmap
    #[arg(long, default_value = "l1_softargmax")]
    pub loss_type: LossKind,

    /// Add the cross-ratio geometric term (true|false)
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub include_geo: bool,

    #[arg(long, default_value_t = 1.0)]
    pub loc_weight: f32,

    #[arg(long, default_value_t = 0.01)]
    pub geo_weight: f32,

    /// Target cross ratio of a cone edge
    #[arg(long, default_value_t = CONE_CROSS_RATIO)]
    pub cross_ratio: f32,

    /// Share of samples held out for validation
    #[arg(long, default_value_t = 0.15)]
    pub valid_fraction: f64,

    /// Seed for the split and the batch shuffle
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Gaussian σ of the heatmap targets, in pixels at --resolution
    #[arg(long, default_value_t = 2.0)]
    pub heatmap_sigma: f32,

    /// Convolution width of the network
    #[arg(long, default_value_t = 32)]
    pub channels: usize,

    /// Number of residual blocks
    #[arg(long, default_value_t = 3)]
    pub num_blocks: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            label_csv:           a.label_csv,
            dataset_root:        a.dataset_root,
            cache_dir:           (!a.no_cache).then_some(a.cache_dir),
            output_dir:          a.output_dir,
            resolution:          a.resolution,
            keys:                a.keys,
            batch_size:          a.batch_size,
            epochs:              a.epochs,
            checkpoint_interval: a.checkpoint_interval,
            lr:                  a.lr,
            lr_decay:            a.lr_decay,
            max_tolerance:       a.max_tolerance,
            save_checkpoints:    a.save_checkpoints,
            valid_fraction:      a.valid_fraction,
            seed:                a.seed,
            heatmap_sigma:       a.heatmap_sigma,
            channels:            a.channels,
            num_blocks:          a.num_blocks,
            loss: LossConfig {
                kind:        a.loss_type,
                include_geo: a.include_geo,
                loc_weight:  a.loc_weight,
                geo_weight:  a.geo_weight,
                cross_ratio: a.cross_ratio,
            },
        }
    }
}

/// All arguments for the `infer` command
#[derive(Args, Debug)]
pub struct InferArgs {
    /// Checkpoint directory, or a checkpoints root (follows latest.json)
    #[arg(long)]
    pub checkpoint: PathBuf,

    /// Image to run the model on
    #[arg(long)]
    pub image: PathBuf,

    /// Where <stem>_heatmap.png and <stem>_inference.png are written
    #[arg(long, default_value = "inference")]
    pub output_dir: PathBuf,
}

impl From<InferArgs> for InferConfig {
    fn from(a: InferArgs) -> Self {
        InferConfig {
            checkpoint: a.checkpoint,
            image:      a.image,
            output_dir: a.output_dir,
        }
    }
}
