// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains the keypoint network on a label CSV
//   2. `infer` — loads a checkpoint and visualises one image
//
// Logging is installed here rather than in main: a training run
// first needs its experiment directory so train.log can live
// next to the metrics and checkpoints.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InferArgs, TrainArgs};

use crate::infra::logging::{create_experiment_dir, init_logging};

#[derive(Parser, Debug)]
#[command(
    name = "cone-keypoints",
    version,
    about = "Train a cone keypoint network, then run it on single images."
)]
pub struct Cli {
    /// The subcommand to run (train or infer)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Infer(args) => run_infer(args),
        }
    }
}

/// Handles the `train` subcommand.
fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::{TrainConfig, TrainUseCase};

    let config: TrainConfig = args.into();
    let experiment = create_experiment_dir(&config.output_dir, chrono::Local::now())?;
    // dropping the guard flushes train.log
    let _guard = init_logging(Some(&experiment))?;
    tracing::info!("Experiment directory: '{}'", experiment.display());

    let source  = config.label_source();
    let summary = TrainUseCase::new(config, experiment.clone(), Box::new(source)).execute()?;

    match summary.state.best_epoch {
        Some(epoch) => println!(
            "Training finished after {} epochs{}. Best validation loss {:.4} at epoch {}.",
            summary.epochs_run,
            if summary.stopped_early() { " (early stop)" } else { "" },
            summary.state.best_val_loss,
            epoch,
        ),
        None => println!("Training finished after {} epochs without a finite validation loss.", summary.epochs_run),
    }
    println!("Artifacts in '{}'", experiment.display());
    Ok(())
}

/// Handles the `infer` subcommand.
fn run_infer(args: InferArgs) -> Result<()> {
    use crate::application::infer_use_case::InferUseCase;

    let _guard  = init_logging(None)?;
    let outputs = InferUseCase::new(args.into()).execute()?;

    for (name, [x, y]) in &outputs.keypoints {
        println!("{name:>10}: ({x:.1}, {y:.1})");
    }
    if !outputs.flat_channels.is_empty() {
        println!("Constant heatmap channels (rendered blank): {:?}", outputs.flat_channels);
    }
    println!("Heatmaps: '{}'", outputs.heatmap_path.display());
    println!("Overlay:  '{}'", outputs.overlay_path.display());
    Ok(())
}
