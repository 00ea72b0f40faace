// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `prepare` — raw recordings → prepared training samples
//   2. `train`   — trains a network, keeps the best checkpoint
//   3. `predict` — reloads a run and renders prediction images
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, PrepareArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "cellseg",
    version = "0.1.0",
    about = "Train image-to-image networks for cell region proposal and whisker segmentation."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare(args) => run_prepare(args),
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    use crate::application::prepare_use_case::PrepareUseCase;

    tracing::info!("Preparing recordings from: {}", args.raw_dir);
    let written = PrepareUseCase::new(args.into()).execute()?;

    println!("Prepared {} samples.", written.len());
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting {} training on samples in: {}", args.architecture, args.data_dir);
    let (run_dir, outcome) = TrainUseCase::new(args.into()).execute()?;

    match outcome.best_epoch {
        Some(epoch) => println!(
            "Training complete. Best val_loss {:.6} at epoch {}, saved in {}",
            outcome.best_loss, epoch, run_dir.display()
        ),
        None => println!("Training complete without an improving epoch ({}).", run_dir.display()),
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let written = PredictUseCase::new(args.into()).execute()?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}
