// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `prepare`, `train` and `predict`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, Architecture, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{
    predict_use_case::PredictConfig,
    prepare_use_case::PrepareConfig,
    train_use_case::TrainConfig,
};
use crate::ml::model::Architecture;

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Turn labelled raw recordings into training samples
    Prepare(PrepareArgs),

    /// Train a network on prepared samples
    Train(TrainArgs),

    /// Render predictions of a trained run
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Folder with one sub-folder per labelled recording
    #[arg(long, default_value = "data/raw")]
    pub raw_dir: String,

    /// Root data folder; samples go to <data_dir>/training_data
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Recordings to prepare (default: all sub-folders)
    #[arg(long, value_delimiter = ',')]
    pub datasets: Vec<String>,

    /// Evenly spaced frames used for summary images, 0 for all
    #[arg(long, default_value_t = 1000)]
    pub frames: usize,

    #[arg(long, default_value_t = 2)]
    pub centroid_radius: u32,

    #[arg(long, default_value_t = 2)]
    pub border_thickness: u32,

    /// Skip the preview PNGs
    #[arg(long)]
    pub no_previews: bool,

    #[arg(long, default_value_t = 800)]
    pub preview_height: u32,

    /// TrueType font used to title preview columns with channel names
    #[arg(long)]
    pub title_font: Option<String>,
}

impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            raw_dir:          a.raw_dir,
            data_dir:         a.data_dir,
            datasets:         a.datasets,
            frames:           a.frames,
            centroid_radius:  a.centroid_radius,
            border_thickness: a.border_thickness,
            write_previews:   !a.no_previews,
            preview_height:   a.preview_height,
            title_font:       a.title_font,
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Root data folder (samples in training_data/, runs in models/)
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Samples to train on (default: automatic split)
    #[arg(long, value_delimiter = ',')]
    pub train_datasets: Vec<String>,

    /// Samples to validate on (default: automatic split)
    #[arg(long, value_delimiter = ',')]
    pub test_datasets: Vec<String>,

    /// Fraction of samples used for training in the automatic split
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    /// unet, leap, hourglass or stacked-hourglass
    #[arg(long, default_value = "unet")]
    pub architecture: Architecture,

    /// Filters of the first level; deeper levels multiply it
    #[arg(long, default_value_t = 16)]
    pub filters: usize,

    /// Pooling levels of unet / hourglass
    #[arg(long, default_value_t = 4)]
    pub depth: usize,

    #[arg(long)]
    pub batch_norm: bool,

    /// Subtract a Gaussian blur of this width from the inputs (unet), 0 disables
    #[arg(long, default_value_t = 0.0)]
    pub high_pass_sigma: f64,

    /// Nearest-neighbour up-sampling instead of transposed convolutions (hourglass)
    #[arg(long)]
    pub upsampling_layers: bool,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    /// Maximum number of epochs
    #[arg(long, default_value_t = 1000)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Epochs without validation improvement before stopping
    #[arg(long, default_value_t = 3)]
    pub early_stopping: usize,

    /// Smallest val_loss decrease that counts as an improvement
    #[arg(long, default_value_t = 0.0)]
    pub min_delta: f64,

    #[arg(long, default_value_t = 2)]
    pub num_workers: usize,

    #[arg(long, default_value_t = 160)]
    pub subframe_rows: usize,

    #[arg(long, default_value_t = 160)]
    pub subframe_cols: usize,

    /// Random windows per epoch
    #[arg(long, default_value_t = 1024)]
    pub epoch_size: usize,

    /// Keep raw intensities instead of z-scoring every window
    #[arg(long)]
    pub no_normalize: bool,

    #[arg(long)]
    pub no_rotation: bool,

    #[arg(long, default_value_t = 0.75)]
    pub scale_min: f32,

    #[arg(long, default_value_t = 1.25)]
    pub scale_max: f32,

    /// Only render predictions once training is done
    #[arg(long)]
    pub final_predictions_only: bool,

    /// Experiment tracking endpoint receiving per-epoch JSON
    #[arg(long)]
    pub tracker_url: Option<String>,

    #[arg(long, env = "CELLSEG_TRACKER_KEY")]
    pub tracker_key: Option<String>,

    #[arg(long, default_value = "giterdone")]
    pub tracker_tag: String,

    /// Train on the CPU (NdArray) instead of the GPU (WGPU)
    #[arg(long)]
    pub cpu: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:          a.data_dir,
            train_datasets:    a.train_datasets,
            test_datasets:     a.test_datasets,
            train_fraction:    a.train_fraction,
            architecture:      a.architecture,
            filters:           a.filters,
            depth:             a.depth,
            batch_norm:        a.batch_norm,
            high_pass_sigma:   a.high_pass_sigma,
            upsampling_layers: a.upsampling_layers,
            batch_size:        a.batch_size,
            epochs:            a.epochs,
            lr:                a.lr,
            early_stopping:    a.early_stopping,
            min_delta:         a.min_delta,
            num_workers:       a.num_workers,
            subframe_size:       (a.subframe_rows, a.subframe_cols),
            epoch_size:          a.epoch_size,
            normalize_subframes: !a.no_normalize,
            aug_rotation:        !a.no_rotation,
            aug_scaling:         (a.scale_min, a.scale_max),
            save_predictions_during_training: !a.final_predictions_only,
            tracker_endpoint:  a.tracker_url,
            tracker_api_key:   a.tracker_key,
            tracker_tag:       a.tracker_tag,
            use_cpu:           a.cpu,
            ..TrainConfig::default()
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Run directory created by `train` (data/models/<timestamp>)
    #[arg(long)]
    pub run_dir: String,

    /// Samples to predict (default: the run's test samples)
    #[arg(long, value_delimiter = ',')]
    pub datasets: Vec<String>,

    /// Output folder (default: <run_dir>/predictions)
    #[arg(long)]
    pub out_dir: Option<String>,

    #[arg(long, default_value_t = 800)]
    pub height: u32,

    /// Lower input percentile for contrast enhancement
    #[arg(long, default_value_t = 0.0)]
    pub contrast_low: f64,

    /// Upper input percentile for contrast enhancement
    #[arg(long, default_value_t = 100.0)]
    pub contrast_high: f64,

    #[arg(long)]
    pub cpu: bool,
}

impl From<PredictArgs> for PredictConfig {
    fn from(a: PredictArgs) -> Self {
        PredictConfig {
            run_dir:    a.run_dir,
            datasets:   a.datasets,
            out_dir:    a.out_dir,
            height:     a.height,
            x_contrast: (a.contrast_low, a.contrast_high),
            use_cpu:    a.cpu,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_args_map_to_config() {
        let cli = Cli::try_parse_from([
            "cellseg", "train",
            "--architecture", "stacked-hourglass",
            "--subframe-rows", "128",
            "--train-datasets", "a,b",
            "--test-datasets", "c",
            "--no-rotation",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.architecture, Architecture::StackedHourglass);
        assert_eq!(cfg.subframe_size, (128, 160));
        assert_eq!(cfg.train_datasets, vec!["a", "b"]);
        assert!(!cfg.aug_rotation);
        assert!(cfg.save_predictions_during_training);
    }

    #[test]
    fn test_unknown_architecture_is_rejected() {
        assert!(Cli::try_parse_from(["cellseg", "train", "--architecture", "resnet"]).is_err());
    }

    #[test]
    fn test_predict_requires_run_dir() {
        assert!(Cli::try_parse_from(["cellseg", "predict"]).is_err());
        let cli = Cli::try_parse_from(["cellseg", "predict", "--run-dir", "data/models/x"]).unwrap();
        let Commands::Predict(args) = cli.command else { panic!("expected predict") };
        let cfg: PredictConfig = args.into();
        assert_eq!(cfg.x_contrast, (0.0, 100.0));
        assert!(cfg.out_dir.is_none());
    }
}
