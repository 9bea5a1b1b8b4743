// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `submit` and `runs`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::experiment_runner::ExperimentConfig;
use crate::application::submission::SubmitConfig;
use crate::data::augmenter::AugmentConfig;
use crate::domain::labels::ImageShape;
use crate::ml::model::GraphemeCnnConfig;

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the CNN shard by shard, tracking every epoch
    Train(TrainArgs),

    /// Predict the test shards with the latest checkpoint
    Submit(SubmitArgs),

    /// Summarise the final accuracies of all tracked runs
    Runs(RunsArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Experiment name; runs with the same name share an experiment id
    #[arg(long, default_value = "grapheme_cnn")]
    pub name: String,

    /// Directory containing train_image_data_{i}.parquet
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Label CSV (image_id, grapheme_root, vowel_diacritic, consonant_diacritic)
    #[arg(long, default_value = "data/train.csv")]
    pub labels: String,

    /// Number of training shards to read
    #[arg(long, default_value_t = 4)]
    pub shards: usize,

    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Epochs per shard
    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Train from a randomly rotated / shifted batch stream
    #[arg(long)]
    pub augment: bool,

    /// Maximum rotation in degrees
    #[arg(long, default_value_t = 10.0)]
    pub rotation_range: f32,

    /// Maximum horizontal shift, fraction of the width
    #[arg(long, default_value_t = 0.2)]
    pub width_shift_range: f32,

    /// Maximum vertical shift, fraction of the height
    #[arg(long, default_value_t = 0.2)]
    pub height_shift_range: f32,

    /// Save augmented samples as PNG into this directory
    #[arg(long)]
    pub augment_save_dir: Option<String>,

    /// Keep the raw 137x236 resolution instead of resizing
    #[arg(long)]
    pub no_resize: bool,

    #[arg(long, default_value_t = 118)]
    pub target_width: usize,

    #[arg(long, default_value_t = 68)]
    pub target_height: usize,

    /// Keep pixels as 0/255 instead of scaling to [0, 1]
    #[arg(long)]
    pub no_normalize: bool,

    /// Fraction of every shard held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub validation_fraction: f64,

    /// Base seed; shard i uses seed + i
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Directory of the run tracker
    #[arg(long, default_value = "runs")]
    pub tracking_dir: String,

    /// Directory to save model checkpoints and config
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Number of conv + max-pool blocks
    #[arg(long, default_value_t = 3)]
    pub conv_blocks: usize,

    #[arg(long, default_value_t = 64)]
    pub conv_filters: usize,

    #[arg(long, default_value_t = 3)]
    pub kernel_size: usize,

    #[arg(long, default_value_t = 2)]
    pub pool_size: usize,

    #[arg(long, default_value_t = 0.3)]
    pub conv_dropout: f64,

    #[arg(long, default_value_t = 1024)]
    pub dense1: usize,

    #[arg(long, default_value_t = 0.3)]
    pub dense_dropout: f64,

    #[arg(long, default_value_t = 512)]
    pub dense2: usize,
}

/// Convert CLI TrainArgs into the application-layer ExperimentConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for ExperimentConfig {
    fn from(a: TrainArgs) -> Self {
        ExperimentConfig {
            experiment_name:     a.name,
            data_dir:            a.data_dir,
            labels_csv:          a.labels,
            n_shards:            a.shards,
            batch_size:          a.batch_size,
            epochs:              a.epochs,
            lr:                  a.lr,
            augment:             a.augment,
            augmentation:        AugmentConfig {
                rotation_range:     a.rotation_range,
                width_shift_range:  a.width_shift_range,
                height_shift_range: a.height_shift_range,
            },
            augment_save_dir:    a.augment_save_dir,
            source_height:       ImageShape::RAW.height,
            source_width:        ImageShape::RAW.width,
            resize:              !a.no_resize,
            target_height:       a.target_height,
            target_width:        a.target_width,
            normalize:           !a.no_normalize,
            validation_fraction: a.validation_fraction,
            seed:                a.seed,
            read_batch_rows:     1024,
            tracking_dir:        a.tracking_dir,
            checkpoint_dir:      a.checkpoint_dir,
            model:               GraphemeCnnConfig::new()
                .with_conv_blocks(a.conv_blocks)
                .with_conv_filters(a.conv_filters)
                .with_kernel_size(a.kernel_size)
                .with_pool_size(a.pool_size)
                .with_conv_dropout(a.conv_dropout)
                .with_dense1(a.dense1)
                .with_dense_dropout(a.dense_dropout)
                .with_dense2(a.dense2),
        }
        .sync_model_input()
    }
}

/// All arguments for the `submit` command
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Directory containing test_image_data_{i}.parquet
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Number of test shards to read
    #[arg(long, default_value_t = 4)]
    pub shards: usize,

    /// Output CSV path
    #[arg(long, default_value = "submission.csv")]
    pub output: String,
}

impl From<SubmitArgs> for SubmitConfig {
    fn from(a: SubmitArgs) -> Self {
        SubmitConfig {
            data_dir:       a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            n_shards:       a.shards,
            output:         a.output,
        }
    }
}

/// All arguments for the `runs` command
#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Directory of the run tracker
    #[arg(long, default_value = "runs")]
    pub tracking_dir: String,

    /// Write the table to this CSV file instead of stdout
    #[arg(long)]
    pub output: Option<String>,
}
