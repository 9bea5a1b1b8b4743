// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`  — trains the CNN over the parquet shards
//   2. `submit` — predicts the test shards into a CSV
//   3. `runs`   — tabulates final accuracies of tracked runs
//
// Training runs on Autodiff<Wgpu>, prediction on plain Wgpu.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, RunsArgs, SubmitArgs, TrainArgs};
use std::path::Path;

use crate::application::experiment_runner::ShardStatus;

type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
type InferBackend = burn::backend::Wgpu;

#[derive(Parser, Debug)]
#[command(
    name = "grapheme-lab",
    version = "0.1.0",
    about = "Train a three-head grapheme CNN on parquet shards, track runs, write submissions."
)]
pub struct Cli {
    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)  => run_train(args),
            Commands::Submit(args) => run_submit(args),
            Commands::Runs(args)   => run_runs(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on shards in: {}", args.data_dir);
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let summary = TrainUseCase::new(args.into()).execute::<TrainBackend>(device)?;

    println!(
        "\nExperiment {} run {}:",
        summary.experiment_id, summary.run_id
    );
    for outcome in &summary.outcomes {
        let line = match &outcome.status {
            ShardStatus::Completed(report) => {
                let mode = match report.steps_per_epoch {
                    Some(steps) => format!("augmented, {steps} steps/epoch"),
                    None => "in memory".to_string(),
                };
                let root_acc = report
                    .history
                    .last()
                    .and_then(|m| m.get("val_output_root_accuracy").or_else(|| m.get("output_root_accuracy")))
                    .map(|acc| format!(", root_acc={:.1}%", acc * 100.0))
                    .unwrap_or_default();
                format!(
                    "trained on {} samples ({mode}), validated on {}{root_acc}",
                    report.n_train, report.n_val
                )
            }
            ShardStatus::Skipped(reason) => format!("skipped: {reason}"),
            ShardStatus::Failed(reason)  => format!("FAILED: {reason}"),
        };
        println!("  shard {} ({}) | {}", outcome.index, outcome.path.display(), line);
    }
    anyhow::ensure!(
        summary.failed_shards() < summary.outcomes.len() || summary.outcomes.is_empty(),
        "every shard failed"
    );
    Ok(())
}

fn run_submit(args: SubmitArgs) -> Result<()> {
    use crate::application::submission::SubmitUseCase;

    let output = args.output.clone();
    let device = burn::backend::wgpu::WgpuDevice::default();
    let rows = SubmitUseCase::new(args.into()).execute::<InferBackend>(device)?;
    println!("Wrote {rows} rows to {output}");
    Ok(())
}

fn run_runs(args: RunsArgs) -> Result<()> {
    use crate::infra::run_scraper::scrape_runs;

    let summary = scrape_runs(Path::new(&args.tracking_dir))?;
    if summary.is_empty() {
        println!("No tracked runs under '{}'", args.tracking_dir);
        return Ok(());
    }
    match args.output {
        Some(path) => {
            let file = std::fs::File::create(&path)?;
            summary.write_csv(file)?;
            println!("Wrote {} experiments to {path}", summary.experiments.len());
        }
        None => summary.write_csv(std::io::stdout().lock())?,
    }
    Ok(())
}
