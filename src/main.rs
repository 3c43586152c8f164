//! Command line entry point.
//!
//! With `--weight_path` the per-layer darknet CSV files are converted into a checkpoint;
//! without it the checkpoint is restored and one image is run through the network.

use std::path::{Path, PathBuf};
use anyhow::Context;
use clap::Parser;
use yolo_small::common::ModelConfig;

#[derive(Parser, Debug)]
#[command(name = "yolo-small", version, about = "yolo-small (YOLOv1) checkpoint conversion and inference")]
struct Cli {
    /// Directory with per-layer weight/bias CSV files; selects checkpoint mode
    #[arg(short = 'w', long = "weight_path")]
    weight_path: Option<PathBuf>,

    /// Image to run inference on (ignored in checkpoint mode)
    #[arg(short = 't', long = "image_path")]
    image_path: PathBuf,

    /// Checkpoint to write (checkpoint mode) or restore (inference mode)
    #[arg(short = 'c', long = "checkpoint_path")]
    checkpoint_path: PathBuf,

    /// Write the decoded prediction grids as JSON
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Seed for the random initialisation that precedes a restore
    #[arg(long)]
    seed: Option<u64>,

    /// Log per-stage timings at info level
    #[arg(long)]
    profile: bool,
}

/// `~` expansion against the home directory, then made absolute.
fn expand_path(path: &Path) -> anyhow::Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .context("cannot expand ~ without a home directory")?
            .join(rest),
        Err(_) => path.to_path_buf(),
    };
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = ModelConfig::new(expand_path(&cli.checkpoint_path)?)
        .with_image_path(expand_path(&cli.image_path)?)
        .with_seed(cli.seed)
        .with_output_path(cli.output.as_deref().map(expand_path).transpose()?)
        .with_profile(cli.profile);
    if let Some(weight_path) = &cli.weight_path {
        config = config.with_weights_path(expand_path(weight_path)?);
    }
    log::info!("Configuration:\n{config}");

    yolo_small::run(&config).with_context(|| format!("{} mode failed", config.run_mode().as_str()))?;
    Ok(())
}
