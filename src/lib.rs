mod error;
mod utils;
pub mod common;
pub mod data;
pub mod detection_runners;

use std::fs::File;
use std::io::BufWriter;
use std::time::Instant;
use crate::common::{ModelConfig, Prediction, RunMode};
use crate::detection_runners::{InferenceProcess, YoloV1};

pub use error::YoloError;

pub type Result<T, E = YoloError> = std::result::Result<T, E>;

/// Loads the per-layer CSV weights from `config.weights_path` and persists them as a
/// checkpoint at `config.checkpoint_path`. No image is read.
pub fn save_checkpoint(config: &ModelConfig) -> Result<()> {
    let now = Instant::now();
    let yolo = YoloV1::from_weights(config)?;
    yolo.save_checkpoint(&config.checkpoint_path)?;
    log::info!("Checkpoint written in {:?}", now.elapsed());
    Ok(())
}

/// Restores `config.checkpoint_path` and runs `config.image_path` through the network.
pub fn run_inference(config: &ModelConfig) -> Result<Prediction> {
    let mut yolo = YoloV1::from_checkpoint(config)?;
    let prediction = yolo.forward(&config.image_path, config.profile)?;

    if let Some(best) = prediction.strongest_cell() {
        log::info!(
            "Strongest cell ({}, {}): class {} score {:.4}",
            best.row,
            best.col,
            best.class_id,
            best.score
        );
    }
    if let Some(path) = &config.output_path {
        write_prediction(&prediction, path)?;
    }
    Ok(prediction)
}

/// Runs whichever mode `config` selects. Only inference yields a prediction.
pub fn run(config: &ModelConfig) -> Result<Option<Prediction>> {
    log::info!("Running in {} mode", config.run_mode().as_str());
    match config.run_mode() {
        RunMode::Checkpoint => save_checkpoint(config).map(|_| None),
        RunMode::Inference => run_inference(config).map(Some),
    }
}

fn write_prediction(prediction: &Prediction, path: &std::path::Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, prediction).map_err(std::io::Error::from)?;
    log::info!("Prediction written to {}", path.display());
    Ok(())
}
