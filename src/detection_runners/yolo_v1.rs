pub mod image_ops;
pub mod layers;
mod network;
pub mod topology;

use std::path::Path;
use ndarray::{Array2, Array4, Axis};
use crate::common::{ModelConfig, Prediction, PredictionLayout};
use crate::data::{restore_checkpoint, save_checkpoint, ParamSource, WeightDir};
use crate::detection_runners::inference_process::InferenceProcess;
use crate::error::YoloError;
use crate::Result;

pub use network::{Layer, Network};
use topology::INPUT_CHANNELS;

/// yolo-small detector: image preparation, the fixed darknet network, and grid decoding.
#[derive(Debug, Clone)]
pub struct YoloV1 {
    network: Network,
    input_size: u32,
    keep_prob: f32,
    layout: PredictionLayout,
}

impl YoloV1 {
    /// Builds the network from the per-layer CSV files in `config.weights_path`.
    pub fn from_weights(config: &ModelConfig) -> Result<Self> {
        let dir = config
            .weights_path
            .as_ref()
            .ok_or_else(|| YoloError::config("no weight directory configured"))?;
        let mut source = ParamSource::pretrained(WeightDir::new(dir));
        Self::build(config, &mut source)
    }

    /// Builds a randomly initialised network, then overwrites every parameter from
    /// `config.checkpoint_path`.
    pub fn from_checkpoint(config: &ModelConfig) -> Result<Self> {
        let mut source = ParamSource::random(config.init_stddev, config.seed)?;
        let mut yolo = Self::build(config, &mut source)?;
        restore_checkpoint(&mut yolo.network, &config.checkpoint_path)?;
        Ok(yolo)
    }

    pub fn build(config: &ModelConfig, source: &mut ParamSource) -> Result<Self> {
        let size = config.input_size as usize;
        let network = Network::build(config.topology, [size, size, INPUT_CHANNELS], source)?;
        log::info!(
            "Built network: {} layers, {} parameters",
            network.layers().len(),
            network.parameter_count()
        );
        Ok(Self {
            network,
            input_size: config.input_size,
            keep_prob: config.keep_prob,
            layout: config.layout.clone(),
        })
    }

    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        save_checkpoint(&self.network, path)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }
}

impl InferenceProcess for YoloV1 {
    type Input = Path;
    type Output = Prediction;

    fn preprocess(&self, image_path: &Path) -> Result<Array4<f32>> {
        let image = image_ops::process_image(image_path, self.input_size)?;
        Ok(image.insert_axis(Axis(0)))
    }

    fn inference(&mut self, xs: Array4<f32>) -> Result<Array2<f32>> {
        self.network.forward(xs, self.keep_prob)
    }

    fn postprocess(&self, ys: Array2<f32>) -> Result<Prediction> {
        if ys.nrows() != 1 {
            return Err(YoloError::config(format!("expected one prediction row, got {}", ys.nrows())));
        }
        let flat: Vec<f32> = ys.row(0).iter().copied().collect();
        Prediction::decode(&flat, self.layout.clone())
    }
}
