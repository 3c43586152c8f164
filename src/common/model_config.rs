use std::fmt;
use std::path::PathBuf;
use crate::common::PredictionLayout;
use crate::data::DEFAULT_INIT_STDDEV;
use crate::detection_runners::yolo_v1::topology::{LayerSpec, INPUT_SIZE, YOLO_SMALL};

/// What a single invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Load the per-layer CSV files and write them out as a checkpoint.
    Checkpoint,
    /// Restore a checkpoint and run one image through the network.
    Inference,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Checkpoint => "checkpoint",
            RunMode::Inference => "inference",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Directory of darknet CSV exports. Its presence selects [`RunMode::Checkpoint`].
    pub weights_path: Option<PathBuf>,
    pub checkpoint_path: PathBuf,
    pub image_path: PathBuf,
    /// Layer table to build, [`YOLO_SMALL`] unless a reduced network is wanted.
    pub topology: &'static [LayerSpec],
    pub input_size: u32,
    pub init_stddev: f32,
    pub seed: Option<u64>,
    pub keep_prob: f32,
    pub layout: PredictionLayout,
    /// Where the decoded prediction is written as JSON, if anywhere.
    pub output_path: Option<PathBuf>,
    pub profile: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: None,
            checkpoint_path: PathBuf::new(),
            image_path: PathBuf::new(),
            topology: YOLO_SMALL,
            input_size: INPUT_SIZE as u32,
            init_stddev: DEFAULT_INIT_STDDEV,
            seed: None,
            keep_prob: 1.0,
            layout: PredictionLayout::default(),
            output_path: None,
            profile: false,
        }
    }
}

impl ModelConfig {
    pub fn new(checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            ..Default::default()
        }
    }

    pub fn with_weights_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.weights_path = Some(path.into());
        self
    }

    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = path.into();
        self
    }

    /// Builds `topology` for square `input_size` inputs instead of the 448 yolo-small network.
    pub fn with_topology(mut self, topology: &'static [LayerSpec], input_size: u32) -> Self {
        self.topology = topology;
        self.input_size = input_size;
        self
    }

    pub fn with_init_stddev(mut self, x: f32) -> Self {
        self.init_stddev = x;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_keep_prob(mut self, x: f32) -> Self {
        self.keep_prob = x;
        self
    }

    pub fn with_layout(mut self, layout: PredictionLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_output_path(mut self, path: Option<PathBuf>) -> Self {
        self.output_path = path;
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn run_mode(&self) -> RunMode {
        match self.weights_path {
            Some(_) => RunMode::Checkpoint,
            None => RunMode::Inference,
        }
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mode: {}\n\
            Weights Path: {}\n\
            Checkpoint Path: {}\n\
            Image Path: {}\n\
            Model Input Resolution: {}x{}\n\
            Dropout Keep Probability: {}",
            self.run_mode().as_str(),
            self.weights_path
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string()),
            self.checkpoint_path.display(),
            self.image_path.display(),
            self.input_size,
            self.input_size,
            self.keep_prob
        )
    }
}
