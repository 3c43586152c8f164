use std::path::PathBuf;

/// Fatal failures of the pipeline. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum YoloError {
    #[error("invalid image {}: {reason}", path.display())]
    InvalidImage { path: PathBuf, reason: String },

    #[error("failed to load layer index {layer} (file number {}) from {}: {reason}", layer + 1, path.display())]
    WeightLoad {
        layer: usize,
        path: PathBuf,
        reason: String,
    },

    #[error("checkpoint {} does not match the network: {reason}", path.display())]
    CheckpointMismatch { path: PathBuf, reason: String },

    #[error("failed to write checkpoint {}: {reason}", path.display())]
    CheckpointWrite { path: PathBuf, reason: String },

    #[error("image preprocessing failed: {reason}")]
    Preprocess { reason: String },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl YoloError {
    pub(crate) fn weight_load(layer: usize, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::WeightLoad {
            layer,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn checkpoint_mismatch(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CheckpointMismatch {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn checkpoint_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CheckpointWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn preprocess(reason: impl ToString) -> Self {
        Self::Preprocess {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn config(reason: impl ToString) -> Self {
        Self::Config {
            reason: reason.to_string(),
        }
    }
}
