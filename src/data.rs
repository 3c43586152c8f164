mod checkpoint;
mod param_source;
mod weight_files;

pub use checkpoint::{restore_checkpoint, save_checkpoint};
pub use param_source::{ParamSource, RandomInit, DEFAULT_INIT_STDDEV};
pub use weight_files::{remap_conv_weights, remap_connected_weights, ParamKind, WeightDir};
