mod model_config;
mod prediction;

pub use model_config::*;
pub use prediction::*;
