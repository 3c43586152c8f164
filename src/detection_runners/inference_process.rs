use std::time::Instant;
use ndarray::{Array2, Array4};
use crate::utils;
use crate::Result;

pub trait InferenceProcess {
    type Input: ?Sized;
    type Output;

    /// Pre-process the input data into an NHWC batch.
    fn preprocess(&self, x: &Self::Input) -> Result<Array4<f32>>;

    /// Executes the model on the preprocessed data.
    fn inference(&mut self, xs: Array4<f32>) -> Result<Array2<f32>>;

    /// Post-process the model's output.
    fn postprocess(&self, ys: Array2<f32>) -> Result<Self::Output>;

    /// Executes the full pipeline.
    fn run(&mut self, x: &Self::Input) -> Result<Self::Output> {
        let xs = self.preprocess(x)?;
        let ys = self.inference(xs)?;
        self.postprocess(ys)
    }

    /// Executes the full pipeline, tracing the time spent in every stage.
    fn forward(&mut self, x: &Self::Input, profile: bool) -> Result<Self::Output> {
        let start = Instant::now();
        let mut elapsed = start.elapsed();

        let xs = self.preprocess(x)?;
        elapsed = utils::trace(profile, "TIME", "Preprocessing input", start, elapsed);

        let ys = self.inference(xs)?;
        elapsed = utils::trace(profile, "TIME", "Forward pass", start, elapsed);

        let out = self.postprocess(ys)?;
        utils::trace(profile, "TIME", "Postprocessing", start, elapsed);

        Ok(out)
    }
}
