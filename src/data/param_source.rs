use ndarray::{Array, Array1, Array2, Array4, Dimension, ShapeBuilder};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use crate::data::WeightDir;
use crate::error::YoloError;
use crate::Result;

/// Standard deviation of the random normal initialisation.
pub const DEFAULT_INIT_STDDEV: f32 = 0.35;

/// Zero-mean normal initialisation, optionally seeded.
#[derive(Debug, Clone)]
pub struct RandomInit {
    normal: Normal<f32>,
    rng: StdRng,
}

impl RandomInit {
    pub fn new(stddev: f32, seed: Option<u64>) -> Result<Self> {
        let normal = Normal::new(0.0, stddev)
            .map_err(|e| YoloError::config(format!("init stddev {stddev}: {e}")))?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { normal, rng })
    }

    fn sample<Sh, D>(&mut self, shape: Sh) -> Array<f32, D>
    where
        Sh: ShapeBuilder<Dim = D>,
        D: Dimension,
    {
        let Self { normal, rng } = self;
        Array::from_shape_simple_fn(shape, || normal.sample(rng))
    }
}

/// Where layer parameters come from while the network is being built.
#[derive(Debug, Clone)]
pub enum ParamSource {
    Random(RandomInit),
    /// Darknet CSV export, one weight and one bias file per layer.
    Pretrained(WeightDir),
}

impl ParamSource {
    pub fn random(stddev: f32, seed: Option<u64>) -> Result<Self> {
        Ok(Self::Random(RandomInit::new(stddev, seed)?))
    }

    pub fn pretrained(dir: WeightDir) -> Self {
        Self::Pretrained(dir)
    }

    pub fn is_pretrained(&self) -> bool {
        matches!(self, Self::Pretrained(_))
    }

    pub(crate) fn conv(&mut self, index: usize, shape: [usize; 4]) -> Result<(Array4<f32>, Array1<f32>)> {
        match self {
            Self::Random(init) => Ok((init.sample(shape), init.sample(shape[3]))),
            Self::Pretrained(dir) => dir.load_conv(index, shape),
        }
    }

    pub(crate) fn connected(&mut self, index: usize, shape: [usize; 2]) -> Result<(Array2<f32>, Array1<f32>)> {
        match self {
            Self::Random(init) => Ok((init.sample(shape), init.sample(shape[1]))),
            Self::Pretrained(dir) => dir.load_connected(index, shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_init_is_reproducible() {
        let mut a = ParamSource::random(DEFAULT_INIT_STDDEV, Some(7)).unwrap();
        let mut b = ParamSource::random(DEFAULT_INIT_STDDEV, Some(7)).unwrap();
        let (wa, ba) = a.conv(0, [3, 3, 2, 4]).unwrap();
        let (wb, bb) = b.conv(0, [3, 3, 2, 4]).unwrap();
        assert_eq!(wa, wb);
        assert_eq!(ba, bb);
        assert_eq!(wa.shape(), &[3, 3, 2, 4]);
        assert_eq!(ba.len(), 4);
    }

    #[test]
    fn negative_stddev_is_rejected() {
        assert!(matches!(
            ParamSource::random(-1.0, None),
            Err(YoloError::Config { .. })
        ));
    }
}
