//! Forward implementations of the four layer kinds used by yolo-small.
//!
//! Spatial activations are NHWC `Array4`s, flattened activations are `[batch, features]`.

use ndarray::parallel::prelude::*;
use ndarray::{s, Array, Array1, Array2, Array4, ArrayView3, Axis, Dimension, Zip};
use rand::distributions::{Bernoulli, Distribution};
use crate::error::YoloError;
use crate::Result;

/// Slope applied to negative inputs by the leaky activation.
pub const LEAKY_SLOPE: f32 = 0.1;

/// Darknet leaky activation, `max(x, 0.1x)`.
#[inline]
pub fn leaky(x: f32) -> f32 {
    x.max(LEAKY_SLOPE * x)
}

#[derive(Debug, Clone)]
pub struct ConvLayer {
    pub index: usize,
    pub stride: usize,
    /// `[kh, kw, in_channels, filters]`
    pub weight: Array4<f32>,
    pub bias: Array1<f32>,
}

impl ConvLayer {
    pub fn output_dim(&self, height: usize, width: usize) -> (usize, usize) {
        let (kh, kw, _, _) = self.weight.dim();
        let out_h = (height + 2 * (kh / 2) - kh) / self.stride + 1;
        let out_w = (width + 2 * (kw / 2) - kw) / self.stride + 1;
        (out_h, out_w)
    }

    /// Zero-pads by `kernel / 2` on every spatial edge, then runs an unpadded convolution.
    /// This is darknet's sizing rule, which differs from SAME padding for even kernels and
    /// strided layers.
    pub fn forward(&self, x: &Array4<f32>) -> Result<Array4<f32>> {
        let (batch, height, width, channels) = x.dim();
        let (kh, kw, in_channels, filters) = self.weight.dim();
        if channels != in_channels {
            return Err(YoloError::config(format!(
                "conv layer {} expects {in_channels} channels, got {channels}",
                self.index
            )));
        }

        let padded = pad_spatial(x, kh / 2, kw / 2);
        let (out_h, out_w) = self.output_dim(height, width);
        let kernel = self.weight.view().into_shape_with_order((kh * kw * in_channels, filters))?;

        let mut out = Array4::<f32>::zeros((batch, out_h, out_w, filters));
        for n in 0..batch {
            let cols = im2col(padded.index_axis(Axis(0), n), [kh, kw], self.stride, out_h, out_w);
            let mut y = cols.dot(&kernel);
            y += &self.bias;
            y.par_mapv_inplace(leaky);
            out.index_axis_mut(Axis(0), n)
                .assign(&y.into_shape_with_order((out_h, out_w, filters))?);
        }
        Ok(out)
    }
}

fn pad_spatial(x: &Array4<f32>, pad_h: usize, pad_w: usize) -> Array4<f32> {
    if pad_h == 0 && pad_w == 0 {
        return x.clone();
    }
    let (batch, height, width, channels) = x.dim();
    let mut padded = Array4::zeros((batch, height + 2 * pad_h, width + 2 * pad_w, channels));
    padded
        .slice_mut(s![.., pad_h..pad_h + height, pad_w..pad_w + width, ..])
        .assign(x);
    padded
}

/// Unrolls every receptive field into one row, ordered `(ky, kx, channel)` to match a
/// row-major `[kh, kw, in, out]` kernel reshaped to `[kh*kw*in, out]`.
fn im2col(input: ArrayView3<f32>, kernel: [usize; 2], stride: usize, out_h: usize, out_w: usize) -> Array2<f32> {
    let [kh, kw] = kernel;
    let channels = input.dim().2;
    let mut cols = Array2::<f32>::zeros((out_h * out_w, kh * kw * channels));

    cols.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(r, mut row)| {
            let (oy, ox) = (r / out_w, r % out_w);
            for i in 0..kh {
                for j in 0..kw {
                    let start = (i * kw + j) * channels;
                    row.slice_mut(s![start..start + channels])
                        .assign(&input.slice(s![oy * stride + i, ox * stride + j, ..]));
                }
            }
        });
    cols
}

/// Max pooling with SAME padding: output side is `ceil(input / stride)`, padded cells never win.
#[derive(Debug, Clone)]
pub struct MaxPoolLayer {
    pub index: usize,
    pub size: usize,
    pub stride: usize,
}

impl MaxPoolLayer {
    pub fn output_dim(&self, height: usize, width: usize) -> (usize, usize) {
        (height.div_ceil(self.stride), width.div_ceil(self.stride))
    }

    pub fn forward(&self, x: &Array4<f32>) -> Array4<f32> {
        let (batch, height, width, channels) = x.dim();
        let (out_h, out_w) = self.output_dim(height, width);
        let pad_top = ((out_h - 1) * self.stride + self.size).saturating_sub(height) / 2;
        let pad_left = ((out_w - 1) * self.stride + self.size).saturating_sub(width) / 2;

        let mut out = Array4::<f32>::zeros((batch, out_h, out_w, channels));
        Zip::indexed(&mut out).par_for_each(|(n, oy, ox, c), o| {
            let mut best = f32::NEG_INFINITY;
            for dy in 0..self.size {
                let Some(iy) = (oy * self.stride + dy).checked_sub(pad_top) else { continue };
                if iy >= height {
                    continue;
                }
                for dx in 0..self.size {
                    let Some(ix) = (ox * self.stride + dx).checked_sub(pad_left) else { continue };
                    if ix < width {
                        best = best.max(x[[n, iy, ix, c]]);
                    }
                }
            }
            *o = best;
        });
        out
    }
}

/// Transposes NHWC to NCHW before flattening, the order connected weights were exported in.
pub fn flatten(x: &Array4<f32>) -> Result<Array2<f32>> {
    let (batch, height, width, channels) = x.dim();
    let nchw = x.view().permuted_axes([0, 3, 1, 2]).as_standard_layout().into_owned();
    Ok(nchw.into_shape_with_order((batch, channels * height * width))?)
}

#[derive(Debug, Clone)]
pub struct ConnectedLayer {
    pub index: usize,
    pub leaky: bool,
    /// `[inputs, outputs]`
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl ConnectedLayer {
    pub fn forward(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let (inputs, _) = self.weight.dim();
        if x.ncols() != inputs {
            return Err(YoloError::config(format!(
                "connected layer {} expects {inputs} inputs, got {}",
                self.index,
                x.ncols()
            )));
        }
        let mut y = x.dot(&self.weight);
        y += &self.bias;
        if self.leaky {
            y.mapv_inplace(leaky);
        }
        Ok(y)
    }
}

#[derive(Debug, Clone)]
pub struct DropoutLayer {
    pub index: usize,
}

impl DropoutLayer {
    /// Keeps each element with probability `keep_prob` and scales survivors by `1 / keep_prob`.
    /// A `keep_prob` of one passes the input through untouched.
    pub fn forward<D: Dimension>(&self, x: Array<f32, D>, keep_prob: f32) -> Result<Array<f32, D>> {
        if !(keep_prob > 0.0 && keep_prob <= 1.0) {
            return Err(YoloError::config(format!(
                "dropout keep probability must be in (0, 1], got {keep_prob}"
            )));
        }
        if keep_prob == 1.0 {
            return Ok(x);
        }

        let keep = Bernoulli::new(keep_prob as f64)
            .map_err(|e| YoloError::config(e.to_string()))?;
        let mut rng = rand::thread_rng();
        let scale = 1.0 / keep_prob;
        Ok(x.mapv_into(|v| if keep.sample(&mut rng) { v * scale } else { 0.0 }))
    }
}
