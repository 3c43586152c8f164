use ndarray::{Array2, Array4, ArrayD, ArrayViewD, ArrayViewMutD};
use crate::data::ParamSource;
use crate::detection_runners::yolo_v1::layers::{
    flatten, ConnectedLayer, ConvLayer, DropoutLayer, MaxPoolLayer,
};
use crate::detection_runners::yolo_v1::topology::LayerSpec;
use crate::error::YoloError;
use crate::Result;

#[derive(Debug, Clone)]
pub enum Layer {
    Conv(ConvLayer),
    MaxPool(MaxPoolLayer),
    Flatten,
    Connected(ConnectedLayer),
    Dropout(DropoutLayer),
}

/// Shape of the activation flowing between layers, without the batch axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    Spatial { height: usize, width: usize, channels: usize },
    Flat(usize),
}

enum Tensor {
    Spatial(Array4<f32>),
    Flat(Array2<f32>),
}

/// A built network. The layer list never changes after [`Network::build`]; only parameter
/// values are overwritten when a checkpoint is restored.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    input_shape: [usize; 3],
    output_len: usize,
}

impl Network {
    /// Builds `topology` for `[height, width, channels]` inputs, drawing every conv and
    /// connected layer's parameters from `source`.
    pub fn build(topology: &[LayerSpec], input_shape: [usize; 3], source: &mut ParamSource) -> Result<Self> {
        let [height, width, channels] = input_shape;
        if height == 0 || width == 0 || channels == 0 {
            return Err(YoloError::config(format!("input shape {input_shape:?} has an empty dimension")));
        }
        let mut shape = Activation::Spatial { height, width, channels };
        let mut layers = Vec::with_capacity(topology.len());

        for spec in topology {
            let (layer, next) = match (*spec, shape) {
                (LayerSpec::Conv { index, kernel, filters, stride }, Activation::Spatial { height, width, channels }) => {
                    if stride == 0 || kernel.contains(&0) {
                        return Err(YoloError::config(format!("conv layer {index} has a zero kernel or stride")));
                    }
                    let (weight, bias) = source.conv(index, [kernel[0], kernel[1], channels, filters])?;
                    let layer = ConvLayer { index, stride, weight, bias };
                    let (height, width) = layer.output_dim(height, width);
                    (Layer::Conv(layer), Activation::Spatial { height, width, channels: filters })
                }
                (LayerSpec::MaxPool { index, size, stride }, Activation::Spatial { height, width, channels }) => {
                    if stride == 0 || size == 0 {
                        return Err(YoloError::config(format!("maxpool layer {index} has a zero size or stride")));
                    }
                    let layer = MaxPoolLayer { index, size, stride };
                    let (height, width) = layer.output_dim(height, width);
                    (Layer::MaxPool(layer), Activation::Spatial { height, width, channels })
                }
                (LayerSpec::Flatten, Activation::Spatial { height, width, channels }) => {
                    (Layer::Flatten, Activation::Flat(height * width * channels))
                }
                (LayerSpec::Connected { index, outputs, leaky }, Activation::Flat(inputs)) => {
                    let (weight, bias) = source.connected(index, [inputs, outputs])?;
                    (
                        Layer::Connected(ConnectedLayer { index, leaky, weight, bias }),
                        Activation::Flat(outputs),
                    )
                }
                (LayerSpec::Dropout { index }, shape) => (Layer::Dropout(DropoutLayer { index }), shape),
                (spec, shape) => {
                    return Err(YoloError::config(format!(
                        "{} layer cannot follow a {shape:?} activation",
                        spec.kind()
                    )));
                }
            };

            log::debug!(
                "{} layer {:?}: {:?} -> {:?}{}",
                spec.kind(),
                spec.index(),
                shape,
                next,
                if source.is_pretrained() && matches!(spec, LayerSpec::Conv { .. } | LayerSpec::Connected { .. }) {
                    " (pretrained)"
                } else {
                    ""
                }
            );
            layers.push(layer);
            shape = next;
        }

        let output_len = match shape {
            Activation::Flat(len) => len,
            Activation::Spatial { .. } => {
                return Err(YoloError::config("topology must end in a flattened activation"));
            }
        };

        Ok(Self { layers, input_shape, output_len })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_shape(&self) -> [usize; 3] {
        self.input_shape
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Runs an NHWC batch through every layer. `keep_prob` feeds the dropout layer and
    /// must be `1.0` for inference.
    pub fn forward(&self, input: Array4<f32>, keep_prob: f32) -> Result<Array2<f32>> {
        let (_, height, width, channels) = input.dim();
        if [height, width, channels] != self.input_shape {
            return Err(YoloError::config(format!(
                "network expects {:?} inputs, got {:?}",
                self.input_shape,
                [height, width, channels]
            )));
        }

        let mut x = Tensor::Spatial(input);
        for layer in &self.layers {
            x = match (layer, x) {
                (Layer::Conv(conv), Tensor::Spatial(x)) => Tensor::Spatial(conv.forward(&x)?),
                (Layer::MaxPool(pool), Tensor::Spatial(x)) => Tensor::Spatial(pool.forward(&x)),
                (Layer::Flatten, Tensor::Spatial(x)) => Tensor::Flat(flatten(&x)?),
                (Layer::Connected(fc), Tensor::Flat(x)) => Tensor::Flat(fc.forward(&x)?),
                (Layer::Dropout(dropout), Tensor::Spatial(x)) => Tensor::Spatial(dropout.forward(x, keep_prob)?),
                (Layer::Dropout(dropout), Tensor::Flat(x)) => Tensor::Flat(dropout.forward(x, keep_prob)?),
                // build() only ever produces well-formed layer sequences
                _ => return Err(YoloError::config("layer received an activation of the wrong rank")),
            };
            if log::log_enabled!(log::Level::Trace) {
                let view = match &x {
                    Tensor::Spatial(a) => a.view().into_dyn(),
                    Tensor::Flat(a) => a.view().into_dyn(),
                };
                log::trace!("{}", summarize(layer, view));
            }
        }

        match x {
            Tensor::Flat(out) => Ok(out),
            Tensor::Spatial(_) => Err(YoloError::config("network produced a spatial output")),
        }
    }

    /// Every learnable tensor, keyed by layer identity.
    pub fn named_parameters(&self) -> Vec<(String, ArrayViewD<'_, f32>)> {
        let mut params = Vec::new();
        for layer in &self.layers {
            match layer {
                Layer::Conv(conv) => {
                    params.push((param_name(conv.index, "conv", "weight"), conv.weight.view().into_dyn()));
                    params.push((param_name(conv.index, "conv", "bias"), conv.bias.view().into_dyn()));
                }
                Layer::Connected(fc) => {
                    params.push((param_name(fc.index, "connected", "weight"), fc.weight.view().into_dyn()));
                    params.push((param_name(fc.index, "connected", "bias"), fc.bias.view().into_dyn()));
                }
                _ => {}
            }
        }
        params
    }

    pub fn named_parameters_mut(&mut self) -> Vec<(String, ArrayViewMutD<'_, f32>)> {
        let mut params = Vec::new();
        for layer in &mut self.layers {
            match layer {
                Layer::Conv(conv) => {
                    params.push((param_name(conv.index, "conv", "weight"), conv.weight.view_mut().into_dyn()));
                    params.push((param_name(conv.index, "conv", "bias"), conv.bias.view_mut().into_dyn()));
                }
                Layer::Connected(fc) => {
                    params.push((param_name(fc.index, "connected", "weight"), fc.weight.view_mut().into_dyn()));
                    params.push((param_name(fc.index, "connected", "bias"), fc.bias.view_mut().into_dyn()));
                }
                _ => {}
            }
        }
        params
    }

    /// Owned copies of every parameter, mostly useful for comparing two networks.
    pub fn parameters_snapshot(&self) -> Vec<(String, ArrayD<f32>)> {
        self.named_parameters()
            .into_iter()
            .map(|(name, view)| (name, view.to_owned()))
            .collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.named_parameters().iter().map(|(_, p)| p.len()).sum()
    }
}

fn param_name(index: usize, kind: &str, part: &str) -> String {
    format!("layer{index:02}_{kind}_{part}")
}

fn summarize(layer: &Layer, x: ArrayViewD<f32>) -> String {
    let name = match layer {
        Layer::Conv(l) => format!("convolution {}", l.index),
        Layer::MaxPool(l) => format!("pool {}", l.index),
        Layer::Flatten => "flatten".to_string(),
        Layer::Connected(l) => format!("connected {}", l.index),
        Layer::Dropout(l) => format!("dropout {}", l.index),
    };
    let (min, max) = x
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let mean = x.mean().unwrap_or(0.0);
    format!("{name}: shape={:?} min={min:.4} max={max:.4} mean={mean:.4}", x.shape())
}
