//! Per-layer CSV weight files exported from darknet.
//!
//! Every file holds one flat, comma separated sequence. Biases map one to one onto the
//! bias vector, weights are stored filter-major and have to be re-laid-out into the
//! `[kh, kw, in, out]` / `[in, out]` shapes the network multiplies with.

use std::path::{Path, PathBuf};
use ndarray::{Array1, Array2, Array4};
use crate::error::YoloError;
use crate::Result;

/// Which file family a layer's parameters live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Conv,
    Connected,
}

impl ParamKind {
    fn prefix(&self) -> &'static str {
        match self {
            ParamKind::Conv => "conv",
            ParamKind::Connected => "connect",
        }
    }
}

/// Directory holding `conv_weight_layer<N>.csv`, `conv_bias_layer<N>.csv`,
/// `connect_weight_layer<N>.csv` and `connect_bias_layer<N>.csv` files.
#[derive(Debug, Clone)]
pub struct WeightDir {
    root: PathBuf,
}

impl WeightDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files are numbered from one, layer indices from zero.
    pub fn weight_path(&self, kind: ParamKind, index: usize) -> PathBuf {
        self.root
            .join(format!("{}_weight_layer{}.csv", kind.prefix(), index + 1))
    }

    pub fn bias_path(&self, kind: ParamKind, index: usize) -> PathBuf {
        self.root
            .join(format!("{}_bias_layer{}.csv", kind.prefix(), index + 1))
    }

    /// Loads the `[d0, d1, channels, filters]` kernel and the `[filters]` bias of a convolution.
    pub fn load_conv(&self, index: usize, shape: [usize; 4]) -> Result<(Array4<f32>, Array1<f32>)> {
        let [d0, d1, channels, filters] = shape;
        let path = self.weight_path(ParamKind::Conv, index);
        if d0 != d1 {
            return Err(YoloError::weight_load(
                index,
                &path,
                format!("non-square {d0}x{d1} kernels have no defined file layout"),
            ));
        }

        log::debug!("Loading weights from file: {}", path.display());
        let flat = read_exact(&path, index, d0 * d1 * channels * filters)?;
        let weight = remap_conv_weights(flat, shape)
            .map_err(|e| YoloError::weight_load(index, &path, e))?;

        let bias = self.load_bias(ParamKind::Conv, index, filters)?;
        Ok((weight, bias))
    }

    /// Loads the `[inputs, outputs]` matrix and the `[outputs]` bias of a connected layer.
    pub fn load_connected(&self, index: usize, shape: [usize; 2]) -> Result<(Array2<f32>, Array1<f32>)> {
        let [inputs, outputs] = shape;

        let path = self.weight_path(ParamKind::Connected, index);
        log::debug!("Loading weights from file: {}", path.display());
        let flat = read_exact(&path, index, inputs * outputs)?;
        let weight = remap_connected_weights(flat, shape)
            .map_err(|e| YoloError::weight_load(index, &path, e))?;

        let bias = self.load_bias(ParamKind::Connected, index, outputs)?;
        Ok((weight, bias))
    }

    fn load_bias(&self, kind: ParamKind, index: usize, len: usize) -> Result<Array1<f32>> {
        let path = self.bias_path(kind, index);
        log::debug!("Loading biases from file: {}", path.display());
        Ok(Array1::from(read_exact(&path, index, len)?))
    }
}

/// Element `[i, j, k, l]` is `flat[l*d0*d1*channels + k*d0*d1 + i*d0 + j]`.
///
/// The file is laid out as `[filters, channels, d0, d1]`, so a reshape followed by an axis
/// permutation reproduces that formula for the square kernels darknet exports. Non-square
/// kernels are rejected with an incompatible shape error.
pub fn remap_conv_weights(
    flat: Vec<f32>,
    shape: [usize; 4],
) -> std::result::Result<Array4<f32>, ndarray::ShapeError> {
    let [d0, d1, channels, filters] = shape;
    if d0 != d1 {
        return Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape));
    }
    let stored = Array4::from_shape_vec((filters, channels, d0, d1), flat)?;
    Ok(stored.permuted_axes([2, 3, 1, 0]).as_standard_layout().into_owned())
}

/// Element `[i, j]` is `flat[j*inputs + i]`: the file holds the transposed matrix.
pub fn remap_connected_weights(
    flat: Vec<f32>,
    shape: [usize; 2],
) -> std::result::Result<Array2<f32>, ndarray::ShapeError> {
    let [inputs, outputs] = shape;
    let stored = Array2::from_shape_vec((outputs, inputs), flat)?;
    Ok(stored.reversed_axes().as_standard_layout().into_owned())
}

/// Reads `needed` values from `path`. Extra trailing values are ignored.
fn read_exact(path: &Path, layer: usize, needed: usize) -> Result<Vec<f32>> {
    let mut values = read_flat_values(path, layer)?;
    if values.len() < needed {
        return Err(YoloError::weight_load(
            layer,
            path,
            format!("expected {needed} values, found {}", values.len()),
        ));
    }
    if values.len() > needed {
        log::warn!(
            "{} holds {} values, only the first {needed} are used",
            path.display(),
            values.len()
        );
        values.truncate(needed);
    }
    Ok(values)
}

fn read_flat_values(path: &Path, layer: usize) -> Result<Vec<f32>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| YoloError::weight_load(layer, path, e))?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| YoloError::weight_load(layer, path, e))?;
        for field in record.iter().filter(|f| !f.is_empty()) {
            let value = field.parse::<f32>().map_err(|e| {
                YoloError::weight_load(layer, path, format!("bad value {field:?}: {e}"))
            })?;
            values.push(value);
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn reads_values_across_lines_and_trailing_commas() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "v.csv", "1, 2.5,-3,\n4e-1,5\n");
        let values = read_flat_values(&dir.path().join("v.csv"), 0).unwrap();
        assert_eq!(values, vec![1.0, 2.5, -3.0, 0.4, 5.0]);
    }

    #[test]
    fn non_numeric_field_is_a_weight_load_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "v.csv", "1,abc,3");
        let err = read_flat_values(&dir.path().join("v.csv"), 4).unwrap_err();
        assert!(matches!(err, YoloError::WeightLoad { layer: 4, .. }));
    }

    #[test]
    fn extra_values_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "v.csv", "1,2,3,4");
        let values = read_exact(&dir.path().join("v.csv"), 0, 3).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn file_names_are_one_based() {
        let dir = WeightDir::new("/w");
        assert_eq!(
            dir.weight_path(ParamKind::Conv, 0),
            PathBuf::from("/w/conv_weight_layer1.csv")
        );
        assert_eq!(
            dir.bias_path(ParamKind::Connected, 31),
            PathBuf::from("/w/connect_bias_layer32.csv")
        );
    }
}
