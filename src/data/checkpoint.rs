//! Checkpoint artifact: an `.npz` archive with one `.npy` entry per parameter tensor,
//! named after the owning layer (`layer00_conv_weight.npy`, `layer31_connected_bias.npy`, ...).

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use ndarray::ArrayD;
use ndarray_npy::{NpzReader, NpzWriter};
use crate::detection_runners::yolo_v1::Network;
use crate::error::YoloError;
use crate::Result;

fn entry_name(param: &str) -> String {
    format!("{param}.npy")
}

fn param_of(entry: &str) -> &str {
    let mut name = entry;
    while let Some(stem) = name.strip_suffix(".npy") {
        name = stem;
    }
    name
}

/// Writes every parameter of `network` to `path`, creating parent directories as needed.
pub fn save_checkpoint(network: &Network, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path).map_err(|e| YoloError::checkpoint_write(path, e))?;
    let mut npz = NpzWriter::new(BufWriter::new(file));
    let params = network.named_parameters();
    for (name, tensor) in &params {
        npz.add_array(entry_name(name), tensor)
            .map_err(|e| YoloError::checkpoint_write(path, format!("{name}: {e}")))?;
    }
    npz.finish().map_err(|e| YoloError::checkpoint_write(path, e))?;

    log::info!(
        "Saved {} tensors ({} values) to {}",
        params.len(),
        network.parameter_count(),
        path.display()
    );
    Ok(())
}

/// Overwrites every parameter of `network` with the values stored at `path`.
///
/// The archive must hold an entry for each parameter with exactly the same shape,
/// otherwise nothing useful can be restored and a `CheckpointMismatch` is returned.
pub fn restore_checkpoint(network: &mut Network, path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| YoloError::checkpoint_mismatch(path, e))?;
    let mut npz = NpzReader::new(file).map_err(|e| YoloError::checkpoint_mismatch(path, e))?;
    let mut stored: HashSet<String> = npz
        .names()
        .map_err(|e| YoloError::checkpoint_mismatch(path, e))?
        .iter()
        .map(|entry| param_of(entry).to_string())
        .collect();

    for (name, mut dst) in network.named_parameters_mut() {
        let entry = entry_name(&name);
        if !stored.remove(&name) {
            return Err(YoloError::checkpoint_mismatch(path, format!("missing tensor {name}")));
        }
        let src: ArrayD<f32> = npz
            .by_name(&entry)
            .map_err(|e| YoloError::checkpoint_mismatch(path, format!("{name}: {e}")))?;
        if src.shape() != dst.shape() {
            return Err(YoloError::checkpoint_mismatch(
                path,
                format!("{name} has shape {:?}, network expects {:?}", src.shape(), dst.shape()),
            ));
        }
        dst.assign(&src);
    }

    if !stored.is_empty() {
        log::warn!(
            "{} holds {} tensors the network does not use",
            path.display(),
            stored.len()
        );
    }
    log::info!("Restored parameters from {}", path.display());
    Ok(())
}
