#![allow(dead_code)]

use std::path::Path;
use yolo_small::detection_runners::yolo_v1::topology::{LayerSpec, OUTPUT_LEN};

/// Side length of the inputs `TINY` is built for.
pub const TINY_INPUT: u32 = 16;

/// Reduced network with every layer kind, ending in the full 1470-value output.
pub const TINY: &[LayerSpec] = &[
    LayerSpec::conv(0, 3, 4, 2),
    LayerSpec::max_pool(1, 2, 2),
    LayerSpec::conv(2, 1, 2, 1),
    LayerSpec::Flatten,
    LayerSpec::connected(3, 8, true),
    LayerSpec::dropout(4),
    LayerSpec::connected(5, OUTPUT_LEN, false),
];

fn write_values(path: &Path, len: usize, scale: f32) {
    let line = (0..len)
        .map(|i| format!("{}", ((i % 17) as f32 - 8.0) * scale))
        .collect::<Vec<_>>()
        .join(",");
    std::fs::write(path, line).unwrap();
}

/// Writes the darknet CSV export of `TINY` into `dir`.
pub fn write_tiny_weights(dir: &Path) {
    // conv 0: 3x3x3x4, conv 2: 1x1x4x2, fc 3: 32x8, fc 5: 8x1470
    write_values(&dir.join("conv_weight_layer1.csv"), 3 * 3 * 3 * 4, 0.01);
    write_values(&dir.join("conv_bias_layer1.csv"), 4, 0.1);
    write_values(&dir.join("conv_weight_layer3.csv"), 4 * 2, 0.05);
    write_values(&dir.join("conv_bias_layer3.csv"), 2, 0.1);
    write_values(&dir.join("connect_weight_layer4.csv"), 32 * 8, 0.02);
    write_values(&dir.join("connect_bias_layer4.csv"), 8, 0.1);
    write_values(&dir.join("connect_weight_layer6.csv"), 8 * OUTPUT_LEN, 0.03);
    write_values(&dir.join("connect_bias_layer6.csv"), OUTPUT_LEN, 0.01);
}
