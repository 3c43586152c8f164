//! Fixed layer table of the yolo-small network (darknet `yolov1/yolo-small.cfg`).
//!
//! Indices follow the darknet layer numbering: pooling and dropout layers take an index
//! slot too, so convolution and connected layers are not numbered contiguously. The
//! per-layer weight files are named after `index + 1`.

/// Side length of the square network input.
pub const INPUT_SIZE: usize = 448;
pub const INPUT_CHANNELS: usize = 3;

/// Output grid is `GRID_SIZE x GRID_SIZE` cells of `CELL_DEPTH` values each.
pub const GRID_SIZE: usize = 7;
pub const CELL_DEPTH: usize = 30;
pub const BOXES_PER_CELL: usize = 2;
pub const BOX_COORDS: usize = 4;
pub const OUTPUT_LEN: usize = GRID_SIZE * GRID_SIZE * CELL_DEPTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerSpec {
    /// Padded `kernel[0] x kernel[1]` convolution followed by the leaky activation.
    Conv {
        index: usize,
        kernel: [usize; 2],
        filters: usize,
        stride: usize,
    },
    MaxPool {
        index: usize,
        size: usize,
        stride: usize,
    },
    /// NHWC -> NCHW transpose, then flatten to `[batch, c*h*w]`.
    Flatten,
    Connected {
        index: usize,
        outputs: usize,
        leaky: bool,
    },
    Dropout {
        index: usize,
    },
}

impl LayerSpec {
    pub const fn conv(index: usize, kernel: usize, filters: usize, stride: usize) -> Self {
        Self::Conv {
            index,
            kernel: [kernel, kernel],
            filters,
            stride,
        }
    }

    pub const fn max_pool(index: usize, size: usize, stride: usize) -> Self {
        Self::MaxPool { index, size, stride }
    }

    pub const fn connected(index: usize, outputs: usize, leaky: bool) -> Self {
        Self::Connected { index, outputs, leaky }
    }

    pub const fn dropout(index: usize) -> Self {
        Self::Dropout { index }
    }

    /// Darknet layer index, `None` for the structural flatten step.
    pub fn index(&self) -> Option<usize> {
        match *self {
            Self::Conv { index, .. }
            | Self::MaxPool { index, .. }
            | Self::Connected { index, .. }
            | Self::Dropout { index } => Some(index),
            Self::Flatten => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conv { .. } => "conv",
            Self::MaxPool { .. } => "maxpool",
            Self::Flatten => "flatten",
            Self::Connected { .. } => "connected",
            Self::Dropout { .. } => "dropout",
        }
    }
}

pub const YOLO_SMALL: &[LayerSpec] = &[
    LayerSpec::conv(0, 7, 64, 2),
    LayerSpec::max_pool(1, 2, 2),
    LayerSpec::conv(2, 3, 192, 1),
    LayerSpec::max_pool(3, 2, 2),
    LayerSpec::conv(4, 1, 128, 1),
    LayerSpec::conv(5, 3, 256, 1),
    LayerSpec::conv(6, 1, 256, 1),
    LayerSpec::conv(7, 3, 512, 1),
    LayerSpec::max_pool(8, 2, 2),
    LayerSpec::conv(9, 1, 256, 1),
    LayerSpec::conv(10, 3, 512, 1),
    LayerSpec::conv(11, 1, 256, 1),
    LayerSpec::conv(12, 3, 512, 1),
    LayerSpec::conv(13, 1, 256, 1),
    LayerSpec::conv(14, 3, 512, 1),
    LayerSpec::conv(15, 1, 256, 1),
    LayerSpec::conv(16, 3, 512, 1),
    LayerSpec::conv(17, 1, 512, 1),
    LayerSpec::conv(18, 3, 1024, 1),
    LayerSpec::max_pool(19, 2, 2),
    LayerSpec::conv(20, 1, 512, 1),
    LayerSpec::conv(21, 3, 1024, 1),
    LayerSpec::conv(22, 1, 512, 1),
    LayerSpec::conv(23, 3, 1024, 1),
    LayerSpec::conv(24, 3, 1024, 1),
    LayerSpec::conv(25, 3, 1024, 2),
    LayerSpec::conv(26, 3, 1024, 1),
    LayerSpec::conv(27, 3, 1024, 1),
    LayerSpec::Flatten,
    LayerSpec::connected(28, 512, true),
    LayerSpec::connected(29, 4096, true),
    LayerSpec::dropout(30),
    LayerSpec::connected(31, OUTPUT_LEN, false),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yolo_small_has_expected_layer_counts() {
        let count = |kind: &str| YOLO_SMALL.iter().filter(|l| l.kind() == kind).count();
        assert_eq!(count("conv"), 24);
        assert_eq!(count("maxpool"), 4);
        assert_eq!(count("connected"), 3);
        assert_eq!(count("dropout"), 1);
        assert_eq!(count("flatten"), 1);
    }

    #[test]
    fn indices_are_increasing_and_end_at_31() {
        let indices: Vec<usize> = YOLO_SMALL.iter().filter_map(LayerSpec::index).collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(indices.last(), Some(&31));
        assert_eq!(indices.len(), 32);
    }

    #[test]
    fn final_layer_is_linear_and_sized_to_the_grid() {
        assert_eq!(
            YOLO_SMALL.last(),
            Some(&LayerSpec::connected(31, 1470, false))
        );
    }
}
