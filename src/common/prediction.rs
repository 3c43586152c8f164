use std::ops::Range;
use ndarray::{s, Array3, Array4, ArrayView3};
use serde::Serialize;
use crate::detection_runners::yolo_v1::topology::{BOXES_PER_CELL, BOX_COORDS, CELL_DEPTH, GRID_SIZE, OUTPUT_LEN};
use crate::error::YoloError;
use crate::Result;

/// Where each group of values sits within a cell's `CELL_DEPTH` slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionLayout {
    pub classes: Range<usize>,
    pub confidence: Range<usize>,
    pub boxes: Range<usize>,
}

impl PredictionLayout {
    /// Slice boundaries of the reference decoder: 19 class slots (slot 19 unused), one
    /// confidence slot at 20, slot 21 skipped, and two boxes in 22..30. These do not add up
    /// to the 20 class / 2 confidence / 8 coordinate split of the published YOLOv1 layout and
    /// are kept as-is until confirmed against the darknet weights.
    pub const ORIGINAL: Self = Self {
        classes: 0..19,
        confidence: 20..21,
        boxes: 22..30,
    };

    /// 20 classes, one confidence per box, then the box coordinates.
    pub const PAPER: Self = Self {
        classes: 0..20,
        confidence: 20..22,
        boxes: 22..30,
    };

    fn validate(&self) -> Result<()> {
        let fits = |r: &Range<usize>| r.start <= r.end && r.end <= CELL_DEPTH;
        if !fits(&self.classes) || !fits(&self.confidence) || !fits(&self.boxes) {
            return Err(YoloError::config(format!("{self:?} exceeds the {CELL_DEPTH} cell slots")));
        }
        if self.boxes.len() != BOXES_PER_CELL * BOX_COORDS {
            return Err(YoloError::config(format!(
                "box slice must hold {} values, got {}",
                BOXES_PER_CELL * BOX_COORDS,
                self.boxes.len()
            )));
        }
        Ok(())
    }
}

impl Default for PredictionLayout {
    fn default() -> Self {
        Self::ORIGINAL
    }
}

/// The flat network output restructured into per-cell groups. No thresholding, NMS, or
/// conversion to pixel coordinates is applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub layout: PredictionLayout,
    /// `[7, 7, classes.len()]`
    pub class_probabilities: Array3<f32>,
    /// `[7, 7, confidence.len()]`
    pub confidence: Array3<f32>,
    /// `[7, 7, 2, 4]`
    pub boxes: Array4<f32>,
}

/// The strongest class score in a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellScore {
    pub row: usize,
    pub col: usize,
    pub class_id: usize,
    pub score: f32,
}

impl Prediction {
    /// Reshapes a `OUTPUT_LEN` vector to `[7, 7, 30]` and slices it per `layout`.
    pub fn decode(output: &[f32], layout: PredictionLayout) -> Result<Self> {
        if output.len() != OUTPUT_LEN {
            return Err(YoloError::config(format!(
                "expected {OUTPUT_LEN} output values, got {}",
                output.len()
            )));
        }
        layout.validate()?;

        let grid = ArrayView3::from_shape((GRID_SIZE, GRID_SIZE, CELL_DEPTH), output)?;
        let class_probabilities = grid.slice(s![.., .., layout.classes.clone()]).to_owned();
        let confidence = grid.slice(s![.., .., layout.confidence.clone()]).to_owned();
        let boxes = grid
            .slice(s![.., .., layout.boxes.clone()])
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((GRID_SIZE, GRID_SIZE, BOXES_PER_CELL, BOX_COORDS))?;

        Ok(Self {
            layout,
            class_probabilities,
            confidence,
            boxes,
        })
    }

    /// Cell with the highest `class probability * first confidence`, if any classes exist.
    pub fn strongest_cell(&self) -> Option<CellScore> {
        let mut best: Option<CellScore> = None;
        for ((row, col, class_id), &p) in self.class_probabilities.indexed_iter() {
            let conf = self.confidence.get((row, col, 0)).copied().unwrap_or(1.0);
            let score = p * conf;
            if best.map_or(true, |b| score > b.score) {
                best = Some(CellScore { row, col, class_id, score });
            }
        }
        best
    }
}
