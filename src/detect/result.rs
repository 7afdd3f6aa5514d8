use serde::{Deserialize, Serialize};

/// One object reported by the detector for a single frame.
///
/// Corners are normalized to the frame (full frame is 1x1). `confidence` is
/// carried for display only; prioritization never reads it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, confidence: f32, corners: [f32; 4]) -> Self {
        let [x1, y1, x2, y2] = corners;
        Self {
            class_name: class_name.into(),
            confidence,
            x1,
            y1,
            x2,
            y2,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Normalized area (fraction of the frame covered by the box).
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    pub fn bottom_y(&self) -> f32 {
        self.y2
    }

    /// True when all corners are finite and the box is not empty or inverted.
    pub fn is_well_formed(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 < self.x2
            && self.y1 < self.y2
    }
}

/// What the detector reported for one submitted frame.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionOutcome {
    NoDetections,
    Detections {
        /// Order is irrelevant; the prioritization engine ranks them.
        detections: Vec<Detection>,
        inference_ms: u64,
    },
}

impl DetectionOutcome {
    /// Empty lists collapse to `NoDetections`.
    pub fn from_detections(detections: Vec<Detection>, inference_ms: u64) -> Self {
        if detections.is_empty() {
            Self::NoDetections
        } else {
            Self::Detections {
                detections,
                inference_ms,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoDetections)
    }
}
