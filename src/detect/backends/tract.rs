#![cfg(feature = "backend-tract")]

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use tract_onnx::prelude::tract_ndarray::{ArrayView3, Ix3};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionOutcome};
use crate::frame::{Frame, PixelFormat};

/// Box center and size channels that precede the class scores.
const CXYWH_OFFSET: usize = 4;

/// Tract-based backend for YOLOv8 ONNX models.
///
/// Input is `[1, 3, H, W]` float RGB in 0..1. Output is
/// `[1, 4 + classes, anchors]`, boxes as center/size in input pixels.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    labels: Vec<String>,
    confidence_threshold: f32,
    iou_threshold: f32,
    closed: bool,
}

impl TractBackend {
    /// Load an ONNX model and its label file (one label per line).
    pub fn new<P: AsRef<Path>, L: AsRef<Path>>(
        model_path: P,
        labels_path: L,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            labels: load_labels(labels_path.as_ref())?,
            confidence_threshold: 0.3,
            iou_threshold: 0.5,
            closed: false,
        })
    }

    /// Override the default confidence and IoU thresholds.
    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }
        if frame.format() != PixelFormat::Rgba8888 {
            return Err(anyhow!("expected RGBA frame, got {:?}", frame.format()));
        }

        let pixels = frame.pixels();
        let width = self.width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, width),
            |(_, channel, y, x)| pixels[(y * width + x) * 4 + channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let preds = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<Ix3>()
            .context("model output is not [1, channels, anchors]")?;
        let candidates = decode_anchors(
            preds,
            &self.labels,
            (self.width, self.height),
            self.confidence_threshold,
        )?;
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

/// Turn a `[1, 4 + classes, anchors]` prediction into candidate detections.
///
/// Each anchor keeps its best class. Boxes are given as center and size in
/// input pixels and come out as normalized corners clamped to the frame.
/// Anchors below `confidence_threshold` or with an empty clamped box are
/// dropped. Classes past the end of `labels` are named `class{id}`.
fn decode_anchors(
    preds: ArrayView3<'_, f32>,
    labels: &[String],
    (width, height): (u32, u32),
    confidence_threshold: f32,
) -> Result<Vec<Detection>> {
    let channels = preds.shape()[1];
    if channels <= CXYWH_OFFSET {
        bail!("model output has {} channels, no class scores", channels);
    }
    let w = width as f32;
    let h = height as f32;

    let mut candidates = Vec::new();
    for anchor in 0..preds.shape()[2] {
        let (class_id, confidence) = (CXYWH_OFFSET..channels)
            .map(|c| (c - CXYWH_OFFSET, preds[[0, c, anchor]]))
            .fold((0, f32::NEG_INFINITY), |best, x| if x.1 > best.1 { x } else { best });
        if confidence < confidence_threshold {
            continue;
        }

        let cx = preds[[0, 0, anchor]] / w;
        let cy = preds[[0, 1, anchor]] / h;
        let bw = preds[[0, 2, anchor]] / w;
        let bh = preds[[0, 3, anchor]] / h;
        let corners = [
            (cx - bw / 2.0).clamp(0.0, 1.0),
            (cy - bh / 2.0).clamp(0.0, 1.0),
            (cx + bw / 2.0).clamp(0.0, 1.0),
            (cy + bh / 2.0).clamp(0.0, 1.0),
        ];
        if corners[2] <= corners[0] || corners[3] <= corners[1] {
            continue;
        }
        let label = labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id));
        candidates.push(Detection::new(label, confidence, corners));
    }
    Ok(candidates)
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_width(&self) -> u32 {
        self.width
    }

    fn input_height(&self) -> u32 {
        self.height
    }

    fn input_format(&self) -> PixelFormat {
        PixelFormat::Rgba8888
    }

    fn detect(&mut self, frame: Frame) -> Result<DetectionOutcome> {
        if self.closed {
            bail!("tract backend used after close");
        }
        let started = Instant::now();
        let input = self.build_input(&frame)?;
        drop(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let detections = self.decode(outputs)?;
        Ok(DetectionOutcome::from_detections(
            detections,
            started.elapsed().as_millis() as u64,
        ))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            bail!("tract backend closed twice");
        }
        self.closed = true;
        Ok(())
    }
}

fn load_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labels file {}", path.display()))?;
    let labels: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        bail!("labels file {} is empty", path.display());
    }
    Ok(labels)
}

/// Greedy NMS, highest confidence first.
fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &Detection, b: &Detection) -> f32 {
    let ix = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let iy = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let intersection = ix * iy;
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_drops_overlapping_lower_confidence_boxes() {
        let strong = Detection::new("person", 0.9, [0.1, 0.1, 0.5, 0.5]);
        let overlapping = Detection::new("person", 0.6, [0.12, 0.12, 0.52, 0.52]);
        let separate = Detection::new("car", 0.7, [0.6, 0.6, 0.9, 0.9]);
        let kept = non_max_suppression(vec![overlapping, separate.clone(), strong.clone()], 0.5);
        assert_eq!(kept, vec![strong, separate]);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = Detection::new("a", 1.0, [0.0, 0.0, 0.1, 0.1]);
        let b = Detection::new("b", 1.0, [0.5, 0.5, 0.6, 0.6]);
        assert_eq!(iou(&a, &b), 0.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    /// Three anchors over two classes on a 100x50 input, laid out as the
    /// model emits them: `[1, 4 + classes, anchors]`.
    fn predictions() -> tract_ndarray::Array3<f32> {
        let rows: [[f32; 3]; 6] = [
            // cx, cy, w, h
            [50.0, 90.0, 10.0],
            [25.0, 10.0, 40.0],
            [20.0, 40.0, 10.0],
            [10.0, 40.0, 10.0],
            // class scores
            [0.9, 0.1, 0.2],
            [0.2, 0.8, 0.1],
        ];
        tract_ndarray::Array3::from_shape_fn((1, 6, 3), |(_, c, a)| rows[c][a])
    }

    #[test]
    fn anchors_become_normalized_corners() -> Result<()> {
        let preds = predictions();
        let found = decode_anchors(preds.view(), &labels(&["person", "car"]), (100, 50), 0.3)?;

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].class_name, "person");
        assert_eq!(found[0].confidence, 0.9);
        let expected = [0.4, 0.4, 0.6, 0.6];
        for (got, want) in [found[0].x1, found[0].y1, found[0].x2, found[0].y2]
            .iter()
            .zip(expected)
        {
            assert!((got - want).abs() < 1e-6, "{} != {}", got, want);
        }

        // Box reaching past the right and top edges is clamped.
        assert_eq!(found[1].class_name, "car");
        assert_eq!((found[1].x2, found[1].y1), (1.0, 0.0));
        assert!((found[1].x1 - 0.7).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn low_confidence_anchors_are_dropped() -> Result<()> {
        let preds = predictions();
        let found = decode_anchors(preds.view(), &labels(&["person", "car"]), (100, 50), 0.85)?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].class_name, "person");
        Ok(())
    }

    #[test]
    fn unknown_class_ids_get_a_generic_label() -> Result<()> {
        let preds = predictions();
        let found = decode_anchors(preds.view(), &labels(&["person"]), (100, 50), 0.3)?;
        assert_eq!(found[1].class_name, "class1");
        Ok(())
    }

    #[test]
    fn output_without_class_channels_is_rejected() {
        let preds = tract_ndarray::Array3::<f32>::zeros((1, 4, 2));
        assert!(decode_anchors(preds.view(), &labels(&["person"]), (100, 50), 0.3).is_err());
    }

    #[test]
    fn labels_skip_blank_lines() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        std::fs::write(file.path(), "person\n\nbicycle\ncar\n")?;
        assert_eq!(load_labels(file.path())?, vec!["person", "bicycle", "car"]);
        Ok(())
    }
}
