use std::time::Instant;

use anyhow::{bail, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionOutcome};
use crate::frame::{Frame, PixelFormat};

const BRIGHT_LUMA: u32 = 200;

/// Stub backend for demos and tests.
///
/// Reports the bounding box of all bright pixels as a single detection of a
/// fixed class. A frame with no bright pixels yields `NoDetections`.
pub struct StubBackend {
    width: u32,
    height: u32,
    class_name: String,
    closed: bool,
}

impl StubBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            class_name: "person".to_string(),
            closed: false,
        }
    }

    /// Override the reported class.
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    fn bright_bounds(&self, frame: &Frame) -> Option<[f32; 4]> {
        let width = frame.width() as usize;
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for (i, px) in frame.pixels().chunks_exact(4).enumerate() {
            let luma = (px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000;
            if luma < BRIGHT_LUMA {
                continue;
            }
            let (x, y) = (i % width, i / width);
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        let (x0, y0, x1, y1) = bounds?;
        let w = frame.width() as f32;
        let h = frame.height() as f32;
        Some([
            x0 as f32 / w,
            y0 as f32 / h,
            (x1 + 1) as f32 / w,
            (y1 + 1) as f32 / h,
        ])
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
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
            bail!("stub backend used after close");
        }
        if frame.format() != PixelFormat::Rgba8888
            || frame.width() != self.width
            || frame.height() != self.height
        {
            bail!(
                "stub backend expects {}x{} RGBA frames, got {:?}",
                self.width,
                self.height,
                frame
            );
        }
        let started = Instant::now();
        let detections = self
            .bright_bounds(&frame)
            .map(|corners| Detection::new(self.class_name.clone(), 0.9, corners))
            .into_iter()
            .collect();
        Ok(DetectionOutcome::from_detections(
            detections,
            started.elapsed().as_millis() as u64,
        ))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            bail!("stub backend closed twice");
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_block(size: u32, block: (u32, u32, u32, u32)) -> Frame {
        let (bx0, by0, bx1, by1) = block;
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let lit = x >= bx0 && x < bx1 && y >= by0 && y < by1;
                let v = if lit { 255 } else { 10 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        Frame::new(data, size, size, PixelFormat::Rgba8888, 0).unwrap()
    }

    #[test]
    fn dark_frame_has_no_detections() -> Result<()> {
        let mut backend = StubBackend::new(10, 10);
        let outcome = backend.detect(frame_with_block(10, (0, 0, 0, 0)))?;
        assert_eq!(outcome, DetectionOutcome::NoDetections);
        Ok(())
    }

    #[test]
    fn bright_block_becomes_a_detection() -> Result<()> {
        let mut backend = StubBackend::new(10, 10).with_class("dog");
        let outcome = backend.detect(frame_with_block(10, (2, 5, 4, 10)))?;
        let DetectionOutcome::Detections { detections, .. } = outcome else {
            panic!("expected detections");
        };
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.class_name, "dog");
        assert_eq!([d.x1, d.y1, d.x2, d.y2], [0.2, 0.5, 0.4, 1.0]);
        Ok(())
    }

    #[test]
    fn rejects_frames_that_were_not_prepared() {
        let mut backend = StubBackend::new(8, 8);
        assert!(backend.detect(frame_with_block(10, (0, 0, 1, 1))).is_err());
    }

    #[test]
    fn close_is_single_shot() {
        let mut backend = StubBackend::new(4, 4);
        assert!(backend.close().is_ok());
        assert!(backend.close().is_err());
        assert!(backend.detect(frame_with_block(4, (0, 0, 1, 1))).is_err());
    }
}
