use anyhow::Result;

use crate::detect::result::DetectionOutcome;
use crate::frame::{Frame, PixelFormat};

/// Detector backend trait.
///
/// The scheduler queries the input properties before every submission and
/// hands over a frame already converted to `input_format()` and scaled to
/// `input_width()` x `input_height()`. The frame is moved into `detect` and is
/// released when the call returns.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    fn input_width(&self) -> u32;

    fn input_height(&self) -> u32;

    fn input_format(&self) -> PixelFormat;

    /// Run detection on a frame.
    fn detect(&mut self, frame: Frame) -> Result<DetectionOutcome>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release backend resources. Called exactly once, at teardown.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
