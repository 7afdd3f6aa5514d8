//! Overlay sinks.
//!
//! A sink lives on the thread that owns the scheduler and is only touched from
//! there; detector results reach it through `Scheduler::pump_events`. Sinks
//! decide how much of the ranked list to draw. The ones here show the top
//! entry only, over the reference grid.

mod console;
mod recording;

pub use console::ConsoleOverlay;
pub use recording::{OverlayState, RecordingOverlay};

use crate::detect::Detection;
use crate::priority::{CENTER_LANE, FLOOR_LINE};

/// Destination for prioritized results and alert text.
pub trait OverlaySink {
    /// Replace the drawn results with `results`, most urgent first.
    fn set_results(&mut self, results: Vec<Detection>);

    /// Remove all results.
    fn clear(&mut self);

    fn show_alert(&mut self, alert: &str);

    fn show_inference_time(&mut self, _inference_ms: u64) {}
}

/// Static guide lines drawn under the results.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceGrid {
    /// Horizontal line; anything reaching below it is on the floor.
    pub floor_line: f32,
    pub lane_left: f32,
    pub lane_right: f32,
}

impl Default for ReferenceGrid {
    fn default() -> Self {
        Self {
            floor_line: FLOOR_LINE,
            lane_left: CENTER_LANE.0,
            lane_right: CENTER_LANE.1,
        }
    }
}

impl ReferenceGrid {
    /// Grid lines in pixels for a surface of the given size:
    /// `(floor_y, lane_left_x, lane_right_x)`.
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32) {
        let w = width as f32;
        let h = height as f32;
        (
            (self.floor_line * h).round() as u32,
            (self.lane_left * w).round() as u32,
            (self.lane_right * w).round() as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_matches_zone_boundaries() {
        let grid = ReferenceGrid::default();
        assert_eq!(grid.floor_line, 0.8);
        assert_eq!((grid.lane_left, grid.lane_right), (0.3, 0.7));
        assert_eq!(grid.to_pixels(640, 480), (384, 192, 448));
    }
}
