use super::{OverlaySink, ReferenceGrid};
use crate::detect::Detection;
use crate::priority::Zone;

/// Logs the top result and alert changes instead of drawing.
pub struct ConsoleOverlay {
    grid: ReferenceGrid,
    top: Option<Detection>,
    last_alert: Option<String>,
}

impl ConsoleOverlay {
    pub fn new() -> Self {
        let grid = ReferenceGrid::default();
        log::info!(
            "overlay grid: floor line {:.0}%, center lane {:.0}%..{:.0}%",
            grid.floor_line * 100.0,
            grid.lane_left * 100.0,
            grid.lane_right * 100.0
        );
        Self {
            grid,
            top: None,
            last_alert: None,
        }
    }

    pub fn grid(&self) -> ReferenceGrid {
        self.grid
    }
}

impl Default for ConsoleOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlaySink for ConsoleOverlay {
    fn set_results(&mut self, results: Vec<Detection>) {
        self.top = results.into_iter().next();
        match &self.top {
            Some(d) => log::debug!(
                "overlay: {} {:.2} [{:.2}, {:.2}, {:.2}, {:.2}] zone={}",
                d.class_name,
                d.confidence,
                d.x1,
                d.y1,
                d.x2,
                d.y2,
                Zone::of(d)
            ),
            None => log::debug!("overlay: nothing above threshold"),
        }
    }

    fn clear(&mut self) {
        if self.top.take().is_some() {
            log::debug!("overlay cleared");
        }
        self.last_alert = None;
    }

    fn show_alert(&mut self, alert: &str) {
        if self.last_alert.as_deref() != Some(alert) {
            log::info!("alert: {}", alert);
            self.last_alert = Some(alert.to_string());
        }
    }

    fn show_inference_time(&mut self, inference_ms: u64) {
        log::trace!("inference: {}ms", inference_ms);
    }
}
