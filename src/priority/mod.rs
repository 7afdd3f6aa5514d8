//! Prioritization engine.
//!
//! Pure functions from one frame's detections to a ranked list and a single
//! alert string. Nothing here blocks or logs; the lookup tables are read-only
//! after first use, so every function is safe to call from any thread.

mod alert;
mod score;
mod tables;
mod zone;

pub use alert::{alert_text, display_name, top_alert, GENERIC_OBSTACLE};
pub use score::{
    filter_and_prioritize, is_actionable, priority_score, rank, Ranked, AREA_COEFFICIENT,
    CLASS_COEFFICIENT, ZONE_COEFFICIENT,
};
pub use tables::{
    class_threshold, is_tuned_class, zone_weight, CLASS_THRESHOLDS, DEFAULT_CLASS_KEY,
    DEFAULT_CLASS_THRESHOLD,
};
pub use zone::{Zone, CENTER_LANE, FLOOR_LINE};
