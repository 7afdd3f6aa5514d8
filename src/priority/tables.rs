//! Static lookup tables for prioritization.
//!
//! Both tables are process-wide read-only configuration, built once on first
//! use and shared by reference afterwards.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::zone::Zone;

/// Table key holding the fallback threshold.
pub const DEFAULT_CLASS_KEY: &str = "default";

/// Minimum normalized area for any class not listed in `CLASS_THRESHOLDS`.
pub const DEFAULT_CLASS_THRESHOLD: f32 = 0.05;

/// Minimum normalized area (width x height) per class.
///
/// Lower thresholds mark obstacles worth reporting while still small.
pub const CLASS_THRESHOLDS: &[(&str, f32)] = &[
    // High priority
    ("person", 0.03),
    ("bicycle", 0.04),
    ("car", 0.05),
    ("motorcycle", 0.04),
    ("bus", 0.06),
    ("truck", 0.07),
    // Medium priority
    ("traffic light", 0.02),
    ("fire hydrant", 0.015),
    ("stop sign", 0.01),
    ("bench", 0.04),
    ("dog", 0.02),
    ("cat", 0.015),
    // Low priority
    ("chair", 0.05),
    ("potted plant", 0.04),
];

fn thresholds() -> &'static HashMap<&'static str, f32> {
    static TABLE: OnceLock<HashMap<&'static str, f32>> = OnceLock::new();
    TABLE.get_or_init(|| {
        CLASS_THRESHOLDS
            .iter()
            .copied()
            .chain([(DEFAULT_CLASS_KEY, DEFAULT_CLASS_THRESHOLD)])
            .collect()
    })
}

/// Area threshold for `class_name`, falling back to `DEFAULT_CLASS_THRESHOLD`.
pub fn class_threshold(class_name: &str) -> f32 {
    thresholds()
        .get(class_name)
        .copied()
        .unwrap_or(DEFAULT_CLASS_THRESHOLD)
}

/// True when `class_name` is a key of the threshold table, `default` included.
pub fn is_tuned_class(class_name: &str) -> bool {
    thresholds().contains_key(class_name)
}

/// Danger multiplier per zone.
pub fn zone_weight(zone: Zone) -> f32 {
    match zone {
        Zone::Floor => 1.2,
        Zone::Center => 1.0,
        Zone::Left => 0.7,
        Zone::Right => 0.7,
    }
}
