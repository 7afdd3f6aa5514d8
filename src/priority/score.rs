use serde::Serialize;

use super::tables::{class_threshold, zone_weight};
use super::zone::Zone;
use crate::detect::Detection;

pub const AREA_COEFFICIENT: f32 = 2.5;
pub const CLASS_COEFFICIENT: f32 = 1.8;
pub const ZONE_COEFFICIENT: f32 = 2.0;

/// Urgency of a detection. Larger is more urgent; the sum is not clamped.
///
/// Classes with a low area threshold weigh more through `1 - threshold`.
pub fn priority_score(detection: &Detection) -> f32 {
    let class_weight = 1.0 - class_threshold(&detection.class_name);
    let zone = Zone::of(detection);
    detection.area() * AREA_COEFFICIENT
        + class_weight * CLASS_COEFFICIENT
        + zone_weight(zone) * ZONE_COEFFICIENT
}

/// Relevance bar: the box must be well formed and at least as large as its
/// class threshold.
pub fn is_actionable(detection: &Detection) -> bool {
    detection.is_well_formed() && detection.area() >= class_threshold(&detection.class_name)
}

/// A detection that cleared the relevance bar, with its score and zone.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ranked {
    pub detection: Detection,
    pub score: f32,
    pub zone: Zone,
}

/// Filter, score and sort one frame's detections, most urgent first.
///
/// Detections below their threshold are dropped. Equal scores keep their input
/// order. The list is not truncated.
pub fn rank(detections: Vec<Detection>) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = detections
        .into_iter()
        .filter(is_actionable)
        .map(|detection| Ranked {
            score: priority_score(&detection),
            zone: Zone::of(&detection),
            detection,
        })
        .collect();
    sort_most_urgent_first(&mut ranked, |r| r.score);
    ranked
}

/// Same as `rank`, without the scores.
pub fn filter_and_prioritize(detections: Vec<Detection>) -> Vec<Detection> {
    rank(detections).into_iter().map(|r| r.detection).collect()
}

// `sort_by` is stable, so ties stay in input order.
fn sort_most_urgent_first<T>(items: &mut [T], score: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| score(b).total_cmp(&score(a)));
}
