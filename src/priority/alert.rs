use std::borrow::Cow;

use super::score::rank;
use super::tables::is_tuned_class;
use super::zone::Zone;
use crate::detect::Detection;

/// Generic name used for classes without a tuned threshold.
pub const GENERIC_OBSTACLE: &str = "obstacle";

/// Name spoken for a class. Classes that are not keys of the threshold table
/// hide behind `obstacle`; the `default` key itself is spoken as is.
/// Underscores read as spaces.
pub fn display_name(class_name: &str) -> Cow<'_, str> {
    let name = if is_tuned_class(class_name) {
        class_name
    } else {
        GENERIC_OBSTACLE
    };
    if name.contains('_') {
        Cow::Owned(name.replace('_', " "))
    } else {
        Cow::Borrowed(name)
    }
}

/// Short description of what the detection is and where, e.g.
/// `"dog on your left"`.
pub fn alert_text(detection: &Detection) -> String {
    format!(
        "{} {}",
        display_name(&detection.class_name),
        Zone::of(detection).phrase()
    )
}

/// Alert for the single most urgent detection of a frame, if any survives
/// the filter.
pub fn top_alert(detections: Vec<Detection>) -> Option<String> {
    rank(detections)
        .first()
        .map(|ranked| alert_text(&ranked.detection))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_class_is_reported_as_obstacle() {
        let d = Detection::new("umbrella", 0.9, [0.4, 0.3, 0.6, 0.5]);
        assert_eq!(alert_text(&d), "obstacle ahead");
    }

    #[test]
    fn known_class_keeps_its_name() {
        let d = Detection::new("dog", 0.9, [0.05, 0.3, 0.15, 0.5]);
        assert_eq!(alert_text(&d), "dog on your left");
        let d = Detection::new("fire hydrant", 0.9, [0.8, 0.3, 0.95, 0.5]);
        assert_eq!(alert_text(&d), "fire hydrant on your right");
    }

    #[test]
    fn multiword_classes_and_raw_labels() {
        assert_eq!(display_name("traffic light"), "traffic light");
        assert_eq!(display_name("traffic_light"), "obstacle");
        assert_eq!(display_name("stop sign"), "stop sign");
    }

    #[test]
    fn default_key_is_spoken_as_is() {
        assert_eq!(display_name("default"), "default");
        let d = Detection::new("default", 0.9, [0.4, 0.3, 0.6, 0.5]);
        assert_eq!(alert_text(&d), "default ahead");
    }

    #[test]
    fn top_alert_picks_the_most_urgent() {
        let near_floor = Detection::new("bench", 0.4, [0.2, 0.5, 0.6, 0.95]);
        let far_right = Detection::new("bench", 0.9, [0.8, 0.1, 0.95, 0.4]);
        assert_eq!(
            top_alert(vec![far_right, near_floor]).as_deref(),
            Some("bench ahead on the floor")
        );
        assert_eq!(top_alert(Vec::new()), None);
    }
}
