use sightline::priority::{self, Zone};
use sightline::Detection;

#[test]
fn car_on_the_floor_outranks_small_cat() {
    let detections = vec![
        // area 0.10, center_x 0.5, bottom 0.9
        Detection::new("car", 0.82, [0.375, 0.5, 0.625, 0.9]),
        // area 0.01, below the cat threshold of 0.015
        Detection::new("cat", 0.91, [0.85, 0.1, 0.95, 0.2]),
    ];

    let ranked = priority::filter_and_prioritize(detections.clone());
    let classes: Vec<&str> = ranked.iter().map(|d| d.class_name.as_str()).collect();
    assert_eq!(classes, vec!["car"]);
    assert_eq!(
        priority::alert_text(&ranked[0]),
        "car ahead on the floor"
    );
    assert_eq!(
        priority::top_alert(detections).as_deref(),
        Some("car ahead on the floor")
    );
}

#[test]
fn person_threshold_boundary() {
    let small = Detection::new("person", 0.9, [0.4, 0.4, 0.5, 0.6]);
    let large = Detection::new("person", 0.9, [0.4, 0.4, 0.6, 0.6]);
    assert!(!priority::is_actionable(&small));
    assert!(priority::is_actionable(&large));
    assert_eq!(priority::filter_and_prioritize(vec![small, large]).len(), 1);
}

#[test]
fn alerts_for_untuned_and_side_classes() {
    let umbrella = Detection::new("umbrella", 0.7, [0.4, 0.2, 0.6, 0.5]);
    assert_eq!(priority::alert_text(&umbrella), "obstacle ahead");

    let dog = Detection::new("dog", 0.7, [0.0, 0.2, 0.2, 0.5]);
    assert_eq!(Zone::of(&dog), Zone::Left);
    assert_eq!(priority::alert_text(&dog), "dog on your left");

    let hydrant = Detection::new("fire hydrant", 0.7, [0.8, 0.2, 0.95, 0.5]);
    assert_eq!(priority::alert_text(&hydrant), "fire hydrant on your right");
}

#[test]
fn closer_obstacles_rank_first() {
    let far = Detection::new("bench", 0.9, [0.4, 0.3, 0.6, 0.55]);
    let near = Detection::new("bench", 0.9, [0.3, 0.3, 0.7, 0.75]);
    assert!(priority::priority_score(&near) > priority::priority_score(&far));

    let ranked = priority::rank(vec![far, near.clone()]);
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].detection, near);
    assert!(ranked[0].score >= ranked[1].score);
}

#[test]
fn empty_frame_has_no_alert() {
    assert!(priority::filter_and_prioritize(Vec::new()).is_empty());
    assert_eq!(priority::top_alert(Vec::new()), None);
}
