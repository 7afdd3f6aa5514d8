use serde::Serialize;

use crate::detect::Detection;

/// Bottom edge below which an object counts as a trip hazard.
pub const FLOOR_LINE: f32 = 0.8;
/// Horizontal extent of the walking lane.
pub const CENTER_LANE: (f32, f32) = (0.3, 0.7);

/// Coarse spatial position of a detection in the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Floor,
    Center,
    Left,
    Right,
}

impl Zone {
    /// Exactly one zone applies. Floor wins over the horizontal zones.
    pub fn classify(center_x: f32, bottom_y: f32) -> Zone {
        let (lane_left, lane_right) = CENTER_LANE;
        if bottom_y > FLOOR_LINE {
            Zone::Floor
        } else if (lane_left..=lane_right).contains(&center_x) {
            Zone::Center
        } else if center_x < lane_left {
            Zone::Left
        } else {
            Zone::Right
        }
    }

    pub fn of(detection: &Detection) -> Zone {
        Zone::classify(detection.center_x(), detection.bottom_y())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Zone::Floor => "floor",
            Zone::Center => "center",
            Zone::Left => "left",
            Zone::Right => "right",
        }
    }

    /// How the zone is spoken in an alert.
    pub fn phrase(self) -> &'static str {
        match self {
            Zone::Floor => "ahead on the floor",
            Zone::Left => "on your left",
            Zone::Right => "on your right",
            Zone::Center => "ahead",
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_takes_precedence_over_horizontal_zones() {
        assert_eq!(Zone::classify(0.5, 0.85), Zone::Floor);
        assert_eq!(Zone::classify(0.1, 0.85), Zone::Floor);
        assert_eq!(Zone::classify(0.95, 0.81), Zone::Floor);
    }

    #[test]
    fn horizontal_zones() {
        assert_eq!(Zone::classify(0.5, 0.5), Zone::Center);
        assert_eq!(Zone::classify(0.1, 0.5), Zone::Left);
        assert_eq!(Zone::classify(0.9, 0.5), Zone::Right);
    }

    #[test]
    fn boundaries() {
        // Floor line is exclusive, lane edges are inclusive.
        assert_eq!(Zone::classify(0.5, 0.8), Zone::Center);
        assert_eq!(Zone::classify(0.3, 0.2), Zone::Center);
        assert_eq!(Zone::classify(0.7, 0.2), Zone::Center);
        assert_eq!(Zone::classify(0.299, 0.2), Zone::Left);
        assert_eq!(Zone::classify(0.701, 0.2), Zone::Right);
    }

    #[test]
    fn non_finite_positions_still_get_a_zone() {
        assert_eq!(Zone::classify(f32::NAN, 0.2), Zone::Right);
        assert_eq!(Zone::classify(0.5, f32::NAN), Zone::Center);
    }

    #[test]
    fn phrases() {
        assert_eq!(Zone::Floor.phrase(), "ahead on the floor");
        assert_eq!(Zone::Center.phrase(), "ahead");
        assert_eq!(Zone::Left.phrase(), "on your left");
        assert_eq!(Zone::Right.phrase(), "on your right");
    }
}
