use serde::{Deserialize, Serialize};

const LEVEL_BASE_POINTS: f64 = 100.0;
const LEVEL_EXPONENT: f64 = 1.5;
pub const STARTING_LEVEL: u32 = 1;

/// Total points required to reach `level`.
pub fn points_for_level(level: u32) -> i64 {
    (LEVEL_BASE_POINTS * f64::from(level).powf(LEVEL_EXPONENT)).floor() as i64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: u32,
    pub points_to_next_level: i64,
    pub title: String,
}

pub fn calculate_level(total_points: i64) -> LevelProgress {
    let mut level = STARTING_LEVEL;
    while points_for_level(level + 1) <= total_points {
        level += 1;
    }
    LevelProgress {
        level,
        points_to_next_level: points_for_level(level + 1) - total_points,
        title: level_title(level).to_string(),
    }
}

pub fn level_title(level: u32) -> &'static str {
    match level {
        40.. => "Legendary Naturalist",
        30..=39 => "Elite Naturalist",
        20..=29 => "Master Naturalist",
        15..=19 => "Expert Naturalist",
        10..=14 => "Field Naturalist",
        5..=9 => "Amateur Naturalist",
        _ => "Novice Naturalist",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_requirements_grow_superlinearly() {
        assert_eq!(points_for_level(1), 100);
        assert_eq!(points_for_level(2), 282);
        assert_eq!(points_for_level(4), 800);
    }

    #[test]
    fn level_is_highest_reached_requirement() {
        assert_eq!(calculate_level(0).level, 1);
        assert_eq!(calculate_level(281).level, 1);
        assert_eq!(calculate_level(281).points_to_next_level, 1);
        assert_eq!(calculate_level(282).level, 2);
        assert_eq!(calculate_level(800).level, 4);
    }

    #[test]
    fn titles_by_band() {
        assert_eq!(level_title(1), "Novice Naturalist");
        assert_eq!(level_title(12), "Field Naturalist");
        assert_eq!(level_title(55), "Legendary Naturalist");
    }
}
