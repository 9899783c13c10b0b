use serde::{Deserialize, Serialize};

use super::RarityOutcome;
use crate::observations::QualityGrade;

pub const BASE_OBSERVATION_POINTS: i64 = 10;
pub const RESEARCH_GRADE_POINTS: i64 = 25;
pub const POINTS_PER_PHOTO: i64 = 5;
pub const MAX_SCORED_PHOTOS: u32 = 3;

/// Points earned by a single observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsBreakdown {
    pub base: i64,
    pub research_grade: i64,
    pub photos: i64,
    pub rarity: i64,
}

impl PointsBreakdown {
    pub fn total(&self) -> i64 {
        self.base + self.research_grade + self.photos + self.rarity
    }
}

pub fn calculate_observation_points(
    quality_grade: QualityGrade,
    photos_count: u32,
    rarity: Option<&RarityOutcome>,
) -> PointsBreakdown {
    PointsBreakdown {
        base: BASE_OBSERVATION_POINTS,
        research_grade: if quality_grade == QualityGrade::Research {
            RESEARCH_GRADE_POINTS
        } else {
            0
        },
        photos: i64::from(photos_count.min(MAX_SCORED_PHOTOS)) * POINTS_PER_PHOTO,
        rarity: rarity.map(RarityOutcome::bonus_points).unwrap_or(0),
    }
}
