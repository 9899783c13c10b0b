use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::gamification::{points_for_level, STARTING_LEVEL};

/// Per-user derived totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: String,
    pub total_observations: i64,
    pub unique_species: i64,
    /// Observation points plus `bonus_points`.
    pub total_points: i64,
    /// Points from quest rewards and streak milestones.
    pub bonus_points: i64,
    pub level: u32,
    pub points_to_next_level: i64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_observation_date: Option<NaiveDate>,
    pub weekly_points: i64,
    pub monthly_points: i64,
    pub week_start: Option<DateTime<Utc>>,
    pub month_start: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UserStats {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_observations: 0,
            unique_species: 0,
            total_points: 0,
            bonus_points: 0,
            level: STARTING_LEVEL,
            points_to_next_level: points_for_level(STARTING_LEVEL + 1),
            current_streak: 0,
            longest_streak: 0,
            last_observation_date: None,
            weekly_points: 0,
            monthly_points: 0,
            week_start: None,
            month_start: None,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Active,
    Completed,
}

/// A quest assigned to a user for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestAssignment {
    pub quest_code: String,
    pub period_start: DateTime<Utc>,
    pub progress: i64,
    pub target: i64,
    pub status: QuestStatus,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub new_badges: Vec<String>,
    pub completed_quests: Vec<String>,
    pub leveled_up: bool,
    pub level: u32,
    pub total_points: i64,
    pub weekly_resets: usize,
    pub monthly_resets: usize,
}
