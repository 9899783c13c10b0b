//! Quest definitions and progress rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{day_start, month_start, week_start, QuestAssignment, QuestStatus};
use crate::observations::ObservationFacts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestWindow {
    Daily,
    Weekly,
    Monthly,
}

impl QuestWindow {
    pub fn period_start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Daily => day_start(now),
            Self::Weekly => week_start(now),
            Self::Monthly => month_start(now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestCriteria {
    ObservationCount,
    SpeciesCount,
    ResearchGrade,
    PhotoCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestDefinition {
    pub code: &'static str,
    pub name: &'static str,
    pub window: QuestWindow,
    pub criteria: QuestCriteria,
    pub target: i64,
    pub reward_points: i64,
}

impl QuestDefinition {
    /// Progress given the facts for observations made in the current period.
    pub fn progress(&self, facts: &ObservationFacts) -> i64 {
        let raw = match self.criteria {
            QuestCriteria::ObservationCount => facts.total_observations,
            QuestCriteria::SpeciesCount => facts.unique_species,
            QuestCriteria::ResearchGrade => facts.research_grade,
            QuestCriteria::PhotoCount => facts.with_photos,
        };
        raw.min(self.target)
    }

    pub fn assign(&self, now: DateTime<Utc>) -> QuestAssignment {
        QuestAssignment {
            quest_code: self.code.to_string(),
            period_start: self.window.period_start(now),
            progress: 0,
            target: self.target,
            status: QuestStatus::Active,
            assigned_at: now,
            completed_at: None,
        }
    }
}

pub const QUEST_DEFINITIONS: &[QuestDefinition] = &[
    QuestDefinition {
        code: "daily_three_observations",
        name: "Daily Explorer",
        window: QuestWindow::Daily,
        criteria: QuestCriteria::ObservationCount,
        target: 3,
        reward_points: 50,
    },
    QuestDefinition {
        code: "daily_quality",
        name: "Quality Observer",
        window: QuestWindow::Daily,
        criteria: QuestCriteria::ResearchGrade,
        target: 1,
        reward_points: 100,
    },
    QuestDefinition {
        code: "daily_photographer",
        name: "Daily Photographer",
        window: QuestWindow::Daily,
        criteria: QuestCriteria::PhotoCount,
        target: 2,
        reward_points: 80,
    },
    QuestDefinition {
        code: "weekly_twenty_observations",
        name: "Weekly Naturalist",
        window: QuestWindow::Weekly,
        criteria: QuestCriteria::ObservationCount,
        target: 20,
        reward_points: 300,
    },
    QuestDefinition {
        code: "weekly_ten_species",
        name: "Species Seeker",
        window: QuestWindow::Weekly,
        criteria: QuestCriteria::SpeciesCount,
        target: 10,
        reward_points: 400,
    },
    QuestDefinition {
        code: "monthly_hundred_observations",
        name: "Century Month",
        window: QuestWindow::Monthly,
        criteria: QuestCriteria::ObservationCount,
        target: 100,
        reward_points: 1500,
    },
    QuestDefinition {
        code: "monthly_fifty_species",
        name: "Biodiversity Champion",
        window: QuestWindow::Monthly,
        criteria: QuestCriteria::SpeciesCount,
        target: 50,
        reward_points: 2000,
    },
    QuestDefinition {
        code: "monthly_research_master",
        name: "Research Master",
        window: QuestWindow::Monthly,
        criteria: QuestCriteria::ResearchGrade,
        target: 25,
        reward_points: 2500,
    },
];

pub fn quest_definition(code: &str) -> Option<&'static QuestDefinition> {
    QUEST_DEFINITIONS.iter().find(|quest| quest.code == code)
}
