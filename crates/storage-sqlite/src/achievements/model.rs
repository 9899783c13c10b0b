use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use bioquest_core::achievements::{QuestAssignment, UserStats};
use bioquest_core::Result;

use crate::utils::{
    date_from_db, date_to_db, enum_from_db, enum_to_db, opt_ts_from_db, ts_from_db, ts_to_db,
};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(user_id))]
#[diesel(table_name = crate::schema::user_stats)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct UserStatsDB {
    pub user_id: String,
    pub total_observations: i64,
    pub unique_species: i64,
    pub total_points: i64,
    pub bonus_points: i64,
    pub level: i32,
    pub points_to_next_level: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_observation_date: Option<String>,
    pub weekly_points: i64,
    pub monthly_points: i64,
    pub week_start: Option<String>,
    pub month_start: Option<String>,
    pub updated_at: String,
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl From<&UserStats> for UserStatsDB {
    fn from(stats: &UserStats) -> Self {
        Self {
            user_id: stats.user_id.clone(),
            total_observations: stats.total_observations,
            unique_species: stats.unique_species,
            total_points: stats.total_points,
            bonus_points: stats.bonus_points,
            level: to_i32(stats.level),
            points_to_next_level: stats.points_to_next_level,
            current_streak: to_i32(stats.current_streak),
            longest_streak: to_i32(stats.longest_streak),
            last_observation_date: stats.last_observation_date.map(date_to_db),
            weekly_points: stats.weekly_points,
            monthly_points: stats.monthly_points,
            week_start: stats.week_start.map(ts_to_db),
            month_start: stats.month_start.map(ts_to_db),
            updated_at: ts_to_db(stats.updated_at),
        }
    }
}

impl UserStatsDB {
    pub fn into_domain(self) -> Result<UserStats> {
        Ok(UserStats {
            user_id: self.user_id,
            total_observations: self.total_observations,
            unique_species: self.unique_species,
            total_points: self.total_points,
            bonus_points: self.bonus_points,
            level: to_u32(self.level),
            points_to_next_level: self.points_to_next_level,
            current_streak: to_u32(self.current_streak),
            longest_streak: to_u32(self.longest_streak),
            last_observation_date: self
                .last_observation_date
                .as_deref()
                .map(date_from_db)
                .transpose()?,
            weekly_points: self.weekly_points,
            monthly_points: self.monthly_points,
            week_start: opt_ts_from_db(self.week_start.as_deref())?,
            month_start: opt_ts_from_db(self.month_start.as_deref())?,
            updated_at: ts_from_db(&self.updated_at)?,
        })
    }
}

#[derive(Queryable, Identifiable, Insertable, Selectable, Debug, Clone)]
#[diesel(primary_key(user_id, badge_code))]
#[diesel(table_name = crate::schema::user_badges)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserBadgeDB {
    pub user_id: String,
    pub badge_code: String,
    pub unlocked_at: String,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(user_id, quest_code, period_start))]
#[diesel(table_name = crate::schema::quest_assignments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct QuestAssignmentDB {
    pub user_id: String,
    pub quest_code: String,
    pub period_start: String,
    pub progress: i64,
    pub target: i64,
    pub status: String,
    pub assigned_at: String,
    pub completed_at: Option<String>,
}

impl QuestAssignmentDB {
    pub fn from_domain(user_id: &str, quest: &QuestAssignment) -> Result<Self> {
        Ok(Self {
            user_id: user_id.to_string(),
            quest_code: quest.quest_code.clone(),
            period_start: ts_to_db(quest.period_start),
            progress: quest.progress,
            target: quest.target,
            status: enum_to_db(&quest.status)?,
            assigned_at: ts_to_db(quest.assigned_at),
            completed_at: quest.completed_at.map(ts_to_db),
        })
    }

    pub fn into_domain(self) -> Result<QuestAssignment> {
        Ok(QuestAssignment {
            quest_code: self.quest_code,
            period_start: ts_from_db(&self.period_start)?,
            progress: self.progress,
            target: self.target,
            status: enum_from_db(&self.status)?,
            assigned_at: ts_from_db(&self.assigned_at)?,
            completed_at: opt_ts_from_db(self.completed_at.as_deref())?,
        })
    }
}
