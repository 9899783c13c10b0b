use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::{LeaderboardPeriod, QuestAssignment, ReconcileOutcome, UserStats};
use crate::errors::Result;
use crate::sync::SyncDelta;

#[async_trait]
pub trait AchievementRepositoryTrait: Send + Sync {
    fn get_user_stats(&self, user_id: &str) -> Result<Option<UserStats>>;

    /// Writes the derived columns. On an existing row the weekly and monthly
    /// points and their anchors are kept: those are credited by the writes
    /// that earn points and reset by `roll_leaderboard_period`.
    async fn save_user_stats(&self, stats: UserStats) -> Result<()>;

    /// Zeroes the period's points for every user whose anchor is missing or
    /// earlier than `period_start`, and moves their anchor to it.
    async fn roll_leaderboard_period(
        &self,
        period: LeaderboardPeriod,
        period_start: DateTime<Utc>,
    ) -> Result<usize>;

    fn list_badges(&self, user_id: &str) -> Result<HashSet<String>>;

    /// Inserts the badges not yet unlocked and returns those codes.
    async fn unlock_badges(
        &self,
        user_id: &str,
        codes: Vec<String>,
        unlocked_at: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    fn list_quests(&self, user_id: &str) -> Result<Vec<QuestAssignment>>;

    async fn upsert_quests(&self, user_id: &str, quests: Vec<QuestAssignment>) -> Result<()>;
}

#[async_trait]
pub trait AchievementReconcilerTrait: Send + Sync {
    async fn reconcile(&self, user_id: &str, delta: &SyncDelta) -> Result<ReconcileOutcome>;
}
