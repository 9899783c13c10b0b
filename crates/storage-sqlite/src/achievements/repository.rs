use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::collections::HashSet;
use std::sync::Arc;

use bioquest_core::achievements::{
    AchievementRepositoryTrait, LeaderboardPeriod, QuestAssignment, UserStats,
};
use bioquest_core::gamification::calculate_level;
use bioquest_core::Result;

use super::model::{QuestAssignmentDB, UserBadgeDB, UserStatsDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{observations, quest_assignments, user_badges, user_stats};
use crate::utils::ts_to_db;

/// Adds earned points to a user's weekly and monthly totals inside the
/// caller's transaction. A total whose period has ended is reset first, and
/// a user without a stats row gets one anchored to the current periods.
pub(crate) fn credit_period_points_tx(
    conn: &mut SqliteConnection,
    user: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    if delta == 0 {
        return Ok(());
    }
    let week = LeaderboardPeriod::Weekly.start_for(now);
    let month = LeaderboardPeriod::Monthly.start_for(now);

    let row = user_stats::table
        .find(user)
        .select(UserStatsDB::as_select())
        .first::<UserStatsDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    let Some(row) = row else {
        let mut stats = UserStats::new(user, now);
        stats.weekly_points = delta;
        stats.monthly_points = delta;
        stats.week_start = Some(week);
        stats.month_start = Some(month);
        diesel::insert_into(user_stats::table)
            .values(&UserStatsDB::from(&stats))
            .execute(conn)
            .map_err(StorageError::from)?;
        return Ok(());
    };

    let stats = row.into_domain()?;
    let (weekly, week_start) = carry_forward(stats.weekly_points, stats.week_start, week);
    let (monthly, month_start) = carry_forward(stats.monthly_points, stats.month_start, month);
    diesel::update(user_stats::table.find(user))
        .set((
            user_stats::weekly_points.eq(weekly + delta),
            user_stats::monthly_points.eq(monthly + delta),
            user_stats::week_start.eq(Some(ts_to_db(week_start))),
            user_stats::month_start.eq(Some(ts_to_db(month_start))),
        ))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

fn carry_forward(
    points: i64,
    anchor: Option<DateTime<Utc>>,
    current: DateTime<Utc>,
) -> (i64, DateTime<Utc>) {
    match anchor {
        Some(anchor) if anchor >= current => (points, anchor),
        _ => (0, current),
    }
}

/// Recomputes total points and level from the stored observations and the
/// user's bonus points. No-op for users without a stats row.
pub(crate) fn refresh_totals_tx(conn: &mut SqliteConnection, user: &str) -> Result<()> {
    let bonus = user_stats::table
        .find(user)
        .select(user_stats::bonus_points)
        .first::<i64>(conn)
        .optional()
        .map_err(StorageError::from)?;
    let Some(bonus) = bonus else {
        return Ok(());
    };

    let earned: i64 = observations::table
        .filter(observations::user_id.eq(user))
        .select(observations::points_awarded)
        .load::<i64>(conn)
        .map_err(StorageError::from)?
        .into_iter()
        .sum();
    let total = earned + bonus;
    let progress = calculate_level(total);
    diesel::update(user_stats::table.find(user))
        .set((
            user_stats::total_points.eq(total),
            user_stats::level.eq(i32::try_from(progress.level).unwrap_or(i32::MAX)),
            user_stats::points_to_next_level.eq(progress.points_to_next_level),
        ))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

pub struct AchievementRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl AchievementRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        AchievementRepository { pool, writer }
    }
}

#[async_trait]
impl AchievementRepositoryTrait for AchievementRepository {
    fn get_user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        let mut conn = get_connection(&self.pool)?;
        user_stats::table
            .find(user_id)
            .select(UserStatsDB::as_select())
            .first::<UserStatsDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(UserStatsDB::into_domain)
            .transpose()
    }

    async fn save_user_stats(&self, stats: UserStats) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let row = UserStatsDB::from(&stats);
                // Period points and anchors belong to the writes that earn and
                // roll them; an existing row only takes the derived columns.
                diesel::insert_into(user_stats::table)
                    .values(&row)
                    .on_conflict(user_stats::user_id)
                    .do_update()
                    .set((
                        user_stats::total_observations.eq(row.total_observations),
                        user_stats::unique_species.eq(row.unique_species),
                        user_stats::bonus_points.eq(row.bonus_points),
                        user_stats::current_streak.eq(row.current_streak),
                        user_stats::longest_streak.eq(row.longest_streak),
                        user_stats::last_observation_date.eq(row.last_observation_date.clone()),
                        user_stats::updated_at.eq(row.updated_at.clone()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                refresh_totals_tx(conn, &row.user_id)
            })
            .await
    }

    async fn roll_leaderboard_period(
        &self,
        period: LeaderboardPeriod,
        period_start: DateTime<Utc>,
    ) -> Result<usize> {
        let start = ts_to_db(period_start);
        self.writer
            .exec(move |conn| {
                let updated = match period {
                    LeaderboardPeriod::Weekly => diesel::update(
                        user_stats::table.filter(
                            user_stats::week_start
                                .is_null()
                                .or(user_stats::week_start.lt(&start)),
                        ),
                    )
                    .set((
                        user_stats::weekly_points.eq(0),
                        user_stats::week_start.eq(Some(start.clone())),
                    ))
                    .execute(conn),
                    LeaderboardPeriod::Monthly => diesel::update(
                        user_stats::table.filter(
                            user_stats::month_start
                                .is_null()
                                .or(user_stats::month_start.lt(&start)),
                        ),
                    )
                    .set((
                        user_stats::monthly_points.eq(0),
                        user_stats::month_start.eq(Some(start.clone())),
                    ))
                    .execute(conn),
                }
                .map_err(StorageError::from)?;
                Ok(updated)
            })
            .await
    }

    fn list_badges(&self, user_id: &str) -> Result<HashSet<String>> {
        let mut conn = get_connection(&self.pool)?;
        let codes = user_badges::table
            .filter(user_badges::user_id.eq(user_id))
            .select(user_badges::badge_code)
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(codes.into_iter().collect())
    }

    async fn unlock_badges(
        &self,
        user_id: &str,
        codes: Vec<String>,
        unlocked_at: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let user = user_id.to_string();
        let unlocked_at = ts_to_db(unlocked_at);
        self.writer
            .exec(move |conn| {
                let mut unlocked = Vec::new();
                for code in codes {
                    let row = UserBadgeDB {
                        user_id: user.clone(),
                        badge_code: code.clone(),
                        unlocked_at: unlocked_at.clone(),
                    };
                    let inserted = diesel::insert_or_ignore_into(user_badges::table)
                        .values(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                    if inserted > 0 {
                        unlocked.push(code);
                    }
                }
                Ok(unlocked)
            })
            .await
    }

    fn list_quests(&self, user_id: &str) -> Result<Vec<QuestAssignment>> {
        let mut conn = get_connection(&self.pool)?;
        quest_assignments::table
            .filter(quest_assignments::user_id.eq(user_id))
            .order((
                quest_assignments::period_start.desc(),
                quest_assignments::quest_code.asc(),
            ))
            .select(QuestAssignmentDB::as_select())
            .load::<QuestAssignmentDB>(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(QuestAssignmentDB::into_domain)
            .collect()
    }

    async fn upsert_quests(&self, user_id: &str, quests: Vec<QuestAssignment>) -> Result<()> {
        let user = user_id.to_string();
        self.writer
            .exec(move |conn| {
                for quest in &quests {
                    let row = QuestAssignmentDB::from_domain(&user, quest)?;
                    diesel::insert_into(quest_assignments::table)
                        .values(&row)
                        .on_conflict((
                            quest_assignments::user_id,
                            quest_assignments::quest_code,
                            quest_assignments::period_start,
                        ))
                        .do_update()
                        .set(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(())
            })
            .await
    }
}
