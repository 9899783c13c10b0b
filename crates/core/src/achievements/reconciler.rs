//! Recomputes derived gamification state after a sync.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

use super::{
    eligible_badges, quest_definition, AchievementReconcilerTrait, AchievementRepositoryTrait,
    LeaderboardPeriod, QuestAssignment, QuestStatus, QuestWindow, ReconcileOutcome, UserStats,
    QUEST_DEFINITIONS,
};
use crate::clock::Clock;
use crate::errors::Result;
use crate::gamification::{calculate_level, calculate_streaks, crossed_streak_milestones};
use crate::observations::{ObservationFacts, ObservationRepositoryTrait};
use crate::sync::SyncDelta;

pub struct AchievementReconciler {
    repository: Arc<dyn AchievementRepositoryTrait>,
    observation_repository: Arc<dyn ObservationRepositoryTrait>,
    clock: Arc<dyn Clock>,
}

impl AchievementReconciler {
    pub fn new(
        repository: Arc<dyn AchievementRepositoryTrait>,
        observation_repository: Arc<dyn ObservationRepositoryTrait>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            observation_repository,
            clock,
        }
    }

    /// Creates the stats row, anchored to the current periods, the first time
    /// a user is seen. Rows with a missing anchor are fixed by the roll.
    async fn ensure_stats_row(&self, user_id: &str, now: DateTime<Utc>) -> Result<()> {
        if self.repository.get_user_stats(user_id)?.is_some() {
            return Ok(());
        }
        let mut stats = UserStats::new(user_id, now);
        stats.week_start = Some(LeaderboardPeriod::Weekly.start_for(now));
        stats.month_start = Some(LeaderboardPeriod::Monthly.start_for(now));
        self.repository.save_user_stats(stats).await?;
        info!("[Reconcile] Initialized leaderboard periods for {}", user_id);
        Ok(())
    }

    /// Assigns missing quests for the current periods, advances active ones,
    /// and returns the codes that completed in this call with their rewards.
    async fn advance_quests(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Vec<String>, i64)> {
        let mut quests = self.repository.list_quests(user_id)?;
        let mut touched: Vec<usize> = Vec::new();

        for definition in QUEST_DEFINITIONS {
            let start = definition.window.period_start(now);
            let assigned = quests
                .iter()
                .any(|q| q.quest_code == definition.code && q.period_start == start);
            if !assigned {
                quests.push(definition.assign(now));
                touched.push(quests.len() - 1);
            }
        }

        let mut facts_by_window: HashMap<QuestWindow, ObservationFacts> = HashMap::new();
        let mut completed = Vec::new();
        let mut reward_points = 0;

        for (index, quest) in quests.iter_mut().enumerate() {
            if quest.status != QuestStatus::Active {
                continue;
            }
            let Some(definition) = quest_definition(&quest.quest_code) else {
                continue;
            };
            if quest.period_start != definition.window.period_start(now) {
                continue;
            }

            if !facts_by_window.contains_key(&definition.window) {
                let facts = self
                    .observation_repository
                    .facts(user_id, Some(quest.period_start))?;
                facts_by_window.insert(definition.window, facts);
            }
            let Some(facts) = facts_by_window.get(&definition.window) else {
                continue;
            };

            let progress = definition.progress(facts);
            if progress != quest.progress {
                quest.progress = progress;
                if !touched.contains(&index) {
                    touched.push(index);
                }
            }
            if progress >= definition.target {
                quest.status = QuestStatus::Completed;
                quest.completed_at = Some(now);
                completed.push(quest.quest_code.clone());
                reward_points += definition.reward_points;
                if !touched.contains(&index) {
                    touched.push(index);
                }
            }
        }

        if !touched.is_empty() {
            let changed: Vec<QuestAssignment> =
                touched.into_iter().map(|i| quests[i].clone()).collect();
            self.repository.upsert_quests(user_id, changed).await?;
        }
        Ok((completed, reward_points))
    }
}

#[async_trait]
impl AchievementReconcilerTrait for AchievementReconciler {
    async fn reconcile(&self, user_id: &str, delta: &SyncDelta) -> Result<ReconcileOutcome> {
        let now = self.clock.now();
        debug!(
            "[Reconcile] {}: {} new observation(s), {} point(s) earned",
            user_id,
            delta.new_observation_ids.len(),
            delta.points_awarded
        );

        self.ensure_stats_row(user_id, now).await?;

        let weekly_resets = self
            .repository
            .roll_leaderboard_period(
                LeaderboardPeriod::Weekly,
                LeaderboardPeriod::Weekly.start_for(now),
            )
            .await?;
        let monthly_resets = self
            .repository
            .roll_leaderboard_period(
                LeaderboardPeriod::Monthly,
                LeaderboardPeriod::Monthly.start_for(now),
            )
            .await?;
        if weekly_resets > 0 || monthly_resets > 0 {
            info!(
                "[Reconcile] Rolled leaderboards: {} weekly, {} monthly",
                weekly_resets, monthly_resets
            );
        }

        let mut stats = self
            .repository
            .get_user_stats(user_id)?
            .unwrap_or_else(|| UserStats::new(user_id, now));
        let previous_level = stats.level;

        let facts = self.observation_repository.facts(user_id, None)?;
        stats.total_observations = facts.total_observations;
        stats.unique_species = facts.unique_species;

        let streaks = calculate_streaks(&facts.observation_dates, now.date_naive());
        for (days, bonus) in crossed_streak_milestones(stats.longest_streak, streaks.longest_streak)
        {
            debug!("[Reconcile] {} reached a {}-day streak", user_id, days);
            stats.bonus_points += bonus;
        }
        stats.current_streak = streaks.current_streak;
        stats.longest_streak = stats.longest_streak.max(streaks.longest_streak);
        stats.last_observation_date = streaks.last_observation_date;

        let (completed_quests, quest_rewards) = self.advance_quests(user_id, now).await?;
        stats.bonus_points += quest_rewards;

        stats.total_points = facts.observation_points + stats.bonus_points;
        let level = calculate_level(stats.total_points);
        stats.level = level.level;
        stats.points_to_next_level = level.points_to_next_level;

        let unlocked = self.repository.list_badges(user_id)?;
        let candidates: Vec<String> = eligible_badges(&facts, &stats)
            .into_iter()
            .filter(|code| !unlocked.contains(*code))
            .map(str::to_string)
            .collect();
        let new_badges = if candidates.is_empty() {
            Vec::new()
        } else {
            self.repository
                .unlock_badges(user_id, candidates, now)
                .await?
        };

        stats.updated_at = now;
        let outcome = ReconcileOutcome {
            new_badges,
            completed_quests,
            leveled_up: stats.level > previous_level,
            level: stats.level,
            total_points: stats.total_points,
            weekly_resets,
            monthly_resets,
        };
        self.repository.save_user_stats(stats).await?;

        if !outcome.new_badges.is_empty() || !outcome.completed_quests.is_empty() {
            info!(
                "[Reconcile] {}: {} new badge(s), {} quest(s) completed",
                user_id,
                outcome.new_badges.len(),
                outcome.completed_quests.len()
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::observations::{Observation, ObservationRepositoryTrait};
    use crate::test_support::{
        raw_observation, InMemoryAchievementRepository, InMemoryObservationRepository,
    };
    use chrono::{Duration, TimeZone};

    fn setup(
        now: DateTime<Utc>,
    ) -> (
        AchievementReconciler,
        Arc<InMemoryAchievementRepository>,
        Arc<InMemoryObservationRepository>,
        Arc<ManualClock>,
    ) {
        let repo = Arc::new(InMemoryAchievementRepository::default());
        let observations = Arc::new(InMemoryObservationRepository::default());
        let clock = Arc::new(ManualClock::new(now));
        let reconciler = AchievementReconciler::new(repo.clone(), observations.clone(), clock.clone());
        (reconciler, repo, observations, clock)
    }

    async fn store(observations: &InMemoryObservationRepository, ids: &[i64], day: &str) {
        let parsed: Vec<Observation> = ids
            .iter()
            .map(|id| {
                let mut raw = raw_observation(*id, Some(*id + 1000));
                raw.observed_on = Some(day.to_string());
                Observation::from_raw("u1", raw).expect("parse")
            })
            .collect();
        observations
            .upsert_observations("u1", parsed)
            .await
            .expect("upsert");
    }

    #[tokio::test]
    async fn second_reconcile_without_new_data_is_empty() {
        let now = Utc.with_ymd_and_hms(2026, 7, 9, 12, 0, 0).unwrap();
        let (reconciler, _repo, observations, _clock) = setup(now);
        store(&observations, &[1, 2, 3], "2026-07-09").await;

        let first = reconciler
            .reconcile("u1", &SyncDelta::default())
            .await
            .expect("first");
        assert!(first.new_badges.contains(&"first_steps".to_string()));
        assert!(first
            .completed_quests
            .contains(&"daily_three_observations".to_string()));

        let second = reconciler
            .reconcile("u1", &SyncDelta::default())
            .await
            .expect("second");
        assert!(second.new_badges.is_empty());
        assert!(second.completed_quests.is_empty());
        assert!(!second.leveled_up);
        assert_eq!(second.total_points, first.total_points);
    }

    #[tokio::test]
    async fn first_run_initializes_period_anchors() {
        let now = Utc.with_ymd_and_hms(2026, 7, 9, 12, 0, 0).unwrap();
        let (reconciler, repo, _observations, _clock) = setup(now);

        reconciler
            .reconcile("u1", &SyncDelta::default())
            .await
            .expect("reconcile");
        let stats = repo.get_user_stats("u1").unwrap().expect("stats");
        assert_eq!(
            stats.week_start,
            Some(Utc.with_ymd_and_hms(2026, 7, 6, 0, 0, 0).unwrap())
        );
        assert_eq!(
            stats.month_start,
            Some(Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn crossing_week_boundary_resets_every_stale_user() {
        let now = Utc.with_ymd_and_hms(2026, 7, 9, 12, 0, 0).unwrap();
        let (reconciler, repo, _observations, clock) = setup(now);

        let mut earned = UserStats::new("u2", now);
        earned.weekly_points = 120;
        earned.monthly_points = 120;
        earned.week_start = Some(LeaderboardPeriod::Weekly.start_for(now));
        earned.month_start = Some(LeaderboardPeriod::Monthly.start_for(now));
        repo.save_user_stats(earned).await.expect("seed");

        reconciler.reconcile("u1", &SyncDelta::default()).await.expect("u1");
        reconciler.reconcile("u2", &SyncDelta::default()).await.expect("u2");
        assert_eq!(repo.get_user_stats("u2").unwrap().unwrap().weekly_points, 120);

        clock.advance(Duration::days(5));
        let outcome = reconciler
            .reconcile("u1", &SyncDelta::default())
            .await
            .expect("next week");
        assert_eq!(outcome.weekly_resets, 2);
        assert_eq!(outcome.monthly_resets, 0);

        let other = repo.get_user_stats("u2").unwrap().unwrap();
        assert_eq!(other.weekly_points, 0);
        assert_eq!(other.monthly_points, 120);
        assert_eq!(
            other.week_start,
            Some(Utc.with_ymd_and_hms(2026, 7, 13, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn period_points_are_left_to_the_writes_that_earn_them() {
        let now = Utc.with_ymd_and_hms(2026, 7, 9, 12, 0, 0).unwrap();
        let (reconciler, repo, _observations, _clock) = setup(now);

        let mut earned = UserStats::new("u1", now);
        earned.weekly_points = 50;
        earned.monthly_points = 75;
        earned.week_start = Some(LeaderboardPeriod::Weekly.start_for(now));
        earned.month_start = Some(LeaderboardPeriod::Monthly.start_for(now));
        repo.save_user_stats(earned).await.expect("seed");

        let delta = SyncDelta {
            points_awarded: 120,
            ..SyncDelta::default()
        };
        reconciler.reconcile("u1", &delta).await.expect("reconcile");

        let stats = repo.get_user_stats("u1").unwrap().unwrap();
        assert_eq!((stats.weekly_points, stats.monthly_points), (50, 75));
    }

    #[tokio::test]
    async fn level_up_is_reported_once() {
        let now = Utc.with_ymd_and_hms(2026, 7, 9, 12, 0, 0).unwrap();
        let (reconciler, _repo, observations, _clock) = setup(now);
        let ids: Vec<i64> = (1..=10).collect();
        store(&observations, &ids, "2026-07-01").await;

        let first = reconciler
            .reconcile("u1", &SyncDelta::default())
            .await
            .expect("first");
        assert!(first.leveled_up);
        assert!(first.level >= 2);

        let second = reconciler
            .reconcile("u1", &SyncDelta::default())
            .await
            .expect("second");
        assert!(!second.leveled_up);
    }
}
