use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSummary {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_observation_date: Option<NaiveDate>,
}

/// Streak milestones as `(days, bonus points)`.
pub const STREAK_MILESTONES: [(u32, i64); 7] = [
    (3, 25),
    (7, 100),
    (14, 200),
    (30, 500),
    (60, 1000),
    (100, 2000),
    (365, 10000),
];

/// Computes consecutive-day streaks. The current streak only counts when the
/// latest observation day is `today` or the day before.
pub fn calculate_streaks(dates: &[NaiveDate], today: NaiveDate) -> StreakSummary {
    let mut days: Vec<NaiveDate> = dates.to_vec();
    days.sort_unstable();
    days.dedup();

    let Some(&last) = days.last() else {
        return StreakSummary::default();
    };

    let mut longest = 1;
    let mut run = 1;
    for pair in days.windows(2) {
        if pair[1].signed_duration_since(pair[0]).num_days() == 1 {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }

    let gap = today.signed_duration_since(last).num_days();
    let current = if (0..=1).contains(&gap) { run } else { 0 };

    StreakSummary {
        current_streak: current,
        longest_streak: longest,
        last_observation_date: Some(last),
    }
}

/// Milestones crossed when a streak grows from `previous` to `current` days.
pub fn crossed_streak_milestones(previous: u32, current: u32) -> Vec<(u32, i64)> {
    STREAK_MILESTONES
        .iter()
        .copied()
        .filter(|(days, _)| previous < *days && current >= *days)
        .collect()
}
