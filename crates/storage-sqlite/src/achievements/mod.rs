//! SQLite storage for user stats, badges and quest assignments.

mod model;
mod repository;

pub use model::{QuestAssignmentDB, UserBadgeDB, UserStatsDB};
pub(crate) use repository::{credit_period_points_tx, refresh_totals_tx};
pub use repository::AchievementRepository;
