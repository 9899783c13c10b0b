//! Derived gamification state: stats, badges, quests and leaderboard periods.

mod achievements_model;
mod achievements_traits;
mod badges;
mod leaderboard;
mod quests;
mod reconciler;

pub use achievements_model::*;
pub use achievements_traits::*;
pub use badges::*;
pub use leaderboard::*;
pub use quests::*;
pub use reconciler::*;
