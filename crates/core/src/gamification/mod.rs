//! Point, level, streak and rarity rules.

mod levels;
mod points;
mod rarity;
mod streaks;

pub use levels::*;
pub use points::*;
pub use rarity::*;
pub use streaks::*;
