use serde::{Deserialize, Serialize};

/// Bonus for the first observation of a taxon anywhere.
pub const FIRST_GLOBAL_BONUS: i64 = 5000;
/// Bonus for the first observation of a taxon in a region.
pub const FIRST_REGIONAL_BONUS: i64 = 1000;

/// Rarity tier of a taxon, ordered from most to least common.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

impl Rarity {
    /// Tier for a taxon given how many times it has been observed globally.
    pub fn from_global_count(count: u64) -> Self {
        match count {
            0..=9 => Self::Mythic,
            10..=99 => Self::Legendary,
            100..=499 => Self::Epic,
            500..=1999 => Self::Rare,
            2000..=9999 => Self::Uncommon,
            _ => Self::Common,
        }
    }

    pub fn bonus_points(self) -> i64 {
        match self {
            Self::Mythic => 2000,
            Self::Legendary => 500,
            Self::Epic => 250,
            Self::Rare => 100,
            Self::Uncommon => 25,
            Self::Common => 0,
        }
    }

    pub fn is_rare_or_better(self) -> bool {
        self >= Self::Rare
    }

    pub fn is_legendary_or_better(self) -> bool {
        self >= Self::Legendary
    }
}

/// Result of classifying one taxon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RarityOutcome {
    pub rarity: Rarity,
    pub global_count: u64,
    pub regional_count: Option<u64>,
    pub is_first_global: bool,
    pub is_first_regional: bool,
}

impl RarityOutcome {
    pub fn from_counts(global_count: u64, regional_count: Option<u64>) -> Self {
        Self {
            rarity: Rarity::from_global_count(global_count),
            global_count,
            regional_count,
            is_first_global: global_count <= 1,
            is_first_regional: matches!(regional_count, Some(count) if count <= 1),
        }
    }

    /// Tier bonus plus any first-discovery bonus.
    pub fn bonus_points(&self) -> i64 {
        let mut bonus = self.rarity.bonus_points();
        if self.is_first_global {
            bonus += FIRST_GLOBAL_BONUS;
        } else if self.is_first_regional {
            bonus += FIRST_REGIONAL_BONUS;
        }
        bonus
    }
}
