//! Badge unlock predicates.

use super::UserStats;
use crate::observations::ObservationFacts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeCriteria {
    MinObservations(i64),
    MinSpecies(i64),
    IconicTaxonSpecies {
        iconic_taxon: &'static str,
        min_species: i64,
    },
    RareFinds(i64),
    LegendaryFinds(i64),
    ResearchGrade(i64),
    Streak(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeDefinition {
    pub code: &'static str,
    pub name: &'static str,
    pub criteria: BadgeCriteria,
}

impl BadgeDefinition {
    pub fn is_satisfied(&self, facts: &ObservationFacts, stats: &UserStats) -> bool {
        match self.criteria {
            BadgeCriteria::MinObservations(min) => facts.total_observations >= min,
            BadgeCriteria::MinSpecies(min) => facts.unique_species >= min,
            BadgeCriteria::IconicTaxonSpecies {
                iconic_taxon,
                min_species,
            } => facts.species_for(iconic_taxon) >= min_species,
            BadgeCriteria::RareFinds(min) => facts.rare_or_better >= min,
            BadgeCriteria::LegendaryFinds(min) => facts.legendary_or_better >= min,
            BadgeCriteria::ResearchGrade(min) => facts.research_grade >= min,
            BadgeCriteria::Streak(days) => stats.longest_streak >= days,
        }
    }
}

pub const BADGE_DEFINITIONS: &[BadgeDefinition] = &[
    BadgeDefinition {
        code: "first_steps",
        name: "First Steps",
        criteria: BadgeCriteria::MinObservations(1),
    },
    BadgeDefinition {
        code: "century_club",
        name: "Century Club",
        criteria: BadgeCriteria::MinObservations(100),
    },
    BadgeDefinition {
        code: "thousand_eyes",
        name: "Thousand Eyes",
        criteria: BadgeCriteria::MinObservations(1_000),
    },
    BadgeDefinition {
        code: "ten_thousand_strong",
        name: "Ten Thousand Strong",
        criteria: BadgeCriteria::MinObservations(10_000),
    },
    BadgeDefinition {
        code: "species_sampler",
        name: "Species Sampler",
        criteria: BadgeCriteria::MinSpecies(10),
    },
    BadgeDefinition {
        code: "species_collector",
        name: "Species Collector",
        criteria: BadgeCriteria::MinSpecies(100),
    },
    BadgeDefinition {
        code: "bird_watcher",
        name: "Bird Watcher",
        criteria: BadgeCriteria::IconicTaxonSpecies {
            iconic_taxon: "Aves",
            min_species: 50,
        },
    },
    BadgeDefinition {
        code: "botanist",
        name: "Botanist",
        criteria: BadgeCriteria::IconicTaxonSpecies {
            iconic_taxon: "Plantae",
            min_species: 100,
        },
    },
    BadgeDefinition {
        code: "mycologist",
        name: "Mycologist",
        criteria: BadgeCriteria::IconicTaxonSpecies {
            iconic_taxon: "Fungi",
            min_species: 25,
        },
    },
    BadgeDefinition {
        code: "entomologist",
        name: "Entomologist",
        criteria: BadgeCriteria::IconicTaxonSpecies {
            iconic_taxon: "Insecta",
            min_species: 50,
        },
    },
    BadgeDefinition {
        code: "rare_find",
        name: "Rare Find",
        criteria: BadgeCriteria::RareFinds(1),
    },
    BadgeDefinition {
        code: "legend_hunter",
        name: "Legend Hunter",
        criteria: BadgeCriteria::LegendaryFinds(1),
    },
    BadgeDefinition {
        code: "research_contributor",
        name: "Research Contributor",
        criteria: BadgeCriteria::ResearchGrade(10),
    },
    BadgeDefinition {
        code: "week_warrior",
        name: "Week Warrior",
        criteria: BadgeCriteria::Streak(7),
    },
    BadgeDefinition {
        code: "monthly_devotee",
        name: "Monthly Devotee",
        criteria: BadgeCriteria::Streak(30),
    },
];

/// Codes of every badge whose predicate currently holds.
pub fn eligible_badges(facts: &ObservationFacts, stats: &UserStats) -> Vec<&'static str> {
    BADGE_DEFINITIONS
        .iter()
        .filter(|badge| badge.is_satisfied(facts, stats))
        .map(|badge| badge.code)
        .collect()
}
