//! Time planning for a simulation: per-round budgets, problem counts per round,
//! and per-problem time slices. All functions are pure.

use serde::Deserialize;

use crate::models::problem::{Difficulty, RoundCategory};
use crate::models::simulation::{RoundSpec, RoundStatus};

/// Baseline minutes per problem.
const MINUTES_PER_PROBLEM: u32 = 20;
const MIN_PROBLEMS_PER_ROUND: u32 = 2;

/// Client-supplied description of a round before time is allotted.
#[derive(Debug, Clone, Deserialize)]
pub struct RoundBlueprint {
    pub name: String,
    pub category: RoundCategory,
    #[serde(default)]
    pub description: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

/// `floor(total / rounds)`. Returns 0 when there are no rounds.
pub fn round_budget(total_minutes: u32, round_count: u32) -> u32 {
    total_minutes.checked_div(round_count).unwrap_or(0)
}

/// At least two problems per round, roughly one per 20 minutes.
pub fn problem_count(per_round_minutes: u32) -> u32 {
    (per_round_minutes / MINUTES_PER_PROBLEM).max(MIN_PROBLEMS_PER_ROUND)
}

/// Splits `total` into `count` slices whose sum is exactly `total`.
/// The first `total % count` slices receive one extra minute.
pub fn time_distribution(total_minutes: u32, count: u32) -> Vec<u32> {
    if count == 0 {
        return Vec::new();
    }
    let base = total_minutes / count;
    let remainder = total_minutes % count;
    (0..count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Builds pending rounds with equal time budgets.
pub fn plan_rounds(total_minutes: u32, blueprints: &[RoundBlueprint]) -> Vec<RoundSpec> {
    let per_round = round_budget(total_minutes, blueprints.len() as u32);
    blueprints
        .iter()
        .enumerate()
        .map(|(i, bp)| RoundSpec {
            id: format!("round_{i}"),
            name: bp.name.clone(),
            category: bp.category,
            description: bp.description.clone(),
            duration_minutes: per_round,
            difficulty: bp.difficulty,
            focus_areas: bp.focus_areas.clone(),
            status: RoundStatus::Pending,
        })
        .collect()
}
