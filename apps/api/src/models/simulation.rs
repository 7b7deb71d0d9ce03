use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::problem::{Difficulty, RoundCategory};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundSpec {
    pub id: String,
    pub name: String,
    pub category: RoundCategory,
    pub description: String,
    pub duration_minutes: u32,
    pub difficulty: Difficulty,
    pub focus_areas: Vec<String>,
    pub status: RoundStatus,
}

/// One simulated interview attempt for a company/role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Simulation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub role_level: String,
    pub rounds: Vec<RoundSpec>,
    /// Equals `rounds.len()` once every round is completed.
    pub current_round_index: usize,
    pub completed_rounds: BTreeSet<String>,
    pub status: SimulationStatus,
    pub created_at: DateTime<Utc>,
}

impl Simulation {
    pub fn round(&self, index: usize) -> Option<&RoundSpec> {
        self.rounds.get(index)
    }

    /// Marks a round completed and moves the cursor past it.
    pub fn record_round_completed(&mut self, index: usize) {
        let Some(round) = self.rounds.get_mut(index) else {
            return;
        };
        round.status = RoundStatus::Completed;
        self.completed_rounds.insert(round.id.clone());
        self.current_round_index = self
            .current_round_index
            .max(index + 1)
            .min(self.rounds.len());

        if self.completed_rounds.len() == self.rounds.len() {
            self.status = SimulationStatus::Completed;
            self.current_round_index = self.rounds.len();
        }
    }

    pub fn record_round_started(&mut self, index: usize) {
        if let Some(round) = self.rounds.get_mut(index) {
            if round.status == RoundStatus::Pending {
                round.status = RoundStatus::Active;
            }
        }
    }
}
