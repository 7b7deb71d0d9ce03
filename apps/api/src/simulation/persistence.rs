//! Batch persistence of generated problems.
//!
//! Per-item failures (validation or write) are counted as skips and never abort
//! the batch. Only an unreachable store, detected before any write, fails the
//! whole call.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::problem::Problem;
use crate::simulation::error::SimulationError;
use crate::simulation::generator::SlotCandidate;
use crate::simulation::planner::time_distribution;
use crate::simulation::transformer::{transform, RoundMetadata};
use crate::simulation::validator::{validate_candidate, ValidationPolicy};
use crate::store::{put_typed, query_typed, DocumentStore, Filter, StoreError, PROBLEMS};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationOutcome {
    pub saved: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl GenerationOutcome {
    fn skip(&mut self, message: String) {
        warn!("Skipping problem: {}", message);
        self.skipped += 1;
        self.errors.push(message);
    }
}

#[derive(Debug, Clone)]
pub struct SaveReport {
    pub outcome: GenerationOutcome,
    /// Saved problems in slot order.
    pub problems: Vec<Problem>,
}

#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn DocumentStore>,
    policy: ValidationPolicy,
}

fn round_filters(simulation_id: Uuid, user_id: Uuid, round_name: &str) -> [Filter; 3] {
    [
        Filter::eq("simulation_id", simulation_id.to_string()),
        Filter::eq("user_id", user_id.to_string()),
        Filter::eq("round_name", round_name),
    ]
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn DocumentStore>, policy: ValidationPolicy) -> Self {
        Self { store, policy }
    }

    /// Validates, transforms and writes each candidate.
    ///
    /// The round's duration is split across the candidates that pass validation,
    /// so the persisted estimated times add up to the round budget.
    pub async fn save(
        &self,
        user_id: Uuid,
        candidates: &[SlotCandidate],
        metadata: &RoundMetadata,
    ) -> Result<SaveReport, SimulationError> {
        self.store
            .ping()
            .await
            .map_err(|e| SimulationError::PersistenceUnavailable(e.to_string()))?;

        let mut outcome = GenerationOutcome::default();
        let mut valid = Vec::with_capacity(candidates.len());
        for slot in candidates {
            match validate_candidate(&slot.candidate, metadata.round_type, &self.policy) {
                Ok(()) => valid.push(slot),
                Err(e) => outcome.skip(format!("{} ({}): {}", slot.id, slot.candidate.title, e)),
            }
        }

        let slices = time_distribution(metadata.duration_minutes, valid.len() as u32);
        let now = Utc::now();
        let mut problems = Vec::with_capacity(valid.len());

        for (slot, minutes) in valid.into_iter().zip(slices) {
            let problem = transform(slot, metadata.round_type, user_id, minutes, metadata, now);
            match put_typed(self.store.as_ref(), PROBLEMS, &problem.storage_key(), &problem).await {
                Ok(()) => {
                    outcome.saved += 1;
                    problems.push(problem);
                }
                Err(e) => outcome.skip(format!("{} ({}): write failed: {}", problem.id, problem.title, e)),
            }
        }

        info!(
            "Round '{}' persistence: saved={} skipped={}",
            metadata.round_name, outcome.saved, outcome.skipped
        );
        Ok(SaveReport { outcome, problems })
    }

    /// Persisted problems for a round, in slot order.
    pub async fn round_problems(
        &self,
        simulation_id: Uuid,
        user_id: Uuid,
        round_name: &str,
    ) -> Result<Vec<Problem>, StoreError> {
        let filters = round_filters(simulation_id, user_id, round_name);
        let mut problems: Vec<Problem> =
            query_typed(self.store.as_ref(), PROBLEMS, &filters).await?;
        problems.sort_by_key(|p| p.slot);
        Ok(problems)
    }

    pub async fn delete_round_problems(
        &self,
        simulation_id: Uuid,
        user_id: Uuid,
        round_name: &str,
    ) -> Result<usize, StoreError> {
        let problems = self.round_problems(simulation_id, user_id, round_name).await?;
        for problem in &problems {
            self.store.delete(PROBLEMS, &problem.storage_key()).await?;
        }
        Ok(problems.len())
    }
}
