//! Problem generation. Fans a round's slots out to the generation collaborator.
//!
//! Each slot is an independent call. A failed or timed-out slot is logged and
//! dropped; the round keeps whatever the other slots produced. Retained
//! candidates keep their original slot ids even when earlier slots dropped out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{LlmClient, LlmError};
use crate::models::problem::{slot_id, Difficulty, RoundCategory};
use crate::models::simulation::RoundSpec;
use crate::simulation::planner::problem_count;
use crate::simulation::prompts::{content_schema, PROBLEM_GENERATION_PROMPT_TEMPLATE};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Raw, unvalidated problem payload as returned by the collaborator.
/// Every field is optional on the wire; the validator decides what is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProblem {
    pub title: String,
    pub description: String,
    pub difficulty: String,
    pub category: String,
    pub content: Map<String, Value>,
}

/// A candidate bound to the slot that produced it.
#[derive(Debug, Clone)]
pub struct SlotCandidate {
    pub id: String,
    pub slot: u32,
    pub candidate: CandidateProblem,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation collaborator failed: {0}")]
    Collaborator(String),

    #[error("unusable generation output: {0}")]
    InvalidOutput(String),

    #[error("generation timed out after {0}s")]
    Timeout(u64),
}

impl From<LlmError> for GenerationError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Parse(_) | LlmError::EmptyContent => {
                GenerationError::InvalidOutput(e.to_string())
            }
            other => GenerationError::Collaborator(other.to_string()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator trait
// ────────────────────────────────────────────────────────────────────────────

/// The generation collaborator. One call produces one candidate.
#[async_trait]
pub trait ProblemSource: Send + Sync {
    async fn generate(
        &self,
        category: RoundCategory,
        company_name: &str,
        role_level: &str,
        difficulty: Difficulty,
    ) -> Result<CandidateProblem, GenerationError>;
}

/// Production source backed by the shared LLM client.
pub struct LlmProblemSource {
    llm: LlmClient,
}

impl LlmProblemSource {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

pub fn build_generation_prompt(
    category: RoundCategory,
    company_name: &str,
    role_level: &str,
    difficulty: Difficulty,
) -> String {
    PROBLEM_GENERATION_PROMPT_TEMPLATE
        .replace("{company_name}", company_name)
        .replace("{role_level}", role_level)
        .replace("{category}", category.as_str())
        .replace("{difficulty}", difficulty.as_str())
        .replace("{content_schema}", content_schema(category))
}

#[async_trait]
impl ProblemSource for LlmProblemSource {
    async fn generate(
        &self,
        category: RoundCategory,
        company_name: &str,
        role_level: &str,
        difficulty: Difficulty,
    ) -> Result<CandidateProblem, GenerationError> {
        let prompt = build_generation_prompt(category, company_name, role_level, difficulty);
        let mut candidate: CandidateProblem = self.llm.call_json(&prompt, JSON_ONLY_SYSTEM).await?;

        // The model sometimes drops the echo fields; the request is authoritative for them.
        if candidate.category.trim().is_empty() {
            candidate.category = category.as_str().to_string();
        }
        if candidate.difficulty.trim().is_empty() {
            candidate.difficulty = difficulty.as_str().to_string();
        }
        Ok(candidate)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Round generation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ProblemGenerator {
    source: Arc<dyn ProblemSource>,
    slot_timeout: Duration,
}

impl ProblemGenerator {
    pub fn new(source: Arc<dyn ProblemSource>, slot_timeout: Duration) -> Self {
        Self {
            source,
            slot_timeout,
        }
    }

    /// Generates candidates for every planned slot of a round, concurrently.
    /// The result is ordered by slot and may be shorter than the plan.
    pub async fn generate_round(
        &self,
        round_index: usize,
        round: &RoundSpec,
        company_name: &str,
        role_level: &str,
    ) -> Vec<SlotCandidate> {
        let slots = problem_count(round.duration_minutes);
        info!(
            "Generating {} {} problems for round '{}' ({} min)",
            slots, round.category, round.name, round.duration_minutes
        );

        let mut tasks = JoinSet::new();
        for slot in 0..slots {
            let source = Arc::clone(&self.source);
            let company_name = company_name.to_string();
            let role_level = role_level.to_string();
            let category = round.category;
            let difficulty = round.difficulty;
            let timeout = self.slot_timeout;

            tasks.spawn(async move {
                let call = source.generate(category, &company_name, &role_level, difficulty);
                let result = match tokio::time::timeout(timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(GenerationError::Timeout(timeout.as_secs())),
                };
                (slot, result)
            });
        }

        let mut retained = Vec::with_capacity(slots as usize);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, Ok(candidate))) => {
                    debug!("Slot {} of round {} produced '{}'", slot, round_index, candidate.title);
                    retained.push(SlotCandidate {
                        id: slot_id(round_index, slot),
                        slot,
                        candidate,
                    });
                }
                Ok((slot, Err(e))) => {
                    warn!(
                        "Dropping slot {} of round {} ('{}'): {}",
                        slot, round_index, round.name, e
                    );
                }
                Err(e) => warn!("Generation task for round {} aborted: {}", round_index, e),
            }
        }

        retained.sort_by_key(|c| c.slot);
        info!(
            "Round '{}' generation finished: {}/{} slots filled",
            round.name,
            retained.len(),
            slots
        );
        retained
    }
}
